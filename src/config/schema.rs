//! Configuration schema for bundlekeeper
//!
//! Configuration is stored at `~/.config/bundlekeeper/config.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Update scheduling and request policy
    pub update: UpdateConfig,

    /// Artifact storage settings
    pub storage: StorageConfig,

    /// Remote fetch settings
    pub fetch: FetchConfig,

    /// Connectivity policy
    pub network: NetworkConfig,
}

impl Config {
    /// Top-level sections, in file order
    pub const SECTIONS: &'static [&'static str] =
        &["general", "update", "storage", "fetch", "network"];

    /// Reject values the service cannot run with
    pub fn validate(&self) -> Result<(), String> {
        if !matches!(self.general.log_format.as_str(), "text" | "json") {
            return Err(format!(
                "general.log_format must be text or json, got {}",
                self.general.log_format
            ));
        }
        if self.update.max_concurrent_fetches == 0 {
            return Err("update.max_concurrent_fetches must be at least 1".to_string());
        }
        if self.storage.extensions.is_empty() {
            return Err("storage.extensions must name at least one extension".to_string());
        }
        if self.fetch.timeout_secs == 0 {
            return Err("fetch.timeout_secs must be at least 1".to_string());
        }
        Ok(())
    }
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Enable verbose logging
    pub verbose: bool,

    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            log_format: "text".to_string(),
        }
    }
}

/// Update scheduling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateConfig {
    /// Interval between periodic update checks in seconds (floor: 600)
    pub poll_interval_secs: u64,

    /// Shrink the poll interval to 30 seconds for testing
    pub debug_mode: bool,

    /// Seed the cache from a bundled asset on a cache miss
    pub copy_asset_on_miss: bool,

    /// Only poll in the background on the preferred connectivity class
    pub poll_only_on_preferred_connectivity: bool,

    /// Also fetch in the background when a launch request hits the cache
    pub refresh_on_launch: bool,

    /// Maximum fetches running at the same time
    pub max_concurrent_fetches: usize,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 60 * 60,
            debug_mode: false,
            copy_asset_on_miss: true,
            poll_only_on_preferred_connectivity: true,
            refresh_on_launch: true,
            max_concurrent_fetches: 4,
        }
    }
}

/// Artifact storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding downloaded artifacts (default: state dir)
    pub download_dir: Option<PathBuf>,

    /// Directory holding bundled seed assets
    pub asset_dir: Option<PathBuf>,

    /// Recognized artifact extensions; the first one names new artifacts
    pub extensions: Vec<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            download_dir: None,
            asset_dir: None,
            extensions: vec!["jar".to_string(), "apk".to_string()],
        }
    }
}

impl StorageConfig {
    /// Extension used when writing new artifacts
    pub fn primary_extension(&self) -> &str {
        self.extensions.first().map(String::as_str).unwrap_or("jar")
    }
}

/// Remote fetch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Base URL serving `<bundle_id>/latest.json` manifests
    pub base_url: Option<String>,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: 30,
        }
    }
}

/// Connectivity policy configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Connectivity class that permits background polling
    pub preferred: PreferredConnectivity,
}

/// Connectivity class accepted as "preferred"
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreferredConnectivity {
    /// Wireless LAN only
    #[default]
    Wifi,
    /// Wired LAN only
    Ethernet,
    /// Any non-cellular local network
    Any,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_unusable_values() {
        let mut config = Config::default();
        config.update.max_concurrent_fetches = 0;
        assert!(config.validate().unwrap_err().contains("max_concurrent_fetches"));

        let mut config = Config::default();
        config.storage.extensions.clear();
        assert!(config.validate().unwrap_err().contains("extensions"));

        let mut config = Config::default();
        config.general.log_format = "xml".to_string();
        assert!(config.validate().unwrap_err().contains("log_format"));
    }

    #[test]
    fn default_config_serializes() {
        let config = Config::default();
        let toml = toml::to_string_pretty(&config).unwrap();
        assert!(toml.contains("[general]"));
        assert!(toml.contains("[update]"));
        assert!(toml.contains("poll_interval_secs = 3600"));
    }

    #[test]
    fn config_deserializes_empty() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.update.copy_asset_on_miss);
        assert_eq!(config.storage.extensions, vec!["jar", "apk"]);
        assert_eq!(config.network.preferred, PreferredConnectivity::Wifi);
    }

    #[test]
    fn config_deserializes_partial() {
        let toml = r#"
            [update]
            debug_mode = true
            refresh_on_launch = false

            [network]
            preferred = "any"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert!(config.update.debug_mode);
        assert!(!config.update.refresh_on_launch);
        assert_eq!(config.update.poll_interval_secs, 3600); // default preserved
        assert_eq!(config.network.preferred, PreferredConnectivity::Any);
    }

    #[test]
    fn primary_extension_falls_back() {
        let storage = StorageConfig {
            extensions: vec![],
            ..StorageConfig::default()
        };
        assert_eq!(storage.primary_extension(), "jar");
    }
}
