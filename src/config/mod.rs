//! Configuration management for bundlekeeper

pub mod schema;

pub use schema::Config;

use crate::error::{BundleError, BundleResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("bundlekeeper")
            .join("config.toml")
    }

    /// Get the state directory path
    pub fn state_dir() -> PathBuf {
        dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("bundlekeeper")
    }

    /// Get the artifact storage directory for a config
    pub fn storage_dir(config: &Config) -> PathBuf {
        config
            .storage
            .download_dir
            .clone()
            .unwrap_or_else(|| Self::state_dir().join("download"))
    }

    /// Load configuration, falling back to defaults if not present
    pub async fn load(&self) -> BundleResult<Config> {
        if !self.config_path.exists() {
            debug!(
                "No config at {}, using defaults",
                self.config_path.display()
            );
            return Ok(Config::default());
        }

        self.load_from_file(&self.config_path).await
    }

    /// Load and validate configuration from a specific file.
    ///
    /// Missing sections take their defaults; unknown sections are ignored
    /// with a warning.
    pub async fn load_from_file(&self, path: &Path) -> BundleResult<Config> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| BundleError::io(format!("reading config from {}", path.display()), e))?;
        let invalid = |reason: String| BundleError::ConfigInvalid {
            path: path.to_path_buf(),
            reason,
        };

        let table: toml::Table = toml::from_str(&content).map_err(|e| invalid(e.to_string()))?;

        for key in table.keys() {
            if !Config::SECTIONS.contains(&key.as_str()) {
                warn!("Ignoring unknown config section [{}] in {}", key, path.display());
            }
        }
        let defaulted = defaulted_sections(&table);
        if !defaulted.is_empty() {
            debug!("Config sections using defaults: {}", defaulted.join(", "));
        }

        let config: Config = toml::Value::Table(table)
            .try_into()
            .map_err(|e: toml::de::Error| invalid(e.to_string()))?;
        config.validate().map_err(invalid)?;
        Ok(config)
    }

    /// Save configuration to file.
    ///
    /// Written to a sibling temp file first so a crash never leaves a
    /// truncated config behind.
    pub async fn save(&self, config: &Config) -> BundleResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| BundleError::ConfigDirCreate {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }

        let content = toml::to_string_pretty(config)?;
        let staging = self.config_path.with_extension("toml.tmp");
        fs::write(&staging, content)
            .await
            .map_err(|e| BundleError::io(format!("writing config to {}", staging.display()), e))?;
        fs::rename(&staging, &self.config_path).await.map_err(|e| {
            BundleError::io(
                format!("replacing config at {}", self.config_path.display()),
                e,
            )
        })?;

        info!("Configuration saved to {}", self.config_path.display());
        Ok(())
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Known sections absent from a parsed config file
fn defaulted_sections(table: &toml::Table) -> Vec<&'static str> {
    Config::SECTIONS
        .iter()
        .copied()
        .filter(|section| !table.contains_key(*section))
        .collect()
}

/// Runtime policy flags read by the request path and the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub debug_mode: bool,
    pub copy_asset_on_miss: bool,
    pub poll_only_on_preferred_connectivity: bool,
    pub refresh_on_launch: bool,
}

impl Settings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            debug_mode: config.update.debug_mode,
            copy_asset_on_miss: config.update.copy_asset_on_miss,
            poll_only_on_preferred_connectivity: config.update.poll_only_on_preferred_connectivity,
            refresh_on_launch: config.update.refresh_on_launch,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_default_when_missing() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nonexistent.toml");
        let manager = ConfigManager::with_path(path);

        let config = manager.load().await.unwrap();
        assert_eq!(config.update.poll_interval_secs, 3600);
    }

    #[tokio::test]
    async fn save_and_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("config.toml");
        let manager = ConfigManager::with_path(path);

        let mut config = Config::default();
        config.fetch.base_url = Some("https://bundles.example.com".to_string());

        manager.save(&config).await.unwrap();
        let loaded = manager.load().await.unwrap();

        assert_eq!(
            loaded.fetch.base_url.as_deref(),
            Some("https://bundles.example.com")
        );
    }

    #[tokio::test]
    async fn invalid_file_reports_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        tokio::fs::write(&path, "[update]\npoll_interval_secs = \"soon\"")
            .await
            .unwrap();

        let err = ConfigManager::with_path(path.clone()).load().await.unwrap_err();
        assert!(matches!(err, BundleError::ConfigInvalid { path: p, .. } if p == path));
    }

    #[tokio::test]
    async fn partial_file_fills_missing_sections() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        let content = "[fetch]\nbase_url = \"https://bundles.example.com\"\n\n[legacy]\nx = 1\n";
        tokio::fs::write(&path, content).await.unwrap();

        let table: toml::Table = toml::from_str(content).unwrap();
        assert_eq!(
            defaulted_sections(&table),
            vec!["general", "update", "storage", "network"]
        );

        let config = ConfigManager::with_path(path).load().await.unwrap();
        assert_eq!(
            config.fetch.base_url.as_deref(),
            Some("https://bundles.example.com")
        );
        assert_eq!(config.update.max_concurrent_fetches, 4);
    }

    #[tokio::test]
    async fn unusable_values_are_invalid() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        tokio::fs::write(&path, "[update]\nmax_concurrent_fetches = 0\n")
            .await
            .unwrap();

        let err = ConfigManager::with_path(path).load().await.unwrap_err();
        assert!(err.to_string().contains("max_concurrent_fetches"));
        assert!(err.hint().is_some());
    }

    #[tokio::test]
    async fn save_leaves_no_staging_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        ConfigManager::with_path(path.clone())
            .save(&Config::default())
            .await
            .unwrap();

        assert!(path.exists());
        assert!(!temp.path().join("config.toml.tmp").exists());
    }

    #[test]
    fn settings_follow_update_section() {
        let mut config = Config::default();
        config.update.refresh_on_launch = false;
        config.update.debug_mode = true;

        let settings = Settings::from_config(&config);
        assert!(settings.debug_mode);
        assert!(!settings.refresh_on_launch);
        assert!(settings.copy_asset_on_miss);
        assert!(settings.poll_only_on_preferred_connectivity);
    }

    #[test]
    fn storage_dir_prefers_override() {
        let mut config = Config::default();
        config.storage.download_dir = Some(PathBuf::from("/tmp/bundles"));
        assert_eq!(ConfigManager::storage_dir(&config), PathBuf::from("/tmp/bundles"));
    }
}
