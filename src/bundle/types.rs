//! Bundle value types shared by the registry, fetchers and events

use crate::error::BundleError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Why a request was made
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallType {
    /// Routine update check
    Update,
    /// Fresh install
    Install,
    /// Launch-time check
    Launch,
}

impl fmt::Display for InstallType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Update => "update",
            Self::Install => "install",
            Self::Launch => "launch",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for InstallType {
    type Err = BundleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "update" => Ok(Self::Update),
            "install" => Ok(Self::Install),
            "launch" => Ok(Self::Launch),
            other => Err(BundleError::User(format!(
                "Unknown install type '{}'. Valid types: update, install, launch",
                other
            ))),
        }
    }
}

/// Locally stored artifact descriptor for a bundle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedVersion {
    /// Bundle identifier
    pub bundle_id: String,

    /// Version string as published by the source
    pub version: String,

    /// Path of the stored artifact
    pub location: PathBuf,
}

impl CachedVersion {
    /// Create a new cached version
    pub fn new(bundle_id: impl Into<String>, version: impl Into<String>, location: PathBuf) -> Self {
        Self {
            bundle_id: bundle_id.into(),
            version: version.into(),
            location,
        }
    }

    /// Version info attached to events for this artifact
    pub fn version_info(&self) -> VersionInfo {
        VersionInfo {
            bundle_id: self.bundle_id.clone(),
            version: self.version.clone(),
        }
    }
}

/// (bundle id, version) pair carried by events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub bundle_id: String,
    pub version: String,
}

impl fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.bundle_id, self.version)
    }
}
