//! Error types for bundlekeeper
//!
//! All modules use `BundleResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for bundlekeeper operations
pub type BundleResult<T> = Result<T, BundleError>;

/// All errors that can occur in bundlekeeper
#[derive(Error, Debug)]
pub enum BundleError {
    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration key: {0}")]
    ConfigKey(String),

    // Artifact naming errors
    #[error("Malformed artifact name: {0}")]
    ArtifactName(String),

    #[error("Invalid bundle id '{bundle_id}': {reason}")]
    InvalidBundleId { bundle_id: String, reason: String },

    // Fetch errors
    #[error("Fetch source not configured. Set fetch.base_url in config.toml")]
    FetchNotConfigured,

    #[error("Fetch failed for {bundle_id}: {reason}")]
    Fetch { bundle_id: String, reason: String },

    #[error("Invalid manifest for {bundle_id}: {reason}")]
    Manifest { bundle_id: String, reason: String },

    #[error("Fetch for {0} was cancelled")]
    FetchCancelled(String),

    // Service errors
    #[error("Update service is not running")]
    ServiceStopped,

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl BundleError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a fetch error for a bundle
    pub fn fetch(bundle_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Fetch {
            bundle_id: bundle_id.into(),
            reason: reason.into(),
        }
    }

    /// Create a manifest error for a bundle
    pub fn manifest(bundle_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Manifest {
            bundle_id: bundle_id.into(),
            reason: reason.into(),
        }
    }

    /// Check if error is retryable
    ///
    /// The core never retries by itself; the next tick or request does.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Fetch { .. } | Self::FetchCancelled(_) | Self::Io { .. }
        )
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::FetchNotConfigured => Some("Run: bundlekeeper config init, then set fetch.base_url"),
            Self::ConfigInvalid { .. } => Some("Run: bundlekeeper config show"),
            Self::ServiceStopped => Some("Start the service with: bundlekeeper run"),
            Self::ConfigKey(_) => Some("Run: bundlekeeper config set --help for valid keys"),
            Self::InvalidBundleId { .. } => {
                Some("Bundle ids may not be empty or contain '@', '/', '\\' or '..'")
            }
            _ => None,
        }
    }
}
