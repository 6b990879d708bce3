//! Fetching bundle artifacts
//!
//! [`FetchDispatcher`] is the seam to whatever performs the transfer.
//! [`FetchPool`] runs dispatches on tracked, bounded tasks and turns their
//! outcomes into registry updates and completion events.

pub mod http;
pub mod pool;

pub use http::HttpFetcher;
pub use pool::{Dispatch, FetchOrigin, FetchPool};

use crate::bundle::{CachedVersion, InstallType};
use crate::error::BundleResult;
use async_trait::async_trait;
use std::path::PathBuf;

/// A single fetch to perform
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub bundle_id: String,
    pub install_type: InstallType,
    /// Artifact currently cached for the bundle
    pub current: Option<CachedVersion>,
}

/// Artifact produced by a successful fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedArtifact {
    pub version: String,
    pub location: PathBuf,
}

/// Receiver of transfer progress
pub trait ProgressReporter: Send + Sync {
    /// `percent` in 0..=100 of `max` units
    fn report(&self, percent: f32, max: u64);
}

/// Performs network fetches for bundles
///
/// One instance is shared by every tick and request, so implementations
/// must tolerate sequential and concurrent reuse.
#[async_trait]
pub trait FetchDispatcher: Send + Sync {
    /// Fetch the newest artifact for a bundle
    async fn fetch(
        &self,
        request: &FetchRequest,
        progress: &dyn ProgressReporter,
    ) -> BundleResult<FetchedArtifact>;

    /// Human-readable name for logs
    fn name(&self) -> &'static str;
}
