//! HTTP fetcher for a static bundle repository
//!
//! Layout served under `fetch.base_url`:
//!
//! ```text
//! <base>/<bundle_id>/latest.json          {"version": "1.3", "url": "..."}
//! <base>/<bundle_id>/<bundle_id>@<ver>.<ext>
//! ```
//!
//! `url` is optional and overrides the artifact location. Transfers run on
//! the blocking pool and stream progress back over a channel.

use crate::bundle::{file_name, is_newer, validate_bundle_id, CachedVersion};
use crate::config::schema::FetchConfig;
use crate::error::{BundleError, BundleResult};
use crate::fetch::{FetchDispatcher, FetchRequest, FetchedArtifact, ProgressReporter};
use async_trait::async_trait;
use serde::Deserialize;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};
use ureq::Agent;

/// Transfer buffer size
const CHUNK_SIZE: usize = 64 * 1024;

/// Suffix of artifacts still being written
const PARTIAL_SUFFIX: &str = "part";

/// Published metadata for a bundle's newest version
#[derive(Debug, Deserialize)]
struct Manifest {
    version: String,
    #[serde(default)]
    url: Option<String>,
}

/// Fetcher downloading artifacts over HTTP(S)
pub struct HttpFetcher {
    base_url: Option<String>,
    storage_dir: PathBuf,
    extension: String,
    agent: Agent,
}

impl HttpFetcher {
    /// Create a fetcher writing artifacts with `extension` into `storage_dir`
    pub fn new(config: &FetchConfig, storage_dir: PathBuf, extension: &str) -> Self {
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_secs)))
            .build()
            .into();
        Self::with_agent(config, storage_dir, extension, agent)
    }

    fn with_agent(config: &FetchConfig, storage_dir: PathBuf, extension: &str, agent: Agent) -> Self {
        Self {
            base_url: config
                .base_url
                .as_ref()
                .map(|url| url.trim_end_matches('/').to_string()),
            storage_dir,
            extension: extension.to_string(),
            agent,
        }
    }
}

#[async_trait]
impl FetchDispatcher for HttpFetcher {
    async fn fetch(
        &self,
        request: &FetchRequest,
        progress: &dyn ProgressReporter,
    ) -> BundleResult<FetchedArtifact> {
        validate_bundle_id(&request.bundle_id)?;
        let base_url = self
            .base_url
            .clone()
            .ok_or(BundleError::FetchNotConfigured)?;

        let transfer = Transfer {
            agent: self.agent.clone(),
            base_url,
            storage_dir: self.storage_dir.clone(),
            extension: self.extension.clone(),
            bundle_id: request.bundle_id.clone(),
            current: request.current.clone(),
        };

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut handle = tokio::task::spawn_blocking(move || transfer.run(tx));

        loop {
            tokio::select! {
                Some((percent, max)) = rx.recv() => progress.report(percent, max),
                joined = &mut handle => {
                    while let Ok((percent, max)) = rx.try_recv() {
                        progress.report(percent, max);
                    }
                    return joined.map_err(|e| {
                        BundleError::Internal(format!("fetch task for {} failed: {}", request.bundle_id, e))
                    })?;
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// One blocking transfer
struct Transfer {
    agent: Agent,
    base_url: String,
    storage_dir: PathBuf,
    extension: String,
    bundle_id: String,
    current: Option<CachedVersion>,
}

impl Transfer {
    fn run(self, progress: mpsc::UnboundedSender<(f32, u64)>) -> BundleResult<FetchedArtifact> {
        let manifest = self.manifest()?;
        validate_version(&self.bundle_id, &manifest.version)?;

        if let Some(current) = &self.current {
            if !is_newer(&manifest.version, &current.version) && current.location.exists() {
                debug!("{}@{} is up to date", self.bundle_id, current.version);
                return Ok(FetchedArtifact {
                    version: current.version.clone(),
                    location: current.location.clone(),
                });
            }
        }

        let url = match manifest.url {
            Some(url) => url,
            None => format!(
                "{}/{}/{}",
                self.base_url,
                self.bundle_id,
                file_name(&self.bundle_id, &manifest.version, &self.extension)
            ),
        };
        self.download(&url, &manifest.version, &progress)
    }

    fn manifest(&self) -> BundleResult<Manifest> {
        let url = format!("{}/{}/latest.json", self.base_url, self.bundle_id);
        debug!("Reading manifest {}", url);

        let mut response = self
            .agent
            .get(&url)
            .call()
            .map_err(|e| BundleError::fetch(&self.bundle_id, format!("GET {}: {}", url, e)))?;
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| BundleError::fetch(&self.bundle_id, format!("reading {}: {}", url, e)))?;

        serde_json::from_str(&body)
            .map_err(|e| BundleError::manifest(&self.bundle_id, e.to_string()))
    }

    fn download(
        &self,
        url: &str,
        version: &str,
        progress: &mpsc::UnboundedSender<(f32, u64)>,
    ) -> BundleResult<FetchedArtifact> {
        let mut response = self
            .agent
            .get(url)
            .call()
            .map_err(|e| BundleError::fetch(&self.bundle_id, format!("GET {}: {}", url, e)))?;
        let total = response.body().content_length().unwrap_or(0);

        fs::create_dir_all(&self.storage_dir).map_err(|e| {
            BundleError::io(format!("creating {}", self.storage_dir.display()), e)
        })?;
        let name = file_name(&self.bundle_id, version, &self.extension);
        let target = self.storage_dir.join(&name);
        let partial = self.storage_dir.join(format!("{}.{}", name, PARTIAL_SUFFIX));

        let written = match self.write_body(&mut response, &partial, total, progress) {
            Ok(written) => written,
            Err(e) => {
                let _ = fs::remove_file(&partial);
                return Err(e);
            }
        };
        if total == 0 {
            let _ = progress.send((100.0, written));
        }

        fs::rename(&partial, &target)
            .map_err(|e| BundleError::io(format!("moving artifact to {}", target.display()), e))?;

        info!("Downloaded {} ({} bytes)", name, written);
        Ok(FetchedArtifact {
            version: version.to_string(),
            location: target,
        })
    }

    fn write_body(
        &self,
        response: &mut ureq::http::Response<ureq::Body>,
        partial: &std::path::Path,
        total: u64,
        progress: &mpsc::UnboundedSender<(f32, u64)>,
    ) -> BundleResult<u64> {
        let mut file = File::create(partial)
            .map_err(|e| BundleError::io(format!("creating {}", partial.display()), e))?;
        let mut reader = response.body_mut().as_reader();
        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut written: u64 = 0;

        loop {
            let n = reader
                .read(&mut buf)
                .map_err(|e| BundleError::fetch(&self.bundle_id, format!("download interrupted: {}", e)))?;
            if n == 0 {
                break;
            }
            file.write_all(&buf[..n])
                .map_err(|e| BundleError::io(format!("writing {}", partial.display()), e))?;
            written += n as u64;

            if total > 0 {
                let percent = (written as f64 / total as f64 * 100.0) as f32;
                // Receiver gone means the fetch was cancelled
                if progress.send((percent, total)).is_err() {
                    return Err(BundleError::FetchCancelled(self.bundle_id.clone()));
                }
            }
        }

        file.sync_all()
            .map_err(|e| BundleError::io(format!("syncing {}", partial.display()), e))?;
        Ok(written)
    }
}

/// Reject versions that cannot round-trip through an artifact file name
fn validate_version(bundle_id: &str, version: &str) -> BundleResult<()> {
    if version.is_empty() {
        return Err(BundleError::manifest(bundle_id, "empty version"));
    }
    if version.contains(['@', '/', '\\']) {
        return Err(BundleError::manifest(
            bundle_id,
            format!("version '{}' contains a reserved character", version),
        ));
    }
    Ok(())
}
