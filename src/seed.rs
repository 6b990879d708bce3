//! Seeding the cache from bundled assets
//!
//! A fresh installation ships artifacts in an asset directory. On a cache
//! miss the matching asset is copied into storage so the request can be
//! answered without touching the network.

use crate::bundle::{
    file_name, is_newer, parse_artifact_name, validate_bundle_id, ArtifactName, CachedVersion,
};
use crate::error::{BundleError, BundleResult};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info};

/// Copies bundled assets into the storage directory
#[derive(Debug, Clone)]
pub struct AssetSeeder {
    asset_dir: PathBuf,
    storage_dir: PathBuf,
    extensions: Vec<String>,
    primary_extension: String,
}

impl AssetSeeder {
    pub fn new(
        asset_dir: PathBuf,
        storage_dir: PathBuf,
        extensions: Vec<String>,
        primary_extension: impl Into<String>,
    ) -> Self {
        Self {
            asset_dir,
            storage_dir,
            extensions,
            primary_extension: primary_extension.into(),
        }
    }

    /// Find the newest bundled asset for a bundle
    pub fn find(&self, bundle_id: &str) -> BundleResult<Option<(ArtifactName, PathBuf)>> {
        if !self.asset_dir.exists() {
            return Ok(None);
        }

        let entries = fs::read_dir(&self.asset_dir).map_err(|e| {
            BundleError::io(format!("reading asset directory {}", self.asset_dir.display()), e)
        })?;

        let mut best: Option<(ArtifactName, PathBuf)> = None;
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !name.starts_with(bundle_id) {
                continue;
            }
            // A prefix match is not enough: "maps" must not pick up "maps-pro@1.jar"
            let Ok(parsed) = parse_artifact_name(name, &self.extensions) else {
                continue;
            };
            if parsed.bundle_id != bundle_id {
                continue;
            }

            let newer = match &best {
                Some((current, _)) => is_newer(&parsed.version, &current.version),
                None => true,
            };
            if newer {
                best = Some((parsed, entry.path()));
            }
        }

        Ok(best)
    }

    /// Copy the bundled asset for a bundle into storage.
    ///
    /// Returns `None` when no asset exists for the bundle. The stored copy
    /// always uses the primary extension.
    pub fn seed(&self, bundle_id: &str) -> BundleResult<Option<CachedVersion>> {
        validate_bundle_id(bundle_id)?;
        let Some((asset, source)) = self.find(bundle_id)? else {
            debug!("No bundled asset for {}", bundle_id);
            return Ok(None);
        };

        fs::create_dir_all(&self.storage_dir).map_err(|e| {
            BundleError::io(format!("creating {}", self.storage_dir.display()), e)
        })?;
        let target = self.storage_dir.join(file_name(
            &asset.bundle_id,
            &asset.version,
            &self.primary_extension,
        ));
        fs::copy(&source, &target).map_err(|e| {
            BundleError::io(
                format!("copying {} to {}", source.display(), target.display()),
                e,
            )
        })?;

        info!("Seeded {}@{} from {}", asset.bundle_id, asset.version, source.display());
        Ok(Some(CachedVersion::new(asset.bundle_id, asset.version, target)))
    }
}
