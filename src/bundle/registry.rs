//! Bundle registry: cached versions plus the round-robin refresh queue
//!
//! All state lives in [`RegistryState`] behind a single mutex. Callers that
//! need several steps to be atomic (check, seed, mark pending) run them in
//! one [`BundleRegistry::with_state`] critical section. No `.await` happens
//! while the lock is held.

use crate::bundle::naming::parse_artifact_name;
use crate::bundle::types::{CachedVersion, InstallType};
use crate::error::{BundleError, BundleResult};
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Public view of a bundle's slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot {
    Absent,
    Pending,
    Present(CachedVersion),
}

#[derive(Debug)]
enum Entry {
    Absent,
    /// Requests that joined the in-flight fetch after it was dispatched
    Pending(Vec<InstallType>),
    Present(CachedVersion),
}

/// Registry state guarded by the registry lock
#[derive(Debug, Default)]
pub struct RegistryState {
    entries: HashMap<String, Entry>,
    queue: VecDeque<String>,
}

impl RegistryState {
    /// Current slot for a bundle
    pub fn slot(&self, bundle_id: &str) -> Slot {
        match self.entries.get(bundle_id) {
            None | Some(Entry::Absent) => Slot::Absent,
            Some(Entry::Pending(_)) => Slot::Pending,
            Some(Entry::Present(cached)) => Slot::Present(cached.clone()),
        }
    }

    /// Store an artifact for a bundle, evicting a superseded one.
    ///
    /// Returns the requests that were waiting on a pending fetch for this
    /// bundle; they are resolved by this registration.
    pub fn register(
        &mut self,
        bundle_id: &str,
        version: &str,
        location: PathBuf,
    ) -> Vec<InstallType> {
        let cached = CachedVersion::new(bundle_id, version, location.clone());

        match self.entries.insert(bundle_id.to_string(), Entry::Present(cached)) {
            None => {
                self.queue.push_front(bundle_id.to_string());
                info!("Registered {}@{}", bundle_id, version);
                Vec::new()
            }
            Some(Entry::Present(old)) => {
                if old.location != location {
                    evict(&old.location);
                }
                info!("Updated {} from {} to {}", bundle_id, old.version, version);
                Vec::new()
            }
            Some(Entry::Pending(joined)) => {
                info!("Registered {}@{} (pending fetch resolved)", bundle_id, version);
                joined
            }
            Some(Entry::Absent) => {
                info!("Registered {}@{}", bundle_id, version);
                Vec::new()
            }
        }
    }

    /// Mark a bundle as having a fetch in flight.
    ///
    /// Returns false if the bundle is already pending or present.
    pub fn mark_pending(&mut self, bundle_id: &str) -> bool {
        match self.entries.get(bundle_id) {
            Some(Entry::Pending(_)) | Some(Entry::Present(_)) => false,
            Some(Entry::Absent) => {
                self.entries
                    .insert(bundle_id.to_string(), Entry::Pending(Vec::new()));
                true
            }
            None => {
                self.entries
                    .insert(bundle_id.to_string(), Entry::Pending(Vec::new()));
                self.queue.push_front(bundle_id.to_string());
                true
            }
        }
    }

    /// Attach a request to an in-flight fetch.
    ///
    /// Returns false if the bundle is not pending.
    pub fn join_pending(&mut self, bundle_id: &str, install_type: InstallType) -> bool {
        match self.entries.get_mut(bundle_id) {
            Some(Entry::Pending(joined)) => {
                joined.push(install_type);
                true
            }
            _ => false,
        }
    }

    /// Return a pending bundle to absent after its fetch failed.
    ///
    /// The bundle keeps its queue position. Returns the joined requests.
    pub fn abandon_pending(&mut self, bundle_id: &str) -> Vec<InstallType> {
        if let Some(entry) = self.entries.get_mut(bundle_id) {
            if let Entry::Pending(joined) = entry {
                let joined = std::mem::take(joined);
                *entry = Entry::Absent;
                return joined;
            }
        }
        Vec::new()
    }

    /// Move the front of the queue to the back and return it
    pub fn rotate(&mut self) -> Option<String> {
        let bundle_id = self.queue.pop_front()?;
        self.queue.push_back(bundle_id.clone());
        Some(bundle_id)
    }

    /// Queue order, front first
    pub fn queue(&self) -> Vec<String> {
        self.queue.iter().cloned().collect()
    }

    /// All present entries, sorted by bundle id
    pub fn present(&self) -> Vec<CachedVersion> {
        let mut cached: Vec<CachedVersion> = self
            .entries
            .values()
            .filter_map(|entry| match entry {
                Entry::Present(cached) => Some(cached.clone()),
                _ => None,
            })
            .collect();
        cached.sort_by(|a, b| a.bundle_id.cmp(&b.bundle_id));
        cached
    }
}

/// Delete a superseded artifact. Failure leaves the file behind.
fn evict(location: &Path) {
    match fs::remove_file(location) {
        Ok(()) => debug!("Deleted superseded artifact {}", location.display()),
        Err(e) => warn!(
            "Failed to delete superseded artifact {}: {}",
            location.display(),
            e
        ),
    }
}

/// Registry of cached bundle versions
pub struct BundleRegistry {
    storage_dir: PathBuf,
    extensions: Vec<String>,
    state: Mutex<RegistryState>,
}

impl BundleRegistry {
    /// Create an empty registry over a storage directory
    pub fn new(storage_dir: PathBuf, extensions: Vec<String>) -> Self {
        Self {
            storage_dir,
            extensions,
            state: Mutex::new(RegistryState::default()),
        }
    }

    /// Directory holding the artifacts
    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    /// Recognized artifact extensions
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        // A panic mid-update leaves per-bundle state consistent, so keep going
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run `f` with the registry lock held
    pub fn with_state<R>(&self, f: impl FnOnce(&mut RegistryState) -> R) -> R {
        f(&mut self.lock())
    }

    /// Scan the storage directory and register every well-formed artifact.
    ///
    /// Returns the number of artifacts registered. A bad entry is logged
    /// and skipped.
    pub fn load(&self) -> BundleResult<usize> {
        if !self.storage_dir.exists() {
            debug!("Storage dir {} missing, nothing to load", self.storage_dir.display());
            return Ok(0);
        }

        let entries = fs::read_dir(&self.storage_dir).map_err(|e| {
            BundleError::io(
                format!("reading storage directory {}", self.storage_dir.display()),
                e,
            )
        })?;

        let mut loaded = 0;
        for entry in entries {
            match self.load_entry(entry) {
                Ok(true) => loaded += 1,
                Ok(false) => {}
                Err(e) => warn!("Skipping storage entry: {}", e),
            }
        }

        info!("Loaded {} cached bundle(s) from {}", loaded, self.storage_dir.display());
        Ok(loaded)
    }

    fn load_entry(&self, entry: std::io::Result<fs::DirEntry>) -> BundleResult<bool> {
        let entry = entry.map_err(|e| BundleError::io("reading storage entry", e))?;
        let file_type = entry
            .file_type()
            .map_err(|e| BundleError::io(format!("inspecting {}", entry.path().display()), e))?;
        if !file_type.is_file() {
            return Ok(false);
        }

        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            debug!("Skipping non UTF-8 file name {:?}", name);
            return Ok(false);
        };

        let parsed = match parse_artifact_name(name, &self.extensions) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!("Skipping {}", e);
                return Ok(false);
            }
        };

        self.register(&parsed.bundle_id, &parsed.version, entry.path());
        Ok(true)
    }

    /// Store an artifact for a bundle. See [`RegistryState::register`].
    pub fn register(&self, bundle_id: &str, version: &str, location: PathBuf) -> Vec<InstallType> {
        self.lock().register(bundle_id, version, location)
    }

    /// Mark a bundle pending. See [`RegistryState::mark_pending`].
    pub fn mark_pending(&self, bundle_id: &str) -> bool {
        self.lock().mark_pending(bundle_id)
    }

    /// Return a failed pending bundle to absent
    pub fn abandon_pending(&self, bundle_id: &str) -> Vec<InstallType> {
        self.lock().abandon_pending(bundle_id)
    }

    /// Present entry for a bundle, if any
    pub fn lookup(&self, bundle_id: &str) -> Option<CachedVersion> {
        match self.lock().slot(bundle_id) {
            Slot::Present(cached) => Some(cached),
            _ => None,
        }
    }

    /// Current slot for a bundle
    pub fn slot(&self, bundle_id: &str) -> Slot {
        self.lock().slot(bundle_id)
    }

    /// Rotate the round-robin queue
    pub fn rotate(&self) -> Option<String> {
        self.lock().rotate()
    }

    /// Snapshot of the queue, front first
    pub fn queue(&self) -> Vec<String> {
        self.lock().queue()
    }

    /// Snapshot of all present entries
    pub fn present(&self) -> Vec<CachedVersion> {
        self.lock().present()
    }
}
