//! Bundle cache bookkeeping
//!
//! Tracks the newest known artifact per bundle id and the round-robin
//! order in which the scheduler refreshes them.
//!
//! # Slot States
//!
//! | State | Cache hit | Description |
//! |-------|-----------|-------------|
//! | Absent | no | Never seen, or the last on-demand fetch failed |
//! | Pending | no | Fetch in flight, blocks duplicate dispatch |
//! | Present | yes | Artifact stored on disk |
//!
//! Artifacts are stored as `<bundle_id>@<version>.<ext>`.

pub mod naming;
pub mod registry;
pub mod types;
pub mod version;

pub use naming::{file_name, parse_artifact_name, validate_bundle_id, ArtifactName};
pub use registry::{BundleRegistry, RegistryState, Slot};
pub use types::{CachedVersion, InstallType, VersionInfo};
pub use version::is_newer;
