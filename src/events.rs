//! Update events and their delivery
//!
//! Every dispatched fetch produces zero or more `progress` events followed by
//! one terminal `completion` for the request that started it, plus one
//! `completion` for every request that joined it while it was pending.
//!
//! Delivery through [`ChannelSink`] is at-most-once: events emitted while
//! nobody is subscribed, or that a slow subscriber lags behind on, are lost.

use crate::bundle::{CachedVersion, InstallType, VersionInfo};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

/// Default number of events buffered per subscriber
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Notification emitted by the update engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum UpdateEvent {
    /// Terminal outcome of a request
    Completion {
        bundle_id: String,
        version_info: Option<VersionInfo>,
        success: bool,
        error: Option<String>,
        install_type: InstallType,
        from_cache: bool,
    },

    /// Transfer progress of an in-flight fetch
    Progress {
        bundle_id: String,
        percent: f32,
        max: u64,
        install_type: InstallType,
    },
}

impl UpdateEvent {
    /// Completion answered from the cache
    pub fn cache_hit(cached: &CachedVersion, install_type: InstallType) -> Self {
        Self::Completion {
            bundle_id: cached.bundle_id.clone(),
            version_info: Some(cached.version_info()),
            success: true,
            error: None,
            install_type,
            from_cache: true,
        }
    }

    /// Completion of a successful fetch
    pub fn fetched(version_info: VersionInfo, install_type: InstallType) -> Self {
        Self::Completion {
            bundle_id: version_info.bundle_id.clone(),
            version_info: Some(version_info),
            success: true,
            error: None,
            install_type,
            from_cache: false,
        }
    }

    /// Completion of a failed fetch
    pub fn failed(
        bundle_id: &str,
        version_info: Option<VersionInfo>,
        error: impl Into<String>,
        install_type: InstallType,
    ) -> Self {
        Self::Completion {
            bundle_id: bundle_id.to_string(),
            version_info,
            success: false,
            error: Some(error.into()),
            install_type,
            from_cache: false,
        }
    }

    /// Bundle the event refers to
    pub fn bundle_id(&self) -> &str {
        match self {
            Self::Completion { bundle_id, .. } | Self::Progress { bundle_id, .. } => bundle_id,
        }
    }

    /// Whether this is a terminal completion event
    pub fn is_completion(&self) -> bool {
        matches!(self, Self::Completion { .. })
    }
}

/// Consumer of update events
///
/// Emission is fire-and-forget and must not block: sinks are called from
/// fetch tasks and request handlers.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: UpdateEvent);
}

/// Broadcast-channel event sink
pub struct ChannelSink {
    tx: broadcast::Sender<UpdateEvent>,
}

impl ChannelSink {
    /// Create a sink buffering `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to events emitted from now on
    pub fn subscribe(&self) -> broadcast::Receiver<UpdateEvent> {
        self.tx.subscribe()
    }
}

impl Default for ChannelSink {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: UpdateEvent) {
        if self.tx.send(event).is_err() {
            trace!("No subscribers, event dropped");
        }
    }
}
