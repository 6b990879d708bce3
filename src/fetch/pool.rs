//! Bounded, tracked pool of fetch tasks
//!
//! Every dispatch runs on its own task, limited by a semaphore. Tasks are
//! tracked so shutdown can cancel and drain them.

use crate::bundle::{BundleRegistry, CachedVersion, InstallType, VersionInfo};
use crate::error::{BundleError, BundleResult};
use crate::events::{EventSink, UpdateEvent};
use crate::fetch::{FetchDispatcher, FetchRequest, FetchedArtifact, ProgressReporter};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Who asked for a fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOrigin {
    /// Periodic scheduler tick
    Scheduled,
    /// On-demand request that marked the bundle pending
    OnDemand,
    /// Background refresh after a launch cache hit
    Refresh,
}

/// Result of [`FetchPool::dispatch`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// A fetch task was spawned
    Started,
    /// A fetch for the bundle is already running; nothing was spawned
    InFlight,
    /// The pool has been shut down
    Stopped,
}

impl Dispatch {
    pub fn started(self) -> bool {
        self == Self::Started
    }
}

/// Running fetch count per bundle
type ActiveFetches = Arc<Mutex<HashMap<String, usize>>>;

/// Pool running fetches outside the registry lock
pub struct FetchPool {
    registry: Arc<BundleRegistry>,
    dispatcher: Arc<dyn FetchDispatcher>,
    events: Arc<dyn EventSink>,
    permits: Arc<Semaphore>,
    active: ActiveFetches,
    tracker: TaskTracker,
    shutdown: CancellationToken,
}

impl FetchPool {
    /// Create a pool running at most `max_concurrent` fetches at once
    pub fn new(
        registry: Arc<BundleRegistry>,
        dispatcher: Arc<dyn FetchDispatcher>,
        events: Arc<dyn EventSink>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            registry,
            dispatcher,
            events,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            active: Arc::default(),
            tracker: TaskTracker::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Start a fetch for a bundle.
    ///
    /// Scheduled and refresh fetches are dropped while another fetch for the
    /// same bundle runs. On-demand fetches are deduplicated by the registry's
    /// pending slot instead and always start.
    pub fn dispatch(&self, bundle_id: &str, install_type: InstallType, origin: FetchOrigin) -> Dispatch {
        if self.shutdown.is_cancelled() {
            warn!("Fetch pool shut down, not fetching {}", bundle_id);
            return Dispatch::Stopped;
        }

        {
            let mut active = lock_active(&self.active);
            let running = active.entry(bundle_id.to_string()).or_insert(0);
            if *running > 0 && origin != FetchOrigin::OnDemand {
                debug!(?origin, "Fetch for {} already in flight", bundle_id);
                return Dispatch::InFlight;
            }
            *running += 1;
        }

        let request = FetchRequest {
            bundle_id: bundle_id.to_string(),
            install_type,
            current: self.registry.lookup(bundle_id),
        };

        let job = FetchJob {
            id: Uuid::new_v4(),
            origin,
            registry: Arc::clone(&self.registry),
            dispatcher: Arc::clone(&self.dispatcher),
            events: Arc::clone(&self.events),
            permits: Arc::clone(&self.permits),
            active: Arc::clone(&self.active),
            shutdown: self.shutdown.clone(),
        };

        debug!(fetch_id = %job.id, ?origin, "Dispatching fetch for {} via {}", bundle_id, self.dispatcher.name());
        self.tracker.spawn(job.run(request));
        Dispatch::Started
    }

    /// Whether a fetch for the bundle is running
    pub fn is_fetching(&self, bundle_id: &str) -> bool {
        lock_active(&self.active)
            .get(bundle_id)
            .is_some_and(|running| *running > 0)
    }

    /// Number of fetch tasks not yet finished
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Wait until every fetch dispatched so far has finished
    pub async fn wait_idle(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    /// Cancel in-flight fetches, refuse new ones and wait for tasks to exit
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        info!("Fetch pool stopped");
    }

    /// Whether [`FetchPool::shutdown`] has been called
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

fn lock_active(active: &ActiveFetches) -> std::sync::MutexGuard<'_, HashMap<String, usize>> {
    active.lock().unwrap_or_else(|p| p.into_inner())
}

/// Progress reporter turning transfer progress into events
struct EventProgress<'a> {
    bundle_id: &'a str,
    install_type: InstallType,
    events: &'a dyn EventSink,
}

impl ProgressReporter for EventProgress<'_> {
    fn report(&self, percent: f32, max: u64) {
        self.events.emit(UpdateEvent::Progress {
            bundle_id: self.bundle_id.to_string(),
            percent: percent.clamp(0.0, 100.0),
            max,
            install_type: self.install_type,
        });
    }
}

struct FetchJob {
    id: Uuid,
    origin: FetchOrigin,
    registry: Arc<BundleRegistry>,
    dispatcher: Arc<dyn FetchDispatcher>,
    events: Arc<dyn EventSink>,
    permits: Arc<Semaphore>,
    active: ActiveFetches,
    shutdown: CancellationToken,
}

impl FetchJob {
    async fn run(self, request: FetchRequest) {
        let result = tokio::select! {
            biased;

            _ = self.shutdown.cancelled() => {
                Err(BundleError::FetchCancelled(request.bundle_id.clone()))
            }

            result = self.fetch(&request) => result,
        };

        self.release(&request.bundle_id);
        self.finish(&request, result);
    }

    fn release(&self, bundle_id: &str) {
        let mut active = lock_active(&self.active);
        if let Some(running) = active.get_mut(bundle_id) {
            *running = running.saturating_sub(1);
            if *running == 0 {
                active.remove(bundle_id);
            }
        }
    }

    async fn fetch(&self, request: &FetchRequest) -> BundleResult<FetchedArtifact> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| BundleError::FetchCancelled(request.bundle_id.clone()))?;

        let progress = EventProgress {
            bundle_id: &request.bundle_id,
            install_type: request.install_type,
            events: self.events.as_ref(),
        };
        self.dispatcher.fetch(request, &progress).await
    }

    fn finish(&self, request: &FetchRequest, result: BundleResult<FetchedArtifact>) {
        let bundle_id = request.bundle_id.as_str();

        match result {
            Ok(artifact) => {
                let info = VersionInfo {
                    bundle_id: bundle_id.to_string(),
                    version: artifact.version.clone(),
                };
                let joined = self
                    .registry
                    .register(bundle_id, &artifact.version, artifact.location);

                info!(fetch_id = %self.id, "Fetched {}", info);
                self.events
                    .emit(UpdateEvent::fetched(info.clone(), request.install_type));
                for install_type in joined {
                    self.events.emit(UpdateEvent::fetched(info.clone(), install_type));
                }
            }
            Err(e) => {
                warn!(fetch_id = %self.id, "Fetch for {} failed: {}", bundle_id, e);

                // Only the fetch that owns the pending slot may release it
                let joined = if self.origin == FetchOrigin::OnDemand {
                    self.registry.abandon_pending(bundle_id)
                } else {
                    Vec::new()
                };

                let info = request.current.as_ref().map(CachedVersion::version_info);
                let error = e.to_string();
                self.events.emit(UpdateEvent::failed(
                    bundle_id,
                    info.clone(),
                    error.clone(),
                    request.install_type,
                ));
                for install_type in joined {
                    self.events
                        .emit(UpdateEvent::failed(bundle_id, info.clone(), error.clone(), install_type));
                }
            }
        }
    }
}
