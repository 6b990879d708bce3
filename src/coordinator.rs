//! On-demand bundle requests
//!
//! A request is answered from the cache when possible. On a miss it either
//! starts a fetch or, when one is already pending for the bundle, joins it
//! and is notified when that fetch completes.

use crate::bundle::{validate_bundle_id, BundleRegistry, CachedVersion, InstallType, Slot};
use crate::config::Settings;
use crate::error::BundleError;
use crate::events::{EventSink, UpdateEvent};
use crate::fetch::{Dispatch, FetchOrigin, FetchPool};
use crate::seed::AssetSeeder;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// How a request was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// Answered from the cache; `refreshing` when a background fetch was
    /// also started and will complete separately
    CacheHit { refreshing: bool },
    /// A fetch was started for the bundle
    Dispatched,
    /// Joined a fetch already pending for the bundle
    Joined,
    /// No fetch could be started; a failed completion was emitted
    Rejected,
}

impl RequestOutcome {
    /// Completion events the requester should expect
    pub fn expected_completions(self) -> usize {
        match self {
            Self::CacheHit { refreshing: true } => 2,
            _ => 1,
        }
    }
}

/// Decision taken under the registry lock
enum Plan {
    Hit { cached: CachedVersion, refresh: bool },
    Join,
    Fetch,
}

/// Handles explicit bundle requests
pub struct RequestCoordinator {
    registry: Arc<BundleRegistry>,
    pool: Arc<FetchPool>,
    events: Arc<dyn EventSink>,
    seeder: Option<AssetSeeder>,
    settings: Settings,
}

impl RequestCoordinator {
    pub fn new(
        registry: Arc<BundleRegistry>,
        pool: Arc<FetchPool>,
        events: Arc<dyn EventSink>,
        seeder: Option<AssetSeeder>,
        settings: Settings,
    ) -> Self {
        Self {
            registry,
            pool,
            events,
            seeder,
            settings,
        }
    }

    /// Handle a request for a bundle.
    ///
    /// Never consults the network policy: explicit requests always proceed.
    /// Ids that cannot be stored as an artifact name are rejected before the
    /// registry is touched.
    pub fn handle_request(&self, bundle_id: &str, install_type: InstallType) -> RequestOutcome {
        if let Err(e) = validate_bundle_id(bundle_id) {
            warn!("Rejected request: {}", e);
            self.events
                .emit(UpdateEvent::failed(bundle_id, None, e.to_string(), install_type));
            return RequestOutcome::Rejected;
        }

        let plan = self
            .registry
            .with_state(|state| {
                if state.slot(bundle_id) == Slot::Absent {
                    if let Some(cached) = self.try_seed(bundle_id) {
                        state.register(&cached.bundle_id, &cached.version, cached.location);
                    }
                }

                match state.slot(bundle_id) {
                    Slot::Present(cached) => Plan::Hit {
                        cached,
                        refresh: install_type == InstallType::Launch
                            && self.settings.refresh_on_launch,
                    },
                    Slot::Pending => {
                        state.join_pending(bundle_id, install_type);
                        Plan::Join
                    }
                    Slot::Absent => {
                        state.mark_pending(bundle_id);
                        Plan::Fetch
                    }
                }
            });

        match plan {
            Plan::Hit { cached, refresh } => {
                debug!("Cache hit for {}@{}", cached.bundle_id, cached.version);
                self.events.emit(UpdateEvent::cache_hit(&cached, install_type));

                let refreshing = refresh
                    && self
                        .pool
                        .dispatch(bundle_id, install_type, FetchOrigin::Refresh)
                        .started();
                RequestOutcome::CacheHit { refreshing }
            }
            Plan::Join => {
                debug!("Joined pending fetch for {}", bundle_id);
                RequestOutcome::Joined
            }
            Plan::Fetch => match self
                .pool
                .dispatch(bundle_id, install_type, FetchOrigin::OnDemand)
            {
                Dispatch::Started => {
                    info!("Fetching {} ({})", bundle_id, install_type);
                    RequestOutcome::Dispatched
                }
                Dispatch::InFlight | Dispatch::Stopped => self.reject(bundle_id, install_type),
            },
        }
    }

    /// Seed a missing bundle from the asset directory when enabled
    fn try_seed(&self, bundle_id: &str) -> Option<CachedVersion> {
        if !self.settings.copy_asset_on_miss {
            return None;
        }
        let seeder = self.seeder.as_ref()?;
        match seeder.seed(bundle_id) {
            Ok(cached) => cached,
            Err(e) => {
                warn!("Seeding {} failed: {}", bundle_id, e);
                None
            }
        }
    }

    fn reject(&self, bundle_id: &str, install_type: InstallType) -> RequestOutcome {
        let joined = self.registry.abandon_pending(bundle_id);
        let error = BundleError::ServiceStopped.to_string();

        warn!("Cannot fetch {}: {}", bundle_id, error);
        for install_type in std::iter::once(install_type).chain(joined) {
            self.events
                .emit(UpdateEvent::failed(bundle_id, None, error.clone(), install_type));
        }
        RequestOutcome::Rejected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingSink, ScriptedDispatcher};
    use std::fs;
    use tempfile::TempDir;
    use tokio::sync::Semaphore;

    struct Harness {
        storage: TempDir,
        assets: TempDir,
        registry: Arc<BundleRegistry>,
        dispatcher: Arc<ScriptedDispatcher>,
        release: Arc<Semaphore>,
        events: Arc<RecordingSink>,
        pool: Arc<FetchPool>,
    }

    impl Harness {
        fn new() -> Self {
            let storage = TempDir::new().unwrap();
            let assets = TempDir::new().unwrap();
            let registry = Arc::new(BundleRegistry::new(
                storage.path().to_path_buf(),
                vec!["jar".to_string()],
            ));
            let (dispatcher, release) = ScriptedDispatcher::gated(storage.path());
            let dispatcher = Arc::new(dispatcher);
            let events = Arc::new(RecordingSink::default());
            let pool = Arc::new(FetchPool::new(
                registry.clone(),
                dispatcher.clone(),
                events.clone(),
                4,
            ));
            Self {
                storage,
                assets,
                registry,
                dispatcher,
                release,
                events,
                pool,
            }
        }

        fn coordinator(&self, settings: Settings) -> RequestCoordinator {
            let seeder = AssetSeeder::new(
                self.assets.path().to_path_buf(),
                self.storage.path().to_path_buf(),
                vec!["jar".to_string()],
                "jar",
            );
            RequestCoordinator::new(
                self.registry.clone(),
                self.pool.clone(),
                self.events.clone(),
                Some(seeder),
                settings,
            )
        }

        fn cache(&self, id: &str, version: &str) {
            let path = self.storage.path().join(format!("{}@{}.jar", id, version));
            fs::write(&path, version).unwrap();
            self.registry.register(id, version, path);
        }

        async fn settle(&self) {
            self.release.add_permits(16);
            self.pool.wait_idle().await;
        }
    }

    #[tokio::test]
    async fn cache_hit_update_dispatches_nothing() {
        let h = Harness::new();
        h.cache("maps", "1.0");

        let outcome = h
            .coordinator(Settings::default())
            .handle_request("maps", InstallType::Update);
        h.settle().await;

        assert_eq!(outcome, RequestOutcome::CacheHit { refreshing: false });
        assert!(h.dispatcher.calls().is_empty());
        assert!(matches!(
            h.events.completions().as_slice(),
            [UpdateEvent::Completion { from_cache: true, success: true, .. }]
        ));
    }

    #[tokio::test]
    async fn launch_hit_refreshes_in_background() {
        let h = Harness::new();
        h.cache("maps", "1.0");

        let outcome = h
            .coordinator(Settings::default())
            .handle_request("maps", InstallType::Launch);
        assert_eq!(outcome, RequestOutcome::CacheHit { refreshing: true });
        assert_eq!(outcome.expected_completions(), 2);
        // Cache-hit completion is immediate
        assert_eq!(h.events.completions().len(), 1);

        h.settle().await;
        assert_eq!(h.dispatcher.calls(), vec!["maps"]);
        let completions = h.events.completions();
        assert_eq!(completions.len(), 2);
        assert!(matches!(
            &completions[1],
            UpdateEvent::Completion { from_cache: false, success: true, .. }
        ));
        assert_eq!(h.registry.lookup("maps").unwrap().version, "2.0");
    }

    #[tokio::test]
    async fn launch_hit_without_refresh_policy() {
        let h = Harness::new();
        h.cache("maps", "1.0");
        let settings = Settings {
            refresh_on_launch: false,
            ..Settings::default()
        };

        let outcome = h.coordinator(settings).handle_request("maps", InstallType::Launch);
        h.settle().await;

        assert_eq!(outcome, RequestOutcome::CacheHit { refreshing: false });
        assert!(h.dispatcher.calls().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_misses_dispatch_once_and_fan_out() {
        let h = Harness::new();
        let coordinator = Arc::new(h.coordinator(Settings::default()));

        let handles: Vec<_> = [InstallType::Install, InstallType::Launch]
            .into_iter()
            .map(|install_type| {
                let coordinator = coordinator.clone();
                tokio::spawn(async move { coordinator.handle_request("maps", install_type) })
            })
            .collect();
        let mut outcomes = Vec::new();
        for handle in handles {
            outcomes.push(handle.await.unwrap());
        }

        assert!(outcomes.contains(&RequestOutcome::Dispatched));
        assert!(outcomes.contains(&RequestOutcome::Joined));

        h.settle().await;
        assert_eq!(h.dispatcher.calls(), vec!["maps"]);

        let completions = h.events.completions();
        assert_eq!(completions.len(), 2);
        assert!(completions.iter().all(|e| matches!(
            e,
            UpdateEvent::Completion { success: true, from_cache: false, .. }
        )));
    }

    #[tokio::test]
    async fn miss_seeds_from_asset() {
        let h = Harness::new();
        fs::write(h.assets.path().join("maps@0.9.jar"), b"seed").unwrap();

        let outcome = h
            .coordinator(Settings::default())
            .handle_request("maps", InstallType::Install);
        h.settle().await;

        assert_eq!(outcome, RequestOutcome::CacheHit { refreshing: false });
        assert!(h.dispatcher.calls().is_empty());
        let cached = h.registry.lookup("maps").unwrap();
        assert_eq!(cached.version, "0.9");
        assert!(cached.location.starts_with(h.storage.path()));
    }

    #[tokio::test]
    async fn seeding_disabled_fetches() {
        let h = Harness::new();
        fs::write(h.assets.path().join("maps@0.9.jar"), b"seed").unwrap();
        let settings = Settings {
            copy_asset_on_miss: false,
            ..Settings::default()
        };

        let outcome = h.coordinator(settings).handle_request("maps", InstallType::Install);
        h.settle().await;

        assert_eq!(outcome, RequestOutcome::Dispatched);
        assert_eq!(h.registry.lookup("maps").unwrap().version, "2.0");
    }

    #[tokio::test]
    async fn failed_fetch_allows_retry() {
        let h = Harness::new();
        h.dispatcher.fail("maps");
        let coordinator = h.coordinator(Settings::default());

        assert_eq!(
            coordinator.handle_request("maps", InstallType::Install),
            RequestOutcome::Dispatched
        );
        h.settle().await;
        assert_eq!(h.registry.slot("maps"), Slot::Absent);

        assert_eq!(
            coordinator.handle_request("maps", InstallType::Install),
            RequestOutcome::Dispatched
        );
        h.settle().await;
        assert_eq!(h.dispatcher.calls().len(), 2);
    }

    #[tokio::test]
    async fn unstorable_ids_are_rejected_without_touching_registry() {
        let h = Harness::new();
        fs::write(h.assets.path().join("a@b@1.0.jar"), b"seed").unwrap();
        let coordinator = h.coordinator(Settings::default());

        for id in ["../escaped", "a@b", ""] {
            assert_eq!(
                coordinator.handle_request(id, InstallType::Install),
                RequestOutcome::Rejected,
                "{}",
                id
            );
            assert_eq!(h.registry.slot(id), Slot::Absent);
        }
        h.settle().await;

        assert!(h.dispatcher.calls().is_empty());
        assert!(h.registry.queue().is_empty());
        let completions = h.events.completions();
        assert_eq!(completions.len(), 3);
        assert!(completions.iter().all(|e| matches!(
            e,
            UpdateEvent::Completion { success: false, error: Some(error), .. }
                if error.contains("Invalid bundle id")
        )));
        assert!(!h.storage.path().parent().unwrap().join("escaped@2.0.jar").exists());
    }

    #[tokio::test]
    async fn stopped_pool_rejects_and_releases_slot() {
        let h = Harness::new();
        h.pool.shutdown().await;

        let outcome = h
            .coordinator(Settings::default())
            .handle_request("maps", InstallType::Install);

        assert_eq!(outcome, RequestOutcome::Rejected);
        assert_eq!(h.registry.slot("maps"), Slot::Absent);
        assert!(matches!(
            h.events.completions().as_slice(),
            [UpdateEvent::Completion { success: false, .. }]
        ));
    }
}
