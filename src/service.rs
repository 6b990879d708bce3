//! Update service wiring
//!
//! [`UpdateService`] owns the registry, the fetch pool, the scheduler and the
//! request coordinator, and exposes the event stream.

use crate::bundle::{BundleRegistry, InstallType};
use crate::config::{Config, ConfigManager, Settings};
use crate::coordinator::{RequestCoordinator, RequestOutcome};
use crate::error::{BundleError, BundleResult};
use crate::events::{ChannelSink, UpdateEvent};
use crate::fetch::{FetchDispatcher, FetchPool, HttpFetcher};
use crate::network::{ConnectivityProbe, NetworkPolicyGate, SystemConnectivity};
use crate::scheduler::{initial_interval, UpdateScheduler};
use crate::seed::AssetSeeder;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Background bundle update service
pub struct UpdateService {
    storage_dir: PathBuf,
    registry: Arc<BundleRegistry>,
    events: Arc<ChannelSink>,
    pool: Arc<FetchPool>,
    gate: Arc<NetworkPolicyGate>,
    scheduler: Arc<UpdateScheduler>,
    coordinator: RequestCoordinator,
}

impl UpdateService {
    /// Build a service over explicit fetch and connectivity collaborators
    pub fn new(
        config: &Config,
        dispatcher: Arc<dyn FetchDispatcher>,
        probe: Arc<dyn ConnectivityProbe>,
    ) -> Self {
        let settings = Settings::from_config(config);
        let storage_dir = ConfigManager::storage_dir(config);

        let registry = Arc::new(BundleRegistry::new(
            storage_dir.clone(),
            config.storage.extensions.clone(),
        ));
        let events = Arc::new(ChannelSink::default());
        let pool = Arc::new(FetchPool::new(
            registry.clone(),
            dispatcher,
            events.clone(),
            config.update.max_concurrent_fetches,
        ));
        let gate = Arc::new(NetworkPolicyGate::new(
            probe,
            config.network.preferred,
            settings.poll_only_on_preferred_connectivity,
        ));
        let scheduler = Arc::new(UpdateScheduler::new(
            registry.clone(),
            pool.clone(),
            gate.clone(),
            initial_interval(
                settings.debug_mode,
                Duration::from_secs(config.update.poll_interval_secs),
            ),
        ));

        let seeder = config.storage.asset_dir.as_ref().map(|asset_dir| {
            AssetSeeder::new(
                asset_dir.clone(),
                storage_dir.clone(),
                config.storage.extensions.clone(),
                config.storage.primary_extension(),
            )
        });
        let coordinator = RequestCoordinator::new(
            registry.clone(),
            pool.clone(),
            events.clone(),
            seeder,
            settings,
        );

        Self {
            storage_dir,
            registry,
            events,
            pool,
            gate,
            scheduler,
            coordinator,
        }
    }

    /// Build a service fetching over HTTP and probing the live system
    pub fn from_config(config: &Config) -> Self {
        let storage_dir = ConfigManager::storage_dir(config);
        let fetcher = HttpFetcher::new(
            &config.fetch,
            storage_dir,
            config.storage.primary_extension(),
        );
        Self::new(config, Arc::new(fetcher), Arc::new(SystemConnectivity::new()))
    }

    /// Scan the storage directory into the registry
    pub fn load(&self) -> BundleResult<usize> {
        self.registry.load()
    }

    /// Create the storage directory and load cached bundles.
    ///
    /// Enough for one-off requests; [`UpdateService::start`] also polls.
    pub async fn prepare(&self) -> BundleResult<usize> {
        if self.pool.is_shut_down() {
            return Err(BundleError::ServiceStopped);
        }

        tokio::fs::create_dir_all(&self.storage_dir)
            .await
            .map_err(|e| BundleError::io(format!("creating {}", self.storage_dir.display()), e))?;
        self.load()
    }

    /// Prepare storage, load cached bundles and start the scheduler
    pub async fn start(&self) -> BundleResult<()> {
        let loaded = self.prepare().await?;
        self.scheduler.start();

        info!(
            "Update service started with {} bundle(s) in {}",
            loaded,
            self.storage_dir.display()
        );
        Ok(())
    }

    /// Request a bundle; see [`RequestCoordinator::handle_request`]
    pub fn request(&self, bundle_id: &str, install_type: InstallType) -> RequestOutcome {
        debug!("Request for {} ({})", bundle_id, install_type);
        self.coordinator.handle_request(bundle_id, install_type)
    }

    /// Subscribe to events emitted from now on
    pub fn subscribe(&self) -> broadcast::Receiver<UpdateEvent> {
        self.events.subscribe()
    }

    /// Change the poll interval; returns the interval applied
    pub fn set_poll_interval(&self, requested: Duration) -> Duration {
        self.scheduler.set_poll_interval(requested)
    }

    pub fn poll_interval(&self) -> Duration {
        self.scheduler.poll_interval()
    }

    pub fn registry(&self) -> &BundleRegistry {
        &self.registry
    }

    pub fn gate(&self) -> &NetworkPolicyGate {
        &self.gate
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    /// Number of fetches still running
    pub fn in_flight(&self) -> usize {
        self.pool.in_flight()
    }

    /// Wait for every fetch dispatched so far
    pub async fn wait_idle(&self) {
        self.pool.wait_idle().await;
    }

    /// Stop the scheduler, then cancel and drain in-flight fetches
    pub async fn shutdown(&self) {
        self.scheduler.stop().await;
        self.pool.shutdown().await;
        info!("Update service stopped");
    }
}
