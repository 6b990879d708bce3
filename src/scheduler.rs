//! Periodic round-robin update scheduler
//!
//! Each tick asks the network gate for permission, rotates the registry queue
//! and dispatches one fetch for the bundle that came off the front.

use crate::bundle::{BundleRegistry, InstallType};
use crate::fetch::{Dispatch, FetchOrigin, FetchPool};
use crate::network::NetworkPolicyGate;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Default time between ticks
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Shortest interval a caller may configure
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Interval used in debug mode; not subject to the floor
pub const DEBUG_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Clamp a requested interval to the floor
pub fn effective_interval(requested: Duration) -> Duration {
    requested.max(MIN_POLL_INTERVAL)
}

/// Interval the scheduler starts with
pub fn initial_interval(debug_mode: bool, requested: Duration) -> Duration {
    if debug_mode {
        DEBUG_POLL_INTERVAL
    } else {
        effective_interval(requested)
    }
}

/// What a single tick did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// The network gate denied background polling
    Skipped,
    /// Nothing is queued
    Empty,
    /// A fetch was dispatched for this bundle
    Dispatched(String),
    /// The bundle was rotated but could not be fetched now
    Busy(String),
}

struct Running {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Periodic driver for background updates
pub struct UpdateScheduler {
    registry: Arc<BundleRegistry>,
    pool: Arc<FetchPool>,
    gate: Arc<NetworkPolicyGate>,
    period_ms: AtomicU64,
    running: Mutex<Option<Running>>,
}

impl UpdateScheduler {
    pub fn new(
        registry: Arc<BundleRegistry>,
        pool: Arc<FetchPool>,
        gate: Arc<NetworkPolicyGate>,
        interval: Duration,
    ) -> Self {
        Self {
            registry,
            pool,
            gate,
            period_ms: AtomicU64::new(duration_ms(interval)),
            running: Mutex::new(None),
        }
    }

    /// Current interval between ticks
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.period_ms.load(Ordering::SeqCst))
    }

    /// Change the interval, clamped to [`MIN_POLL_INTERVAL`].
    ///
    /// Takes effect once the currently scheduled tick has fired. Returns the
    /// interval actually applied.
    pub fn set_poll_interval(&self, requested: Duration) -> Duration {
        let effective = effective_interval(requested);
        self.period_ms.store(duration_ms(effective), Ordering::SeqCst);
        info!("Poll interval set to {}s", effective.as_secs());
        effective
    }

    /// Whether the tick loop is running
    pub fn is_running(&self) -> bool {
        self.lock().is_some()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Running>> {
        self.running.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Start ticking. The first tick fires immediately.
    pub fn start(self: &Arc<Self>) {
        let mut running = self.lock();
        if running.is_some() {
            debug!("Scheduler already running");
            return;
        }

        let cancel = CancellationToken::new();
        let scheduler = Arc::clone(self);
        let token = cancel.clone();
        let handle = tokio::spawn(async move { scheduler.run(token).await });

        info!("Scheduler started, polling every {}s", self.poll_interval().as_secs());
        *running = Some(Running { cancel, handle });
    }

    /// Stop ticking.
    ///
    /// No tick fires after this returns. Fetches already dispatched keep
    /// running.
    pub async fn stop(&self) {
        let Some(running) = self.lock().take() else {
            return;
        };

        running.cancel.cancel();
        if let Err(e) = running.handle.await {
            warn!("Scheduler task ended abnormally: {}", e);
        }
        info!("Scheduler stopped");
    }

    async fn run(&self, cancel: CancellationToken) {
        loop {
            self.run_tick();

            let period = self.poll_interval();
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,

                _ = tokio::time::sleep(period) => {}
            }
        }
    }

    fn run_tick(&self) {
        match panic::catch_unwind(AssertUnwindSafe(|| self.tick())) {
            Ok(outcome) => debug!(?outcome, "Tick finished"),
            Err(_) => error!("Scheduler tick panicked, continuing on schedule"),
        }
    }

    /// Run one tick now
    pub fn tick(&self) -> TickOutcome {
        if !self.gate.allows_background_poll() {
            debug!(
                "Skipping tick, connection is {}",
                self.gate.connection_class()
            );
            return TickOutcome::Skipped;
        }

        let Some(bundle_id) = self.registry.rotate() else {
            return TickOutcome::Empty;
        };

        match self
            .pool
            .dispatch(&bundle_id, InstallType::Update, FetchOrigin::Scheduled)
        {
            Dispatch::Started => TickOutcome::Dispatched(bundle_id),
            Dispatch::InFlight => TickOutcome::Busy(bundle_id),
            Dispatch::Stopped => {
                warn!("Tick could not dispatch {}, fetch pool stopped", bundle_id);
                TickOutcome::Busy(bundle_id)
            }
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
