//! Test doubles for the fetch and event seams

use crate::bundle::file_name;
use crate::error::{BundleError, BundleResult};
use crate::events::{EventSink, UpdateEvent};
use crate::fetch::{FetchDispatcher, FetchRequest, FetchedArtifact, ProgressReporter};
use async_trait::async_trait;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

/// Event sink recording everything it receives
#[derive(Default)]
pub(crate) struct RecordingSink {
    events: Mutex<Vec<UpdateEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<UpdateEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn completions(&self) -> Vec<UpdateEvent> {
        self.events()
            .into_iter()
            .filter(UpdateEvent::is_completion)
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: UpdateEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Dispatcher that writes a fixed version into a directory
pub(crate) struct ScriptedDispatcher {
    dir: PathBuf,
    version: String,
    failing: Mutex<HashSet<String>>,
    calls: Mutex<Vec<String>>,
    gate: Option<Arc<Semaphore>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl ScriptedDispatcher {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            version: "2.0".to_string(),
            failing: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
            gate: None,
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }

    /// Dispatcher whose fetches block until a permit is added to the
    /// returned semaphore
    pub fn gated(dir: &Path) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let mut dispatcher = Self::new(dir);
        dispatcher.gate = Some(gate.clone());
        (dispatcher, gate)
    }

    pub fn fail(&self, bundle_id: &str) {
        self.failing.lock().unwrap().insert(bundle_id.to_string());
    }

    /// Bundle ids fetched, in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FetchDispatcher for ScriptedDispatcher {
    async fn fetch(
        &self,
        request: &FetchRequest,
        progress: &dyn ProgressReporter,
    ) -> BundleResult<FetchedArtifact> {
        self.calls.lock().unwrap().push(request.bundle_id.clone());
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        // Give other fetches a chance to overlap
        tokio::task::yield_now().await;

        progress.report(50.0, 100);
        progress.report(100.0, 100);
        self.active.fetch_sub(1, Ordering::SeqCst);

        if self.failing.lock().unwrap().contains(&request.bundle_id) {
            return Err(BundleError::fetch(&request.bundle_id, "scripted failure"));
        }

        let version = self.version.clone();
        let location = self.dir.join(file_name(&request.bundle_id, &version, "jar"));
        fs::write(&location, version.as_bytes()).unwrap();
        Ok(FetchedArtifact { version, location })
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}
