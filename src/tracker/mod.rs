// Analysis job tracker
//
// Owns the lifecycle of one long-running analysis job: Idle -> Starting ->
// Polling -> Complete/Failed. A generation counter fences every transition so
// a superseded or reset run can never write into the state of its successor,
// and an atomic flag guarantees at most one poll task (and therefore at most
// one in-flight status request) per tracker.

use crate::api::{AnalyzerApi, ApiError, StartAnalysisRequest};
use crate::models::{AnalysisReport, JobStatus};
use crate::storage::{KeyValueStore, ANALYSIS_ID_KEY, ANALYSIS_RESULT_KEY};
use chrono::Utc;
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub const EXPIRED_MESSAGE: &str = "Analysis session expired or not found.";
pub const FAILED_FALLBACK_MESSAGE: &str = "Analysis failed on server.";

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerPhase {
    Idle,
    Starting,
    Polling,
    Complete,
    Failed,
}

/// Everything an observer needs to render the current run. Cloned into the
/// watch channel on every transition.
#[derive(Debug, Clone)]
pub struct AnalysisView {
    pub phase: TrackerPhase,
    pub stage: String,
    pub percent: u8,
    pub result: Option<Arc<AnalysisReport>>,
    pub error: Option<String>,
    pub analysis_id: Option<String>,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
}

impl AnalysisView {
    fn idle() -> Self {
        Self {
            phase: TrackerPhase::Idle,
            stage: String::new(),
            percent: 0,
            result: None,
            error: None,
            analysis_id: None,
            started_at: None,
            completed_at: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub poll_interval: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

struct Shared {
    view: Mutex<AnalysisView>,
    /// Bumped on reset/supersede. Transitions carry the generation they were
    /// started under and are dropped if it no longer matches.
    generation: AtomicU64,
    /// True while a poll task exists. Enforces one poller per tracker.
    polling: AtomicBool,
    task: Mutex<Option<JoinHandle<()>>>,
    updates: watch::Sender<AnalysisView>,
}

impl Shared {
    /// Applies `f` to the view iff `generation` is still current, then
    /// broadcasts the new view. Returns whether the transition landed.
    fn apply<F: FnOnce(&mut AnalysisView)>(&self, generation: u64, f: F) -> bool {
        let mut view = self.view.lock();
        if self.generation.load(Ordering::SeqCst) != generation {
            return false;
        }
        f(&mut view);
        self.updates.send_replace(view.clone());
        true
    }
}

pub struct AnalysisTracker {
    api: Arc<dyn AnalyzerApi>,
    store: Arc<dyn KeyValueStore>,
    config: TrackerConfig,
    shared: Arc<Shared>,
}

impl AnalysisTracker {
    /// Builds the tracker and reconciles persisted state: a cached terminal
    /// result is restored without touching the network, a bare persisted job
    /// id resumes polling, anything else starts Idle.
    pub fn new(
        api: Arc<dyn AnalyzerApi>,
        store: Arc<dyn KeyValueStore>,
        config: TrackerConfig,
    ) -> Self {
        let mut initial = AnalysisView::idle();
        let mut resume_id = None;

        if let Some(raw) = store.get(ANALYSIS_RESULT_KEY) {
            match serde_json::from_str::<AnalysisReport>(&raw) {
                Ok(report) => {
                    info!("Restored cached analysis result");
                    initial.phase = TrackerPhase::Complete;
                    initial.stage = "complete".to_string();
                    initial.percent = 100;
                    initial.result = Some(Arc::new(report));
                    initial.analysis_id = store.get(ANALYSIS_ID_KEY);
                }
                Err(e) => {
                    warn!("Dropping unreadable cached analysis result: {}", e);
                    store.remove(ANALYSIS_RESULT_KEY);
                }
            }
        }

        if initial.result.is_none() {
            if let Some(id) = store.get(ANALYSIS_ID_KEY) {
                info!("Resuming analysis {} from persisted id", id);
                initial.phase = TrackerPhase::Polling;
                initial.analysis_id = Some(id.clone());
                resume_id = Some(id);
            }
        }

        let (updates, _) = watch::channel(initial.clone());
        let tracker = Self {
            api,
            store,
            config,
            shared: Arc::new(Shared {
                view: Mutex::new(initial),
                generation: AtomicU64::new(0),
                polling: AtomicBool::new(false),
                task: Mutex::new(None),
                updates,
            }),
        };

        if let Some(id) = resume_id {
            tracker.spawn_poll_task(0, id);
        }

        tracker
    }

    /// Starts a fresh analysis. Any run already in flight is superseded
    /// first; its late responses are discarded by the generation fence.
    /// The start request itself is never retried.
    pub async fn start(&self, request: StartAnalysisRequest) -> Result<String, ApiError> {
        self.reset();
        let generation = self.shared.generation.load(Ordering::SeqCst);

        self.shared.apply(generation, |view| {
            view.phase = TrackerPhase::Starting;
            view.stage = "starting".to_string();
            view.started_at = Some(Utc::now().to_rfc3339());
        });

        match self.api.start_analysis(request).await {
            Ok(response) => {
                let id = response.analysis_id;
                let store = Arc::clone(&self.store);
                let installed = self.shared.apply(generation, |view| {
                    store.set(ANALYSIS_ID_KEY, &id);
                    view.phase = TrackerPhase::Polling;
                    view.analysis_id = Some(id.clone());
                });

                if installed {
                    info!("Analysis {} started, polling", id);
                    self.spawn_poll_task(generation, id.clone());
                } else {
                    debug!("Analysis {} was superseded before polling began", id);
                }
                Ok(id)
            }
            Err(err) => {
                let message = err.to_string();
                self.shared.apply(generation, |view| {
                    view.phase = TrackerPhase::Failed;
                    view.error = Some(message.clone());
                });
                Err(err)
            }
        }
    }

    /// Cancels any in-flight run and clears all persisted analysis state.
    pub fn reset(&self) {
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(handle) = self.shared.task.lock().take() {
            handle.abort();
        }
        self.shared.polling.store(false, Ordering::SeqCst);

        self.store.remove(ANALYSIS_ID_KEY);
        self.store.remove(ANALYSIS_RESULT_KEY);

        let mut view = self.shared.view.lock();
        *view = AnalysisView::idle();
        self.shared.updates.send_replace(view.clone());
    }

    /// Stops polling without clearing persisted state, so the next tracker
    /// instance resumes where this one left off.
    pub fn shutdown(&self) {
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(handle) = self.shared.task.lock().take() {
            handle.abort();
        }
        self.shared.polling.store(false, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> AnalysisView {
        self.shared.view.lock().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AnalysisView> {
        self.shared.updates.subscribe()
    }

    fn spawn_poll_task(&self, generation: u64, analysis_id: String) {
        if self.shared.polling.swap(true, Ordering::SeqCst) {
            debug!("Poll task already active, not spawning another");
            return;
        }

        let api = Arc::clone(&self.api);
        let store = Arc::clone(&self.store);
        let shared = Arc::clone(&self.shared);
        let interval = self.config.poll_interval;

        let handle = tokio::spawn(async move {
            poll_until_terminal(api, store, Arc::clone(&shared), generation, analysis_id, interval)
                .await;
            shared.polling.store(false, Ordering::SeqCst);
        });

        *self.shared.task.lock() = Some(handle);
    }
}

impl Drop for AnalysisTracker {
    fn drop(&mut self) {
        if let Some(handle) = self.shared.task.lock().take() {
            handle.abort();
        }
    }
}

/// One status request per tick, strictly sequential, until the job reaches a
/// terminal state or the generation moves on.
async fn poll_until_terminal(
    api: Arc<dyn AnalyzerApi>,
    store: Arc<dyn KeyValueStore>,
    shared: Arc<Shared>,
    generation: u64,
    analysis_id: String,
    interval: Duration,
) {
    loop {
        if shared.generation.load(Ordering::SeqCst) != generation {
            debug!("Poll task for {} superseded, exiting", analysis_id);
            return;
        }

        match api.analysis_status(&analysis_id).await {
            Ok(status) => match status.status {
                JobStatus::Running => {
                    shared.apply(generation, |view| {
                        if let Some(progress) = &status.progress {
                            view.stage = progress.phase.clone();
                            view.percent = progress.percent.min(100);
                        }
                    });
                }
                JobStatus::Complete => match api.analysis_report(&analysis_id).await {
                    Ok(report) => {
                        let serialized = serde_json::to_string(&report).unwrap_or_default();
                        let report = Arc::new(report);
                        let landed = shared.apply(generation, |view| {
                            store.set(ANALYSIS_RESULT_KEY, &serialized);
                            store.remove(ANALYSIS_ID_KEY);
                            view.phase = TrackerPhase::Complete;
                            view.stage = "complete".to_string();
                            view.percent = 100;
                            view.result = Some(report);
                            view.error = None;
                            view.completed_at = Some(Utc::now().to_rfc3339());
                        });
                        if landed {
                            info!("Analysis {} complete, result cached", analysis_id);
                        }
                        return;
                    }
                    Err(err) if err.is_expired() => {
                        expire(&store, &shared, generation, &analysis_id);
                        return;
                    }
                    Err(err) => {
                        // Status says complete, so the report will show up;
                        // keep polling and fetch it next tick.
                        warn!("Report fetch for {} failed: {}", analysis_id, err);
                    }
                },
                JobStatus::Error => {
                    let message = match api.analysis_report(&analysis_id).await {
                        Ok(report) => report
                            .errors
                            .filter(|errors| !errors.is_empty())
                            .map(|errors| errors.join("; "))
                            .unwrap_or_else(|| FAILED_FALLBACK_MESSAGE.to_string()),
                        Err(_) => FAILED_FALLBACK_MESSAGE.to_string(),
                    };
                    warn!("Analysis {} failed on server: {}", analysis_id, message);
                    shared.apply(generation, |view| {
                        store.remove(ANALYSIS_ID_KEY);
                        view.phase = TrackerPhase::Failed;
                        view.error = Some(message.clone());
                        view.completed_at = Some(Utc::now().to_rfc3339());
                    });
                    return;
                }
            },
            Err(err) if err.is_expired() => {
                expire(&store, &shared, generation, &analysis_id);
                return;
            }
            Err(err) => {
                // Transient outage. The persisted id still references a live
                // job, so keep the run alive and try again next tick.
                warn!("Status poll for {} failed: {}", analysis_id, err);
            }
        }

        tokio::time::sleep(interval).await;
    }
}

/// The server no longer knows the job. Drop the stale id and return to Idle
/// with a message; this is expiry, not failure.
fn expire(
    store: &Arc<dyn KeyValueStore>,
    shared: &Arc<Shared>,
    generation: u64,
    analysis_id: &str,
) {
    info!("Analysis {} expired server-side", analysis_id);
    shared.apply(generation, |view| {
        store.remove(ANALYSIS_ID_KEY);
        *view = AnalysisView::idle();
        view.error = Some(EXPIRED_MESSAGE.to_string());
    });
}
