//! Job worker driving the analysis pipeline on a fixed poll interval.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use bugscope_core::Result;

use crate::pipeline::{AnalysisPipeline, CycleOutcome};
use crate::{DEFAULT_ANALYSIS_TIMEOUT_SECS, DEFAULT_POLL_INTERVAL_MS};

/// Configuration for the job worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Polling interval in milliseconds.
    pub poll_interval_ms: u64,
    /// Whether to enable job processing.
    pub enabled: bool,
    /// Deadline for a single provider call, in seconds.
    pub analysis_timeout_secs: u64,
    /// Requeue `processing` jobs older than this. `None` disables the sweep.
    pub stale_after_secs: Option<u64>,
    /// Repository root scanned for code context.
    pub context_root: Option<PathBuf>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            enabled: true,
            analysis_timeout_secs: DEFAULT_ANALYSIS_TIMEOUT_SECS,
            stale_after_secs: None,
            context_root: None,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `WORKER_ENABLED` | `true` | Enable/disable job processing |
    /// | `JOB_POLL_INTERVAL_MS` | `5000` | Delay between cycles |
    /// | `ANALYSIS_TIMEOUT_SECS` | `30` | Provider call deadline |
    /// | `JOB_STALE_AFTER_SECS` | unset | Requeue abandoned `processing` jobs |
    /// | `CODE_CONTEXT_ROOT` | unset | Repository scanned for context |
    pub fn from_env() -> Self {
        let enabled = std::env::var("WORKER_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let poll_interval_ms = std::env::var("JOB_POLL_INTERVAL_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_POLL_INTERVAL_MS);

        let analysis_timeout_secs = std::env::var("ANALYSIS_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_ANALYSIS_TIMEOUT_SECS)
            .max(1);

        let stale_after_secs = std::env::var("JOB_STALE_AFTER_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0);

        let context_root = std::env::var("CODE_CONTEXT_ROOT")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        Self {
            poll_interval_ms,
            enabled,
            analysis_timeout_secs,
            stale_after_secs,
            context_root,
        }
        .with_safe_stale_after()
    }

    /// Create a new config with custom poll interval.
    pub fn with_poll_interval(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// Enable or disable job processing.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_analysis_timeout(mut self, secs: u64) -> Self {
        self.analysis_timeout_secs = secs;
        self
    }

    /// Turn on the stale-job sweep.
    ///
    /// Raised to [`WorkerConfig::min_stale_after_secs`] when shorter.
    pub fn with_stale_after(mut self, secs: u64) -> Self {
        self.stale_after_secs = Some(secs);
        self.with_safe_stale_after()
    }

    pub fn with_context_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.context_root = Some(root.into());
        self
    }

    pub fn analysis_timeout(&self) -> Duration {
        Duration::from_secs(self.analysis_timeout_secs)
    }

    /// Shortest stale threshold allowed: twice the analysis timeout.
    ///
    /// A job younger than this may still be inside its provider call.
    pub fn min_stale_after_secs(&self) -> u64 {
        self.analysis_timeout_secs.saturating_mul(2).max(1)
    }

    fn with_safe_stale_after(mut self) -> Self {
        let min = self.min_stale_after_secs();
        if let Some(secs) = self.stale_after_secs.filter(|secs| *secs < min) {
            warn!(
                subsystem = "jobs",
                component = "worker",
                requested_secs = secs,
                stale_after_secs = min,
                analysis_timeout_secs = self.analysis_timeout_secs,
                "Stale threshold shorter than twice the analysis timeout, raising it"
            );
            self.stale_after_secs = Some(min);
        }
        self
    }
}

/// Event emitted by the job worker.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    /// A bug was analyzed and its job marked done.
    JobCompleted { job_id: Uuid, bug_id: Uuid },
    /// The bug was already analyzed; its job was closed without a provider call.
    JobSkipped { job_id: Uuid, bug_id: Uuid },
    /// A job failed.
    JobFailed {
        job_id: Uuid,
        bug_id: Option<Uuid>,
        error: String,
    },
    /// Stale `processing` jobs were put back in the queue.
    JobsRequeued { count: u64 },
    /// Worker started.
    WorkerStarted,
    /// Worker stopped.
    WorkerStopped,
}

impl WorkerEvent {
    fn from_outcome(outcome: CycleOutcome) -> Option<Self> {
        match outcome {
            CycleOutcome::Idle => None,
            CycleOutcome::Completed { job_id, bug_id, .. } => {
                Some(Self::JobCompleted { job_id, bug_id })
            }
            CycleOutcome::Skipped { job_id, bug_id } => Some(Self::JobSkipped { job_id, bug_id }),
            CycleOutcome::Failed {
                job_id,
                bug_id,
                error,
            } => Some(Self::JobFailed {
                job_id,
                bug_id,
                error,
            }),
        }
    }
}

/// Handle for controlling a running worker.
pub struct WorkerHandle {
    shutdown_tx: mpsc::Sender<()>,
    event_rx: broadcast::Receiver<WorkerEvent>,
    task: JoinHandle<()>,
}

impl WorkerHandle {
    /// Signal the worker to shut down gracefully.
    ///
    /// A cycle already in progress runs to completion first.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_tx.send(()).await.map_err(|_| {
            bugscope_core::Error::Internal("Failed to send shutdown signal".into())
        })?;
        Ok(())
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_rx.resubscribe()
    }

    /// Wait for the worker loop to exit.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            error!(
                subsystem = "jobs",
                component = "worker",
                error = ?e,
                "Worker task panicked"
            );
        }
    }
}

/// Job worker that runs the analysis pipeline, one job per cycle.
pub struct JobWorker {
    pipeline: AnalysisPipeline,
    config: WorkerConfig,
    event_tx: broadcast::Sender<WorkerEvent>,
}

impl JobWorker {
    /// Create a new job worker.
    ///
    /// The config's analysis timeout replaces the pipeline's, so the stale
    /// threshold is always checked against the deadline actually applied.
    pub fn new(pipeline: AnalysisPipeline, config: WorkerConfig) -> Self {
        let (event_tx, _) = broadcast::channel(bugscope_core::defaults::EVENT_BUS_CAPACITY);
        let config = config.with_safe_stale_after();
        Self {
            pipeline: pipeline.with_timeout(config.analysis_timeout()),
            config,
            event_tx,
        }
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_tx.subscribe()
    }

    /// Start the worker and return a handle for control.
    pub fn start(self) -> WorkerHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let event_rx = self.event_tx.subscribe();

        let worker = Arc::new(self);
        let task = tokio::spawn(async move {
            worker.run(&mut shutdown_rx).await;
        });

        WorkerHandle {
            shutdown_tx,
            event_rx,
            task,
        }
    }

    /// Run the poll loop.
    ///
    /// Each iteration runs one pipeline cycle to completion, then sleeps for
    /// the poll interval. A shutdown signal is honored between cycles.
    #[instrument(skip(self, shutdown_rx))]
    async fn run(&self, shutdown_rx: &mut mpsc::Receiver<()>) {
        if !self.config.enabled {
            info!(
                subsystem = "jobs",
                component = "worker",
                "Job worker is disabled, not starting"
            );
            return;
        }

        let pending_jobs = self.pipeline.queue().pending_count().await.ok();
        info!(
            subsystem = "jobs",
            component = "worker",
            poll_interval_ms = self.config.poll_interval_ms,
            pending_jobs = ?pending_jobs,
            provider = self.pipeline.provider_name(),
            stale_after_secs = ?self.config.stale_after_secs,
            "Job worker started"
        );

        let _ = self.event_tx.send(WorkerEvent::WorkerStarted);

        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);
        let stale_after = self.config.stale_after_secs.map(Duration::from_secs);

        loop {
            if shutdown_rx.try_recv().is_ok() {
                info!(
                    subsystem = "jobs",
                    component = "worker",
                    "Job worker received shutdown signal"
                );
                break;
            }

            if let Some(age) = stale_after {
                let count = self.pipeline.queue().requeue_stale(age).await;
                if count > 0 {
                    let _ = self.event_tx.send(WorkerEvent::JobsRequeued { count });
                }
            }

            let outcome = self.pipeline.run_cycle().await;
            if let Some(event) = WorkerEvent::from_outcome(outcome) {
                let _ = self.event_tx.send(event);
            }

            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!(
                        subsystem = "jobs",
                        component = "worker",
                        "Job worker received shutdown signal"
                    );
                    break;
                }
                _ = sleep(poll_interval) => {}
            }
        }

        let _ = self.event_tx.send(WorkerEvent::WorkerStopped);
        info!(subsystem = "jobs", component = "worker", "Job worker stopped");
    }
}
