//! The bug analysis pipeline.
//!
//! One call to [`AnalysisPipeline::run_cycle`] processes at most one job:
//!
//! 1. claim the oldest queued `ANALYZE_BUG` job
//! 2. read the bug id from the payload
//! 3. load the bug with its project
//! 4. skip the provider when the bug is already analyzed
//! 5. gather code context (best effort)
//! 6. call the provider under a deadline
//! 7. write the analysis onto the bug, then mark the job done
//!
//! Any failure after the claim ends with the job in `error`. Once the bug is
//! known, it is moved to `error` as well. Store failures are logged and never
//! escape the cycle.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use bugscope_core::{
    is_already_analyzed, AnalysisProvider, AnalysisRecord, AnalyzeBugPayload, Bug,
    BugRepository, BugStatus, Job, JobRepository, JobType, Transition,
};
use bugscope_db::Database;

use crate::context::ContextDiscovery;
use crate::queue::JobQueue;
use crate::DEFAULT_ANALYSIS_TIMEOUT_SECS;

/// What a single pipeline cycle did.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// No queued job.
    Idle,
    /// The bug was analyzed and the job marked done.
    Completed {
        job_id: Uuid,
        bug_id: Uuid,
        provider: String,
    },
    /// The bug already carried an analysis. The provider was not called, or
    /// its result was discarded.
    Skipped { job_id: Uuid, bug_id: Uuid },
    /// The job ended in `error`.
    Failed {
        job_id: Uuid,
        /// The bug that was moved to `error` alongside the job, if any.
        bug_id: Option<Uuid>,
        error: String,
    },
}

impl CycleOutcome {
    pub fn job_id(&self) -> Option<Uuid> {
        match self {
            Self::Idle => None,
            Self::Completed { job_id, .. }
            | Self::Skipped { job_id, .. }
            | Self::Failed { job_id, .. } => Some(*job_id),
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

/// Orchestrates claim, analysis and persistence for bug reports.
pub struct AnalysisPipeline {
    queue: JobQueue,
    bugs: Arc<dyn BugRepository>,
    provider: Arc<dyn AnalysisProvider>,
    context: ContextDiscovery,
    timeout: Duration,
}

impl AnalysisPipeline {
    pub fn new(
        jobs: Arc<dyn JobRepository>,
        bugs: Arc<dyn BugRepository>,
        provider: Arc<dyn AnalysisProvider>,
    ) -> Self {
        Self {
            queue: JobQueue::new(jobs),
            bugs,
            provider,
            context: ContextDiscovery::disabled(),
            timeout: Duration::from_secs(DEFAULT_ANALYSIS_TIMEOUT_SECS),
        }
    }

    /// Pipeline backed by the PostgreSQL repositories.
    pub fn from_database(db: &Database, provider: Arc<dyn AnalysisProvider>) -> Self {
        Self::new(
            Arc::new(db.jobs.clone()),
            Arc::new(db.bugs.clone()),
            provider,
        )
    }

    /// Scan `root` for code context. `None` disables discovery.
    pub fn with_context_root(mut self, root: Option<PathBuf>) -> Self {
        self.context = ContextDiscovery::new(root);
        self
    }

    /// Deadline for a single provider call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn queue(&self) -> &JobQueue {
        &self.queue
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Process at most one job.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let Some(job) = self.queue.claim(JobType::AnalyzeBug).await else {
            return CycleOutcome::Idle;
        };
        self.process(job).await
    }

    async fn process(&self, job: Job) -> CycleOutcome {
        let start = Instant::now();
        let job_id = job.id;

        let payload = match AnalyzeBugPayload::from_job(&job) {
            Ok(payload) => payload,
            Err(e) => return self.fail_job(&job, None, e.to_string()).await,
        };

        let Some(bug_id) = payload.bug_uuid() else {
            let message = format!("Bug {} not found", payload.bug_id);
            return self.fail_job(&job, None, message).await;
        };

        let loaded = match self.bugs.get_with_project(bug_id).await {
            Ok(Some(loaded)) => loaded,
            Ok(None) => {
                let message = format!("Bug {} not found", bug_id);
                return self.fail_job(&job, None, message).await;
            }
            Err(e) => {
                error!(
                    subsystem = "jobs",
                    component = "pipeline",
                    %job_id,
                    %bug_id,
                    error = %e,
                    "Failed to load bug"
                );
                let message = format!("Failed to load bug {}: {}", bug_id, e);
                return self.fail_job(&job, None, message).await;
            }
        };
        let mut bug = loaded.bug;

        info!(
            subsystem = "jobs",
            component = "pipeline",
            %job_id,
            %bug_id,
            project = %loaded.project_name,
            "Processing bug"
        );

        if is_already_analyzed(&bug) {
            debug!(
                subsystem = "jobs",
                component = "pipeline",
                %job_id,
                %bug_id,
                "Bug already analyzed, skipping provider"
            );
            self.queue.complete(&job).await;
            return CycleOutcome::Skipped { job_id, bug_id };
        }

        match self.bugs.set_status(bug_id, BugStatus::Analyzing).await {
            Ok(Transition::Rejected { current }) => {
                let message = format!("Bug {} is {}, cannot analyze", bug_id, current);
                return self.fail_job(&job, None, message).await;
            }
            Ok(_) => bug.status = BugStatus::Analyzing,
            Err(e) => {
                let message = format!("Failed to mark bug {} analyzing: {}", bug_id, e);
                return self.fail_job(&job, Some(bug_id), message).await;
            }
        }

        let context = self.context.gather(&bug.url).await;

        let record = match self.analyze(&bug, &context).await {
            Ok(record) => record,
            Err(message) => {
                warn!(
                    subsystem = "jobs",
                    component = "pipeline",
                    %job_id,
                    %bug_id,
                    provider = self.provider.name(),
                    error = %message,
                    "Analysis failed"
                );
                return self.fail_job(&job, Some(bug_id), message).await;
            }
        };

        match self.bugs.record_analysis(bug_id, &record).await {
            Ok(Transition::Rejected { current }) => {
                let message = format!("Bug {} moved to {} during analysis", bug_id, current);
                return self.fail_job(&job, None, message).await;
            }
            Ok(Transition::Unchanged) => {
                warn!(
                    subsystem = "jobs",
                    component = "pipeline",
                    %job_id,
                    %bug_id,
                    provider = %record.provider,
                    "Bug analyzed by another job first, discarding result"
                );
                self.queue.complete(&job).await;
                return CycleOutcome::Skipped { job_id, bug_id };
            }
            Ok(Transition::Applied) => {}
            Err(e) => {
                error!(
                    subsystem = "jobs",
                    component = "pipeline",
                    %job_id,
                    %bug_id,
                    error = %e,
                    "Failed to persist analysis"
                );
                let message = format!("Failed to persist analysis: {}", e);
                return self.fail_job(&job, Some(bug_id), message).await;
            }
        }

        self.queue.complete(&job).await;
        info!(
            subsystem = "jobs",
            component = "pipeline",
            %job_id,
            %bug_id,
            provider = %record.provider,
            confidence = record.confidence,
            has_patch = record.patch_diff.is_some(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Bug analyzed"
        );

        CycleOutcome::Completed {
            job_id,
            bug_id,
            provider: record.provider,
        }
    }

    /// Call the provider under the deadline and normalize the result.
    async fn analyze(&self, bug: &Bug, context: &[String]) -> Result<AnalysisRecord, String> {
        let analysis = tokio::time::timeout(self.timeout, self.provider.analyze(bug, context))
            .await
            .map_err(|_| format!("Analysis timed out after {}s", self.timeout.as_secs_f64()))?
            .map_err(|e| e.to_string())?;
        AnalysisRecord::from_analysis(analysis).map_err(|e| e.to_string())
    }

    /// Move the job (and the bug, when given) to `error`.
    async fn fail_job(&self, job: &Job, bug_id: Option<Uuid>, message: String) -> CycleOutcome {
        let job_id = job.id;
        if let Some(bug_id) = bug_id {
            match self.bugs.set_status(bug_id, BugStatus::Error).await {
                Ok(Transition::Rejected { current }) => warn!(
                    subsystem = "jobs",
                    component = "pipeline",
                    %job_id,
                    %bug_id,
                    current = %current,
                    "Bug not moved to error"
                ),
                Ok(_) => {}
                Err(e) => error!(
                    subsystem = "jobs",
                    component = "pipeline",
                    %job_id,
                    %bug_id,
                    error = %e,
                    "Failed to mark bug as error"
                ),
            }
        }

        self.queue.fail(job, &message).await;
        warn!(
            subsystem = "jobs",
            component = "pipeline",
            %job_id,
            error = %message,
            "Job failed"
        );

        CycleOutcome::Failed {
            job_id,
            bug_id,
            error: message,
        }
    }
}
