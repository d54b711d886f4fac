//! Job queue facade used by the pipeline.
//!
//! Every method here absorbs store errors: they are logged and turned into a
//! neutral result so that a failing database cannot take the poll loop down.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, warn};
use uuid::Uuid;

use bugscope_core::{Job, JobRepository, JobStatus, JobType, Result, Transition};

/// Error-absorbing wrapper over a [`JobRepository`].
#[derive(Clone)]
pub struct JobQueue {
    repo: Arc<dyn JobRepository>,
}

impl JobQueue {
    pub fn new(repo: Arc<dyn JobRepository>) -> Self {
        Self { repo }
    }

    /// Claim the oldest queued job of `job_type`.
    ///
    /// An empty queue and a store error both yield `None`.
    pub async fn claim(&self, job_type: JobType) -> Option<Job> {
        match self.repo.claim_next(job_type).await {
            Ok(Some(job)) => {
                debug!(
                    subsystem = "jobs",
                    component = "queue",
                    op = "claim",
                    job_id = %job.id,
                    %job_type,
                    "Job claimed"
                );
                Some(job)
            }
            Ok(None) => None,
            Err(e) => {
                error!(
                    subsystem = "jobs",
                    component = "queue",
                    op = "claim",
                    %job_type,
                    error = %e,
                    "Failed to claim job"
                );
                None
            }
        }
    }

    /// Mark a claimed job done. Returns true when the job ends up `done`.
    ///
    /// False when the claim was superseded by the stale sweep.
    pub async fn complete(&self, job: &Job) -> bool {
        let result = self.repo.complete(job).await;
        self.settle(job.id, "complete", result)
    }

    /// Mark a claimed job failed with `message`. Returns true when the job ends up `error`.
    pub async fn fail(&self, job: &Job, message: &str) -> bool {
        let result = self.repo.fail(job, message).await;
        self.settle(job.id, "fail", result)
    }

    /// Requeue jobs stuck in `processing` for longer than `older_than`.
    pub async fn requeue_stale(&self, older_than: Duration) -> u64 {
        let cutoff = match chrono::Duration::from_std(older_than) {
            Ok(age) => Utc::now() - age,
            Err(e) => {
                error!(
                    subsystem = "jobs",
                    component = "queue",
                    op = "requeue_stale",
                    error = %e,
                    "Stale threshold out of range"
                );
                return 0;
            }
        };

        match self.repo.requeue_stale(cutoff).await {
            Ok(0) => 0,
            Ok(count) => {
                warn!(
                    subsystem = "jobs",
                    component = "queue",
                    op = "requeue_stale",
                    count,
                    "Requeued stale jobs"
                );
                count
            }
            Err(e) => {
                error!(
                    subsystem = "jobs",
                    component = "queue",
                    op = "requeue_stale",
                    error = %e,
                    "Failed to requeue stale jobs"
                );
                0
            }
        }
    }

    /// Number of queued jobs.
    pub async fn pending_count(&self) -> Result<i64> {
        self.repo.pending_count().await
    }

    fn settle(&self, job_id: Uuid, op: &str, result: Result<Transition<JobStatus>>) -> bool {
        match result {
            Ok(Transition::Rejected { current }) => {
                warn!(
                    subsystem = "jobs",
                    component = "queue",
                    op,
                    %job_id,
                    current = %current,
                    "Job transition rejected"
                );
                false
            }
            Ok(_) => true,
            Err(e) => {
                error!(
                    subsystem = "jobs",
                    component = "queue",
                    op,
                    %job_id,
                    error = %e,
                    "Failed to update job status"
                );
                false
            }
        }
    }
}
