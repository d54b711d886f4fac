//! Core traits for bugscope abstractions.
//!
//! These traits define the interfaces that storage backends and AI
//! providers must satisfy, so the analysis pipeline can run against
//! PostgreSQL in production and an in-memory store in tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::analysis::{Analysis, AnalysisRecord};
use crate::error::Result;
use crate::lifecycle::Transition;
use crate::models::*;

// =============================================================================
// PROJECT REPOSITORY
// =============================================================================

/// Repository for project records.
#[async_trait]
pub trait ProjectRepository: Send + Sync {
    /// Create a project. Keys must be unique.
    async fn insert(&self, req: CreateProjectRequest) -> Result<Project>;

    /// Get a project by ID.
    async fn get(&self, id: Uuid) -> Result<Option<Project>>;

    /// Resolve the widget key to its project.
    async fn get_by_public_key(&self, public_key: &str) -> Result<Option<Project>>;
}

// =============================================================================
// BUG REPOSITORY
// =============================================================================

/// Repository for bug reports.
///
/// Status writes are conditional on the lifecycle table in
/// [`crate::lifecycle`]; an illegal move is reported, never applied.
#[async_trait]
pub trait BugRepository: Send + Sync {
    /// Persist a bug with status `queued` together with its `ANALYZE_BUG` job,
    /// atomically.
    async fn submit(&self, req: CreateBugRequest) -> Result<SubmittedBug>;

    /// Get a bug by ID.
    async fn get(&self, id: Uuid) -> Result<Option<Bug>>;

    /// Get a bug joined with its project.
    async fn get_with_project(&self, id: Uuid) -> Result<Option<BugWithProject>>;

    /// List bugs, newest first.
    async fn list(&self, req: ListBugsRequest) -> Result<Vec<Bug>>;

    /// Move a bug to `status`.
    ///
    /// Returns `Err(NotFound)` when the bug does not exist.
    async fn set_status(&self, id: Uuid, status: BugStatus) -> Result<Transition<BugStatus>>;

    /// Write analysis results and move the bug to `analyzed`.
    async fn record_analysis(
        &self,
        id: Uuid,
        record: &AnalysisRecord,
    ) -> Result<Transition<BugStatus>>;
}

// =============================================================================
// JOB REPOSITORY
// =============================================================================

/// Durable job queue.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Queue a new job.
    async fn enqueue(&self, job_type: JobType, payload: JsonValue) -> Result<Uuid>;

    /// Claim the oldest queued job of `job_type`, moving it to `processing`.
    ///
    /// The select and the status change happen in one conditional update;
    /// a caller that loses the race gets `None`, as does a caller facing an
    /// empty queue.
    async fn claim_next(&self, job_type: JobType) -> Result<Option<Job>>;

    /// Mark a claimed job as done. A second call is a no-op.
    ///
    /// Applies only while the job is still held under `job`'s claim (same
    /// `started_at`). A holder whose claim was requeued and taken by another
    /// worker gets `Rejected`.
    async fn complete(&self, job: &Job) -> Result<Transition<JobStatus>>;

    /// Mark a claimed job as failed, recording `error`. Fenced like
    /// [`JobRepository::complete`].
    async fn fail(&self, job: &Job, error: &str) -> Result<Transition<JobStatus>>;

    /// Get job by ID.
    async fn get(&self, job_id: Uuid) -> Result<Option<Job>>;

    /// Count of queued jobs.
    async fn pending_count(&self) -> Result<i64>;

    /// Per-status job counts.
    async fn queue_stats(&self) -> Result<QueueStats>;

    /// List recent jobs, newest first.
    async fn list_recent(&self, limit: i64) -> Result<Vec<Job>>;

    /// Move `processing` jobs claimed before `claimed_before` back to `queued`.
    ///
    /// Opt-in recovery for jobs abandoned by a crashed worker; returns the
    /// number of jobs requeued.
    async fn requeue_stale(&self, claimed_before: DateTime<Utc>) -> Result<u64>;
}

// =============================================================================
// AI PROVIDER
// =============================================================================

/// An AI analyzer for bug reports.
///
/// Transport, auth and quota failures must surface as errors. A successful
/// but malformed response should be degraded into a usable [`Analysis`]
/// instead.
#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    /// Analyze `bug` given up to 30 candidate source paths.
    async fn analyze(&self, bug: &Bug, context: &[String]) -> Result<Analysis>;

    /// Provider name recorded on the bug.
    fn name(&self) -> &str;
}
