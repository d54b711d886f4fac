//! Job repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::{PgExecutor, Pool, Postgres, Row};
use tracing::{debug, warn};
use uuid::Uuid;

use bugscope_core::{
    new_v7, settle_unapplied, Error, Job, JobRepository, JobStatus, JobType, LifecycleState,
    QueueStats, Result, Transition,
};

const JOB_COLUMNS: &str =
    "id, job_type, payload, status, error, created_at, updated_at, started_at";

/// PostgreSQL implementation of JobRepository.
#[derive(Clone)]
pub struct PgJobRepository {
    pool: Pool<Postgres>,
}

impl PgJobRepository {
    /// Create a new PgJobRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Parse a job row into a Job struct.
    fn parse_job_row(row: sqlx::postgres::PgRow) -> Result<Job> {
        let job_type: String = row.try_get("job_type")?;
        let status: String = row.try_get("status")?;
        Ok(Job {
            id: row.try_get("id")?,
            job_type: job_type.parse().map_err(Error::Internal)?,
            payload: row.try_get("payload")?,
            status: status.parse().map_err(Error::Internal)?,
            error: row.try_get("error")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            started_at: row.try_get("started_at")?,
        })
    }

    /// Apply `target` if the job is in one of its allowed sources and still
    /// carries the claim `job` was handed out with.
    async fn transition(
        &self,
        job: &Job,
        target: JobStatus,
        error: Option<&str>,
    ) -> Result<Transition<JobStatus>> {
        let job_id = job.id;
        let allowed: Vec<String> = target
            .allowed_sources()
            .iter()
            .map(|s| s.as_str().to_string())
            .collect();

        let updated = sqlx::query(
            "UPDATE job
             SET status = $1, error = COALESCE($2, error), updated_at = $3
             WHERE id = $4 AND status = ANY($5) AND started_at IS NOT DISTINCT FROM $6",
        )
        .bind(target.as_str())
        .bind(error)
        .bind(Utc::now())
        .bind(job_id)
        .bind(&allowed)
        .bind(job.started_at)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if updated.rows_affected() == 1 {
            return Ok(Transition::Applied);
        }

        let current: Option<String> = sqlx::query_scalar("SELECT status FROM job WHERE id = $1")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        let current: JobStatus = current
            .ok_or_else(|| Error::NotFound(format!("Job {} not found", job_id)))?
            .parse()
            .map_err(Error::Internal)?;

        let outcome = settle_unapplied(current, target);
        if let Transition::Rejected { current } = outcome {
            warn!(
                subsystem = "database",
                component = "jobs",
                op = "transition",
                job_id = %job_id,
                from = %current,
                to = %target,
                "Rejected job status transition"
            );
        }
        Ok(outcome)
    }
}

/// Insert a queued job using any Postgres executor.
///
/// Shared by [`JobRepository::enqueue`] and bug submission, which must write
/// the job in the same transaction as its bug.
pub(crate) async fn insert_job<'e, E>(
    executor: E,
    job_type: JobType,
    payload: &JsonValue,
) -> Result<Uuid>
where
    E: PgExecutor<'e>,
{
    let job_id = new_v7();
    let now = Utc::now();

    sqlx::query(
        "INSERT INTO job (id, job_type, payload, status, created_at, updated_at)
         VALUES ($1, $2, $3, 'queued', $4, $4)",
    )
    .bind(job_id)
    .bind(job_type.as_str())
    .bind(payload)
    .bind(now)
    .execute(executor)
    .await
    .map_err(Error::Database)?;

    Ok(job_id)
}

#[async_trait]
impl JobRepository for PgJobRepository {
    async fn enqueue(&self, job_type: JobType, payload: JsonValue) -> Result<Uuid> {
        let job_id = insert_job(&self.pool, job_type, &payload).await?;
        debug!(
            subsystem = "database",
            component = "jobs",
            op = "enqueue",
            job_id = %job_id,
            job_type = %job_type,
            "Job queued"
        );
        Ok(job_id)
    }

    async fn claim_next(&self, job_type: JobType) -> Result<Option<Job>> {
        let now = Utc::now();

        // FOR UPDATE SKIP LOCKED: concurrent claimers never block on or share a row.
        // The outer status check keeps the update conditional even under READ COMMITTED.
        let row = sqlx::query(&format!(
            "UPDATE job
             SET status = 'processing', started_at = $1, updated_at = $1
             WHERE id = (
                 SELECT id FROM job
                 WHERE status = 'queued' AND job_type = $2
                 ORDER BY created_at ASC, id ASC
                 LIMIT 1
                 FOR UPDATE SKIP LOCKED
             )
             AND status = 'queued'
             RETURNING {}",
            JOB_COLUMNS
        ))
        .bind(now)
        .bind(job_type.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.map(Self::parse_job_row).transpose()
    }

    async fn complete(&self, job: &Job) -> Result<Transition<JobStatus>> {
        self.transition(job, JobStatus::Done, None).await
    }

    async fn fail(&self, job: &Job, error: &str) -> Result<Transition<JobStatus>> {
        self.transition(job, JobStatus::Error, Some(error)).await
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<Job>> {
        let row = sqlx::query(&format!("SELECT {} FROM job WHERE id = $1", JOB_COLUMNS))
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        row.map(Self::parse_job_row).transpose()
    }

    async fn pending_count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM job WHERE status = 'queued'")
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(count)
    }

    async fn queue_stats(&self) -> Result<QueueStats> {
        let row = sqlx::query(
            "SELECT
                COUNT(*) FILTER (WHERE status = 'queued') as queued,
                COUNT(*) FILTER (WHERE status = 'processing') as processing,
                COUNT(*) FILTER (WHERE status = 'done') as done,
                COUNT(*) FILTER (WHERE status = 'error') as error,
                COUNT(*) as total
             FROM job",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(QueueStats {
            queued: row.try_get("queued")?,
            processing: row.try_get("processing")?,
            done: row.try_get("done")?,
            error: row.try_get("error")?,
            total: row.try_get("total")?,
        })
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<Job>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM job ORDER BY created_at DESC, id DESC LIMIT $1",
            JOB_COLUMNS
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.into_iter().map(Self::parse_job_row).collect()
    }

    async fn requeue_stale(&self, claimed_before: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE job
             SET status = 'queued', started_at = NULL, updated_at = $1
             WHERE status = 'processing' AND started_at < $2",
        )
        .bind(Utc::now())
        .bind(claimed_before)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(result.rows_affected())
    }
}
