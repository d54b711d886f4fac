//! Bug repository implementation.

use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use tracing::{info, warn};
use uuid::Uuid;

use bugscope_core::{
    defaults, new_v7, settle_unapplied, AnalysisRecord, AnalyzeBugPayload, Bug, BugRepository,
    BugStatus, BugWithProject, CreateBugRequest, Error, JobType, LifecycleState, ListBugsRequest,
    Result, SubmittedBug, Transition,
};

use crate::codec;
use crate::jobs::insert_job;

const BUG_COLUMNS: &str = "b.id, b.project_id, b.title, b.steps, b.expected, b.actual, \
     b.severity, b.url, b.user_agent, b.viewport, b.console_logs, b.network_errors, \
     b.screenshot_data_url, b.status, b.ai_analysis, b.ai_patch_diff, b.confidence, \
     b.ai_provider, b.created_at, b.updated_at";

/// PostgreSQL implementation of BugRepository.
#[derive(Clone)]
pub struct PgBugRepository {
    pool: Pool<Postgres>,
}

impl PgBugRepository {
    /// Create a new PgBugRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_bug_row(row: &sqlx::postgres::PgRow) -> Result<Bug> {
        let severity: String = row.try_get("severity")?;
        let status: String = row.try_get("status")?;
        Ok(Bug {
            id: row.try_get("id")?,
            project_id: row.try_get("project_id")?,
            title: row.try_get("title")?,
            steps: row.try_get("steps")?,
            expected: row.try_get("expected")?,
            actual: row.try_get("actual")?,
            severity: severity.parse().map_err(Error::Internal)?,
            url: row.try_get("url")?,
            user_agent: row.try_get("user_agent")?,
            viewport: codec::decode_viewport(row.try_get("viewport")?)?,
            console_logs: codec::decode_console_logs(row.try_get("console_logs")?)?,
            network_errors: codec::decode_network_errors(row.try_get("network_errors")?)?,
            screenshot_data_url: row.try_get("screenshot_data_url")?,
            status: status.parse().map_err(Error::Internal)?,
            ai_analysis: row.try_get("ai_analysis")?,
            ai_patch_diff: row.try_get("ai_patch_diff")?,
            confidence: row.try_get("confidence")?,
            ai_provider: row.try_get("ai_provider")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    async fn current_status(&self, id: Uuid) -> Result<BugStatus> {
        let status: Option<String> = sqlx::query_scalar("SELECT status FROM bug WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        status
            .ok_or(Error::BugNotFound(id))?
            .parse()
            .map_err(Error::Internal)
    }

    /// Explain a conditional bug update that matched no row.
    async fn settle(&self, id: Uuid, target: BugStatus) -> Result<Transition<BugStatus>> {
        let outcome = settle_unapplied(self.current_status(id).await?, target);
        if let Transition::Rejected { current } = outcome {
            warn!(
                subsystem = "database",
                component = "bugs",
                op = "transition",
                bug_id = %id,
                from = %current,
                to = %target,
                "Rejected bug status transition"
            );
        }
        Ok(outcome)
    }
}

fn allowed_sources(target: BugStatus) -> Vec<String> {
    target
        .allowed_sources()
        .iter()
        .map(|s| s.as_str().to_string())
        .collect()
}

#[async_trait]
impl BugRepository for PgBugRepository {
    async fn submit(&self, req: CreateBugRequest) -> Result<SubmittedBug> {
        let start = Instant::now();
        let bug_id = new_v7();
        let now = Utc::now();

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        sqlx::query(
            "INSERT INTO bug (id, project_id, title, steps, expected, actual, severity, url,
                              user_agent, viewport, console_logs, network_errors,
                              screenshot_data_url, status, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, 'queued', $14, $14)",
        )
        .bind(bug_id)
        .bind(req.project_id)
        .bind(&req.title)
        .bind(&req.steps)
        .bind(&req.expected)
        .bind(&req.actual)
        .bind(req.severity.as_str())
        .bind(&req.url)
        .bind(&req.user_agent)
        .bind(codec::encode_viewport(&req.viewport)?)
        .bind(codec::encode_console_logs(&req.console_logs)?)
        .bind(codec::encode_network_errors(&req.network_errors)?)
        .bind(&req.screenshot_data_url)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        let job_id = insert_job(
            &mut *tx,
            JobType::AnalyzeBug,
            &AnalyzeBugPayload::new(bug_id).to_json(),
        )
        .await?;

        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "database",
            component = "bugs",
            op = "submit",
            bug_id = %bug_id,
            job_id = %job_id,
            project_id = %req.project_id,
            severity = %req.severity,
            duration_ms = start.elapsed().as_millis() as u64,
            "Bug submitted"
        );
        Ok(SubmittedBug { bug_id, job_id })
    }

    async fn get(&self, id: Uuid) -> Result<Option<Bug>> {
        let row = sqlx::query(&format!("SELECT {} FROM bug b WHERE b.id = $1", BUG_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        row.as_ref().map(Self::parse_bug_row).transpose()
    }

    async fn get_with_project(&self, id: Uuid) -> Result<Option<BugWithProject>> {
        let row = sqlx::query(&format!(
            "SELECT {}, p.name AS project_name, p.public_key AS project_public_key
             FROM bug b
             JOIN project p ON p.id = b.project_id
             WHERE b.id = $1",
            BUG_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(BugWithProject {
            bug: Self::parse_bug_row(&row)?,
            project_name: row.try_get("project_name")?,
            project_public_key: row.try_get("project_public_key")?,
        }))
    }

    async fn list(&self, req: ListBugsRequest) -> Result<Vec<Bug>> {
        let limit = req.limit.unwrap_or(defaults::LIST_LIMIT);
        let offset = req.offset.unwrap_or(0);

        let rows = sqlx::query(&format!(
            "SELECT {} FROM bug b
             WHERE ($1::uuid IS NULL OR b.project_id = $1)
               AND ($2::text IS NULL OR b.status = $2)
               AND ($3::text IS NULL OR b.severity = $3)
             ORDER BY b.created_at DESC, b.id DESC
             LIMIT $4 OFFSET $5",
            BUG_COLUMNS
        ))
        .bind(req.project_id)
        .bind(req.status.map(|s| s.as_str()))
        .bind(req.severity.map(|s| s.as_str()))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(Self::parse_bug_row).collect()
    }

    async fn set_status(&self, id: Uuid, status: BugStatus) -> Result<Transition<BugStatus>> {
        let updated = sqlx::query(
            "UPDATE bug SET status = $1, updated_at = $2
             WHERE id = $3 AND status = ANY($4)",
        )
        .bind(status.as_str())
        .bind(Utc::now())
        .bind(id)
        .bind(allowed_sources(status))
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if updated.rows_affected() == 1 {
            return Ok(Transition::Applied);
        }
        self.settle(id, status).await
    }

    async fn record_analysis(
        &self,
        id: Uuid,
        record: &AnalysisRecord,
    ) -> Result<Transition<BugStatus>> {
        let updated = sqlx::query(
            "UPDATE bug
             SET status = 'analyzed', ai_analysis = $1, ai_patch_diff = $2, confidence = $3,
                 ai_provider = $4, updated_at = $5
             WHERE id = $6 AND status = ANY($7)",
        )
        .bind(&record.analysis)
        .bind(&record.patch_diff)
        .bind(record.confidence)
        .bind(&record.provider)
        .bind(Utc::now())
        .bind(id)
        .bind(allowed_sources(BugStatus::Analyzed))
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if updated.rows_affected() == 1 {
            return Ok(Transition::Applied);
        }
        self.settle(id, BugStatus::Analyzed).await
    }
}
