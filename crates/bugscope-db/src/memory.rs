//! In-memory storage backend.
//!
//! Implements the project, bug and job repositories over plain collections
//! behind one `tokio::sync::Mutex`, so every operation (claim included) is
//! atomic with respect to the others. Suitable for tests and local runs
//! without PostgreSQL; nothing survives a restart.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use tokio::sync::Mutex;
use tracing::warn;
use uuid::Uuid;

use bugscope_core::{
    defaults, new_v7, plan_transition, settle_unapplied, AnalysisRecord, AnalyzeBugPayload, Bug, BugRepository,
    BugStatus, BugWithProject, CreateBugRequest, CreateProjectRequest, Error, Job, JobRepository,
    JobStatus, JobType, LifecycleState, ListBugsRequest, Project, ProjectRepository, QueueStats,
    Result, SubmittedBug, Transition,
};

#[derive(Default)]
struct MemoryStoreInner {
    projects: HashMap<Uuid, Project>,
    bugs: HashMap<Uuid, Bug>,
    /// Insertion order is queue order.
    jobs: Vec<Job>,
}

impl MemoryStoreInner {
    fn job_mut(&mut self, id: Uuid) -> Option<&mut Job> {
        self.jobs.iter_mut().find(|j| j.id == id)
    }

    fn insert_job(&mut self, job_type: JobType, payload: JsonValue) -> Uuid {
        let now = Utc::now();
        let id = new_v7();
        self.jobs.push(Job {
            id,
            job_type,
            payload,
            status: JobStatus::Queued,
            error: None,
            created_at: now,
            updated_at: now,
            started_at: None,
        });
        id
    }
}

/// Move `current` to `target` in place if the lifecycle allows it.
fn apply_transition<S: LifecycleState>(current: &mut S, target: S) -> Transition<S> {
    let outcome = plan_transition(*current, target);
    if outcome == Transition::Applied {
        *current = target;
    }
    outcome
}

/// [`apply_transition`] for a job, fenced on the claim the caller holds.
fn apply_job_transition(
    job: &mut Job,
    claimed_at: Option<DateTime<Utc>>,
    target: JobStatus,
) -> Transition<JobStatus> {
    if job.started_at != claimed_at {
        return settle_unapplied(job.status, target);
    }
    apply_transition(&mut job.status, target)
}

fn log_rejected<S: LifecycleState>(record: &str, id: Uuid, outcome: &Transition<S>, target: S) {
    if let Transition::Rejected { current } = outcome {
        warn!(
            subsystem = "database",
            component = "memory",
            op = "transition",
            record,
            id = %id,
            from = ?current,
            to = ?target,
            "Rejected status transition"
        );
    }
}

/// Thread-safe in-memory store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryStoreInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProjectRepository for MemoryStore {
    async fn insert(&self, req: CreateProjectRequest) -> Result<Project> {
        if req.public_key.trim().is_empty() || req.secret_key.trim().is_empty() {
            return Err(Error::InvalidInput(
                "Project keys must not be empty".to_string(),
            ));
        }

        let mut inner = self.inner.lock().await;
        let duplicate = inner
            .projects
            .values()
            .any(|p| p.public_key == req.public_key || p.secret_key == req.secret_key);
        if duplicate {
            return Err(Error::InvalidInput(
                "Project keys must be unique".to_string(),
            ));
        }

        let project = Project {
            id: new_v7(),
            name: req.name,
            public_key: req.public_key,
            secret_key: req.secret_key,
            created_at: Utc::now(),
        };
        inner.projects.insert(project.id, project.clone());
        Ok(project)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Project>> {
        Ok(self.inner.lock().await.projects.get(&id).cloned())
    }

    async fn get_by_public_key(&self, public_key: &str) -> Result<Option<Project>> {
        Ok(self
            .inner
            .lock()
            .await
            .projects
            .values()
            .find(|p| p.public_key == public_key)
            .cloned())
    }
}

#[async_trait]
impl BugRepository for MemoryStore {
    async fn submit(&self, req: CreateBugRequest) -> Result<SubmittedBug> {
        let mut inner = self.inner.lock().await;
        if !inner.projects.contains_key(&req.project_id) {
            return Err(Error::NotFound(format!(
                "Project {} not found",
                req.project_id
            )));
        }

        let now = Utc::now();
        let bug = Bug {
            id: new_v7(),
            project_id: req.project_id,
            title: req.title,
            steps: req.steps,
            expected: req.expected,
            actual: req.actual,
            severity: req.severity,
            url: req.url,
            user_agent: req.user_agent,
            viewport: req.viewport,
            console_logs: req.console_logs,
            network_errors: req.network_errors,
            screenshot_data_url: req.screenshot_data_url,
            status: BugStatus::Queued,
            ai_analysis: None,
            ai_patch_diff: None,
            confidence: None,
            ai_provider: None,
            created_at: now,
            updated_at: now,
        };
        let bug_id = bug.id;
        inner.bugs.insert(bug_id, bug);
        let job_id = inner.insert_job(JobType::AnalyzeBug, AnalyzeBugPayload::new(bug_id).to_json());

        Ok(SubmittedBug { bug_id, job_id })
    }

    async fn get(&self, id: Uuid) -> Result<Option<Bug>> {
        Ok(self.inner.lock().await.bugs.get(&id).cloned())
    }

    async fn get_with_project(&self, id: Uuid) -> Result<Option<BugWithProject>> {
        let inner = self.inner.lock().await;
        let Some(bug) = inner.bugs.get(&id) else {
            return Ok(None);
        };
        let project = inner.projects.get(&bug.project_id).ok_or_else(|| {
            Error::Internal(format!("Bug {} references missing project", id))
        })?;
        Ok(Some(BugWithProject {
            bug: bug.clone(),
            project_name: project.name.clone(),
            project_public_key: project.public_key.clone(),
        }))
    }

    async fn list(&self, req: ListBugsRequest) -> Result<Vec<Bug>> {
        let inner = self.inner.lock().await;
        let mut bugs: Vec<Bug> = inner
            .bugs
            .values()
            .filter(|b| req.project_id.map_or(true, |p| b.project_id == p))
            .filter(|b| req.status.map_or(true, |s| b.status == s))
            .filter(|b| req.severity.map_or(true, |s| b.severity == s))
            .cloned()
            .collect();
        bugs.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));

        let offset = req.offset.unwrap_or(0).max(0) as usize;
        let limit = req.limit.unwrap_or(defaults::LIST_LIMIT).max(0) as usize;
        Ok(bugs.into_iter().skip(offset).take(limit).collect())
    }

    async fn set_status(&self, id: Uuid, status: BugStatus) -> Result<Transition<BugStatus>> {
        let mut inner = self.inner.lock().await;
        let bug = inner.bugs.get_mut(&id).ok_or(Error::BugNotFound(id))?;
        let outcome = apply_transition(&mut bug.status, status);
        if outcome == Transition::Applied {
            bug.updated_at = Utc::now();
        }
        log_rejected("bug", id, &outcome, status);
        Ok(outcome)
    }

    async fn record_analysis(
        &self,
        id: Uuid,
        record: &AnalysisRecord,
    ) -> Result<Transition<BugStatus>> {
        let mut inner = self.inner.lock().await;
        let bug = inner.bugs.get_mut(&id).ok_or(Error::BugNotFound(id))?;
        let outcome = apply_transition(&mut bug.status, BugStatus::Analyzed);
        if outcome == Transition::Applied {
            bug.ai_analysis = Some(record.analysis.clone());
            bug.ai_patch_diff = record.patch_diff.clone();
            bug.confidence = Some(record.confidence);
            bug.ai_provider = Some(record.provider.clone());
            bug.updated_at = Utc::now();
        }
        log_rejected("bug", id, &outcome, BugStatus::Analyzed);
        Ok(outcome)
    }
}

#[async_trait]
impl JobRepository for MemoryStore {
    async fn enqueue(&self, job_type: JobType, payload: JsonValue) -> Result<Uuid> {
        Ok(self.inner.lock().await.insert_job(job_type, payload))
    }

    async fn claim_next(&self, job_type: JobType) -> Result<Option<Job>> {
        let mut inner = self.inner.lock().await;
        let Some(job) = inner
            .jobs
            .iter_mut()
            .find(|j| j.job_type == job_type && j.status == JobStatus::Queued)
        else {
            return Ok(None);
        };

        let now = Utc::now();
        job.status = JobStatus::Processing;
        job.started_at = Some(now);
        job.updated_at = now;
        Ok(Some(job.clone()))
    }

    async fn complete(&self, claimed: &Job) -> Result<Transition<JobStatus>> {
        let job_id = claimed.id;
        let mut inner = self.inner.lock().await;
        let job = inner
            .job_mut(job_id)
            .ok_or_else(|| Error::NotFound(format!("Job {} not found", job_id)))?;
        let outcome = apply_job_transition(job, claimed.started_at, JobStatus::Done);
        if outcome == Transition::Applied {
            job.updated_at = Utc::now();
        }
        log_rejected("job", job_id, &outcome, JobStatus::Done);
        Ok(outcome)
    }

    async fn fail(&self, claimed: &Job, error: &str) -> Result<Transition<JobStatus>> {
        let job_id = claimed.id;
        let mut inner = self.inner.lock().await;
        let job = inner
            .job_mut(job_id)
            .ok_or_else(|| Error::NotFound(format!("Job {} not found", job_id)))?;
        let outcome = apply_job_transition(job, claimed.started_at, JobStatus::Error);
        if outcome == Transition::Applied {
            job.error = Some(error.to_string());
            job.updated_at = Utc::now();
        }
        log_rejected("job", job_id, &outcome, JobStatus::Error);
        Ok(outcome)
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<Job>> {
        Ok(self
            .inner
            .lock()
            .await
            .jobs
            .iter()
            .find(|j| j.id == job_id)
            .cloned())
    }

    async fn pending_count(&self) -> Result<i64> {
        let inner = self.inner.lock().await;
        Ok(inner
            .jobs
            .iter()
            .filter(|j| j.status == JobStatus::Queued)
            .count() as i64)
    }

    async fn queue_stats(&self) -> Result<QueueStats> {
        let inner = self.inner.lock().await;
        let mut stats = QueueStats::default();
        for job in &inner.jobs {
            match job.status {
                JobStatus::Queued => stats.queued += 1,
                JobStatus::Processing => stats.processing += 1,
                JobStatus::Done => stats.done += 1,
                JobStatus::Error => stats.error += 1,
            }
            stats.total += 1;
        }
        Ok(stats)
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<Job>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .jobs
            .iter()
            .rev()
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn requeue_stale(&self, claimed_before: DateTime<Utc>) -> Result<u64> {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();
        let mut requeued = 0;
        for job in inner.jobs.iter_mut().filter(|j| {
            j.status == JobStatus::Processing && j.started_at.is_some_and(|t| t < claimed_before)
        }) {
            job.status = JobStatus::Queued;
            job.started_at = None;
            job.updated_at = now;
            requeued += 1;
        }
        Ok(requeued)
    }
}
