//! Core data models for bugscope.
//!
//! These types are shared across all bugscope crates and represent the
//! domain entities: projects, bug reports with their captured telemetry,
//! and the background jobs that carry a bug to the analyzer.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::defaults::TELEMETRY_MAX_ENTRIES;
use crate::error::{Error, Result};

// =============================================================================
// PROJECT TYPES
// =============================================================================

/// A site that embeds the bug widget. Immutable after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    /// Key embedded in the widget; identifies the project on submission.
    pub public_key: String,
    /// Key used by the project owner to read results.
    pub secret_key: String,
    pub created_at: DateTime<Utc>,
}

/// Request for creating a project.
#[derive(Debug, Clone)]
pub struct CreateProjectRequest {
    pub name: String,
    pub public_key: String,
    pub secret_key: String,
}

// =============================================================================
// BUG TYPES
// =============================================================================

/// Reporter-assigned severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            _ => Err(format!("Invalid severity: {}", s)),
        }
    }
}

/// Externally visible status of a bug report.
///
/// See [`crate::lifecycle`] for the legal transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BugStatus {
    New,
    Queued,
    Analyzing,
    Analyzed,
    Error,
}

impl BugStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Queued => "queued",
            Self::Analyzing => "analyzing",
            Self::Analyzed => "analyzed",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for BugStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BugStatus {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "new" => Ok(Self::New),
            "queued" => Ok(Self::Queued),
            "analyzing" => Ok(Self::Analyzing),
            "analyzed" => Ok(Self::Analyzed),
            "error" => Ok(Self::Error),
            _ => Err(format!("Invalid bug status: {}", s)),
        }
    }
}

/// Browser viewport at the time of the report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// Console method that produced a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleLevel {
    Log,
    Warn,
    Error,
}

/// A captured console message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleLogEntry {
    pub level: ConsoleLevel,
    pub message: String,
    /// Milliseconds since the Unix epoch, as reported by the browser.
    pub timestamp: i64,
}

/// A captured failed network request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkErrorEntry {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Milliseconds since the Unix epoch, as reported by the browser.
    pub timestamp: i64,
}

/// Bounded, ordered telemetry buffer.
///
/// Holds at most [`TELEMETRY_MAX_ENTRIES`] items; pushing past capacity evicts
/// the oldest entry. Deserializing an oversized list keeps the newest entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<T>", into = "Vec<T>")]
pub struct TelemetryLog<T: Clone> {
    entries: VecDeque<T>,
}

impl<T: Clone> TelemetryLog<T> {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::with_capacity(TELEMETRY_MAX_ENTRIES),
        }
    }

    /// Append an entry, evicting the oldest when full.
    pub fn push(&mut self, entry: T) {
        if self.entries.len() == TELEMETRY_MAX_ENTRIES {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate oldest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.entries.iter()
    }
}

impl<T: Clone> Default for TelemetryLog<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> FromIterator<T> for TelemetryLog<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut log = Self::new();
        for entry in iter {
            log.push(entry);
        }
        log
    }
}

impl<T: Clone> From<Vec<T>> for TelemetryLog<T> {
    fn from(entries: Vec<T>) -> Self {
        entries.into_iter().collect()
    }
}

impl<T: Clone> From<TelemetryLog<T>> for Vec<T> {
    fn from(log: TelemetryLog<T>) -> Self {
        log.entries.into()
    }
}

/// A bug report as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bug {
    pub id: Uuid,
    pub project_id: Uuid,
    pub title: String,
    pub steps: String,
    pub expected: String,
    pub actual: String,
    pub severity: Severity,
    pub url: String,
    pub user_agent: String,
    pub viewport: Viewport,
    #[serde(default)]
    pub console_logs: TelemetryLog<ConsoleLogEntry>,
    #[serde(default)]
    pub network_errors: TelemetryLog<NetworkErrorEntry>,
    pub screenshot_data_url: Option<String>,
    pub status: BugStatus,
    pub ai_analysis: Option<String>,
    /// Proposed unified diff. Absent when the provider had no patch.
    pub ai_patch_diff: Option<String>,
    pub confidence: Option<f64>,
    pub ai_provider: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A bug joined with the project fields the pipeline needs.
#[derive(Debug, Clone, PartialEq)]
pub struct BugWithProject {
    pub bug: Bug,
    pub project_name: String,
    pub project_public_key: String,
}

/// Validated bug submission, as produced by the API layer.
#[derive(Debug, Clone)]
pub struct CreateBugRequest {
    pub project_id: Uuid,
    pub title: String,
    pub steps: String,
    pub expected: String,
    pub actual: String,
    pub severity: Severity,
    pub url: String,
    pub user_agent: String,
    pub viewport: Viewport,
    pub console_logs: TelemetryLog<ConsoleLogEntry>,
    pub network_errors: TelemetryLog<NetworkErrorEntry>,
    pub screenshot_data_url: Option<String>,
}

/// Ids produced by a bug submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmittedBug {
    pub bug_id: Uuid,
    pub job_id: Uuid,
}

/// Request for listing bugs.
#[derive(Debug, Clone, Default)]
pub struct ListBugsRequest {
    pub project_id: Option<Uuid>,
    pub status: Option<BugStatus>,
    pub severity: Option<Severity>,
    /// Maximum results (defaults to [`crate::defaults::LIST_LIMIT`])
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

// =============================================================================
// JOB TYPES
// =============================================================================

/// Type of job to process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobType {
    /// Run AI analysis for a submitted bug
    #[serde(rename = "ANALYZE_BUG")]
    AnalyzeBug,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AnalyzeBug => "ANALYZE_BUG",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobType {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "ANALYZE_BUG" => Ok(Self::AnalyzeBug),
            _ => Err(format!("Invalid job type: {}", s)),
        }
    }
}

/// Status of a job in the queue.
///
/// See [`crate::lifecycle`] for the legal transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Done,
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Done => "done",
            Self::Error => "error",
        }
    }

    /// Done and error jobs never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "queued" => Ok(Self::Queued),
            "processing" => Ok(Self::Processing),
            "done" => Ok(Self::Done),
            "error" => Ok(Self::Error),
            _ => Err(format!("Invalid job status: {}", s)),
        }
    }
}

/// A unit of background work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub payload: JsonValue,
    pub status: JobStatus,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set when the job is claimed.
    pub started_at: Option<DateTime<Utc>>,
}

/// Payload of an [`JobType::AnalyzeBug`] job.
///
/// `bug_id` is kept as the raw string from the payload: the job row only
/// holds a weak reference to the bug, and an id that does not parse is
/// reported the same way as an id that does not exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeBugPayload {
    pub bug_id: String,
}

impl AnalyzeBugPayload {
    pub fn new(bug_id: Uuid) -> Self {
        Self {
            bug_id: bug_id.to_string(),
        }
    }

    /// Decode the payload of a job, rejecting missing or blank `bugId`.
    pub fn from_job(job: &Job) -> Result<Self> {
        let payload: Self = serde_json::from_value(job.payload.clone())
            .map_err(|e| Error::Job(format!("Malformed ANALYZE_BUG payload: {}", e)))?;
        if payload.bug_id.trim().is_empty() {
            return Err(Error::Job(
                "Malformed ANALYZE_BUG payload: bugId is empty".to_string(),
            ));
        }
        Ok(payload)
    }

    pub fn to_json(&self) -> JsonValue {
        serde_json::json!({ "bugId": self.bug_id })
    }

    /// The referenced bug id, if it is a well-formed UUID.
    pub fn bug_uuid(&self) -> Option<Uuid> {
        Uuid::parse_str(self.bug_id.trim()).ok()
    }
}

/// Queue statistics summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub queued: i64,
    pub processing: i64,
    pub done: i64,
    pub error: i64,
    pub total: i64,
}
