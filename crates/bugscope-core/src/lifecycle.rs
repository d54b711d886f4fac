//! Status lifecycle rules for jobs and bugs.
//!
//! Both state machines are expressed as "which source states may move to
//! this target". Storage backends turn that into a conditional update
//! (`... WHERE status = ANY($allowed)`) so a transition is checked and applied
//! in one step, and use [`plan_transition`] to explain an update that did not
//! apply.
//!
//! Jobs:
//!
//! ```text
//! queued --claim--> processing --complete--> done
//!                              \--fail-----> error
//! ```
//!
//! Bugs:
//!
//! ```text
//! new/queued --claim--> analyzing --success--> analyzed
//!                                 \--failure--> error --manual reset--> queued
//! ```

use crate::models::{Bug, BugStatus, JobStatus};

/// A status type with a fixed transition table.
pub trait LifecycleState: Copy + Eq + std::fmt::Debug + 'static {
    /// States from which `self` may be entered.
    fn allowed_sources(self) -> &'static [Self];

    fn can_transition_to(self, target: Self) -> bool {
        target.allowed_sources().contains(&self)
    }
}

impl LifecycleState for JobStatus {
    fn allowed_sources(self) -> &'static [Self] {
        match self {
            JobStatus::Queued => &[],
            JobStatus::Processing => &[JobStatus::Queued],
            JobStatus::Done => &[JobStatus::Processing],
            JobStatus::Error => &[JobStatus::Processing],
        }
    }
}

impl LifecycleState for BugStatus {
    fn allowed_sources(self) -> &'static [Self] {
        match self {
            BugStatus::New => &[],
            BugStatus::Queued => &[BugStatus::New, BugStatus::Error],
            BugStatus::Analyzing => &[BugStatus::New, BugStatus::Queued],
            BugStatus::Analyzed => &[BugStatus::New, BugStatus::Queued, BugStatus::Analyzing],
            BugStatus::Error => &[BugStatus::New, BugStatus::Queued, BugStatus::Analyzing],
        }
    }
}

/// Outcome of a requested status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition<S> {
    /// The status changed.
    Applied,
    /// Already in the target status; nothing written.
    Unchanged,
    /// Not a legal move from the current status; nothing written.
    Rejected { current: S },
}

impl<S> Transition<S> {
    /// True when the record ends up in the requested status.
    pub fn reached_target(&self) -> bool {
        matches!(self, Transition::Applied | Transition::Unchanged)
    }
}

/// Decide what moving from `current` to `target` means.
pub fn plan_transition<S: LifecycleState>(current: S, target: S) -> Transition<S> {
    if current == target {
        Transition::Unchanged
    } else if current.can_transition_to(target) {
        Transition::Applied
    } else {
        Transition::Rejected { current }
    }
}

/// Explain a conditional update that matched no row.
///
/// `current` is the status read back after the update. A plan of `Applied`
/// here means another writer moved the record in between, so the change is
/// reported as rejected rather than claimed.
pub fn settle_unapplied<S: LifecycleState>(current: S, target: S) -> Transition<S> {
    match plan_transition(current, target) {
        Transition::Applied => Transition::Rejected { current },
        other => other,
    }
}

/// A bug that already carries a non-empty analysis must not be analyzed again.
pub fn is_already_analyzed(bug: &Bug) -> bool {
    bug.status == BugStatus::Analyzed
        && bug
            .ai_analysis
            .as_deref()
            .is_some_and(|text| !text.trim().is_empty())
}
