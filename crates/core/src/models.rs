//! Result types produced by a follow-up run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Run outcome
// ---------------------------------------------------------------------------

/// The result of a single follow-up run.
///
/// A run either changes nothing (clean working tree), advances exactly one
/// ref by one new commit, or opens exactly one follow-up pull request on top
/// of a freshly pushed branch. Never more than one remote write per ref.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    /// The remote ref that was advanced, if any.
    pub updated_ref: Option<String>,
    /// The follow-up pull request, if one was created.
    pub pull_request: Option<PullRequestOutcome>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl RunOutcome {
    /// A fresh outcome stamped with the current time.
    pub fn begin() -> Self {
        Self {
            updated_ref: None,
            pull_request: None,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    /// True if the run produced no remote state change.
    pub fn is_noop(&self) -> bool {
        self.updated_ref.is_none() && self.pull_request.is_none()
    }
}

/// A follow-up pull request created by this run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequestOutcome {
    pub number: u64,
    pub url: String,
}
