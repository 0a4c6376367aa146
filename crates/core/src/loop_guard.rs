//! Infinite-loop detection.
//!
//! If this automation pushes a commit that re-triggers the workflow that ran
//! it, the two can feed each other forever. The guard inspects the most
//! recent commits on the target ref and refuses to run when every one of
//! them was produced by this automation.

use tracing::{debug, warn};

use crate::commit_format::is_automation_message;
use crate::errors::GitError;
use crate::git::GitClient;

/// How many consecutive automation commits count as a loop.
pub const LOOKBACK_COMMITS: usize = 5;

/// Inspects recent history for runaway automation.
pub struct LoopGuard<'a> {
    git: &'a GitClient,
}

impl<'a> LoopGuard<'a> {
    pub fn new(git: &'a GitClient) -> Self {
        Self { git }
    }

    /// Fetch the last [`LOOKBACK_COMMITS`] commits reachable from `sha` and
    /// report whether all of them carry the automation trailer.
    ///
    /// Runs before any commit or push side effect, so a detected loop never
    /// produces another automation commit.
    pub async fn is_looping(&self, sha: &str) -> Result<bool, GitError> {
        self.git.fetch(&[sha], LOOKBACK_COMMITS as u32).await?;
        let messages = self
            .git
            .recent_commit_messages(sha, LOOKBACK_COMMITS)
            .await?;
        let looping = all_automation_commits(&messages);
        if looping {
            warn!(sha, limit = LOOKBACK_COMMITS, "loop detected");
        } else {
            debug!(sha, inspected = messages.len(), "no loop detected");
        }
        Ok(looping)
    }
}

/// A loop needs exactly the full lookback window of automation commits.
/// A short history (young branch) can never trip the guard.
fn all_automation_commits(messages: &[String]) -> bool {
    messages.len() == LOOKBACK_COMMITS && messages.iter().all(|m| is_automation_message(m))
}
