//! Merge-commit reconciliation for pull-request events.
//!
//! CI checks out a pull request at its synthetic merge ref, not at the
//! contributor's head commit. Pushing that merge commit onto the head branch
//! would drag unrelated base history into the pull request diff. Instead,
//! the reconciler isolates the generated change as its own commit, rebuilds
//! enough history to reason about the merge, and transplants the change onto
//! the real head commit: cherry-pick first, explicit re-merge as the
//! fallback when the change itself conflicts with newer base history.

use tracing::{debug, info, warn};

use crate::commit_format::{commit_message_lines, remerge_message};
use crate::context::{EventContext, PullRequestDescriptor};
use crate::errors::{GitError, RunError};
use crate::git::GitClient;
use crate::inputs::Inputs;

/// Fetch-depth widening step.
const FETCH_DEPTH_STEP: u32 = 50;
/// Hard upper bound (exclusive) on the fetch depth.
const FETCH_DEPTH_LIMIT: u32 = 1000;

/// The widening schedule: 50, 100, ... up to but excluding the limit.
fn fetch_depths() -> impl Iterator<Item = u32> {
    (1..)
        .map(|i| i * FETCH_DEPTH_STEP)
        .take_while(|depth| *depth < FETCH_DEPTH_LIMIT)
}

/// Transplants the generated change onto the pull request's head branch.
pub struct MergeCommitReconciler<'a> {
    git: &'a GitClient,
    inputs: &'a Inputs,
    context: &'a EventContext,
}

impl<'a> MergeCommitReconciler<'a> {
    pub fn new(git: &'a GitClient, inputs: &'a Inputs, context: &'a EventContext) -> Self {
        Self {
            git,
            inputs,
            context,
        }
    }

    /// Commit the working-tree diff and land it on the head branch.
    ///
    /// Returns the remote ref that was updated.
    pub async fn run(&self, pr: &PullRequestDescriptor) -> Result<String, RunError> {
        let remote_ref = format!("refs/heads/{}", pr.head_ref);
        let footer = self
            .inputs
            .message_footer
            .clone()
            .unwrap_or_else(|| self.context.run_url());
        let message = commit_message_lines(&self.inputs.message, &footer);

        let current = self.git.current_sha().await?;
        if current != self.context.sha {
            // The checkout already is the real head commit.
            info!(sha = %current, head_ref = %pr.head_ref, "committing directly onto the head commit");
            self.git.commit(&message).await?;
            self.push_head(&remote_ref).await?;
            return Ok(remote_ref);
        }

        // The checkout is the synthetic merge commit. Isolate the generated
        // change as a replayable commit before anything moves HEAD.
        info!(sha = %current, "checkout is the synthetic merge commit, reconciling");
        self.git.commit(&message).await?;
        let change_sha = self.git.current_sha().await?;
        debug!(change_sha = %change_sha, "isolated generated change");

        let base_sha = self.determine_base_sha(&current, &pr.head_sha).await?;
        info!(base = %base_sha, head = %pr.head_sha, "determined merge parents");

        self.widen_history(&base_sha, &pr.head_sha).await?;
        self.git.show_graph().await?;

        self.git.checkout(&pr.head_sha).await?;
        if !self.git.try_cherry_pick(&change_sha).await? {
            // The generated change conflicts with base history the head
            // branch has not seen yet. Recreate the merge explicitly, then
            // replay the change on top of it.
            info!(base = %base_sha, "cherry-pick conflicted, recreating the merge commit");
            let merge_message = remerge_message(
                &pr.base_ref,
                &base_sha,
                &pr.head_ref,
                &pr.head_sha,
                &current,
                &self.context.run_url(),
            );
            self.git.merge(&base_sha, &merge_message).await?;
            if let Err(error) = self.git.cherry_pick(&change_sha).await {
                warn!(error = %error, "cherry-pick failed after re-merge, leaving conflict for manual resolution");
                return Err(RunError::ReconciliationConflict {
                    change_sha,
                    head_ref: pr.head_ref.clone(),
                });
            }
        }

        self.push_head(&remote_ref).await?;
        Ok(remote_ref)
    }

    /// The merge commit's parent that is not the PR head is the base.
    async fn determine_base_sha(
        &self,
        merge_sha: &str,
        head_sha: &str,
    ) -> Result<String, RunError> {
        let parents = self.git.parent_shas(merge_sha).await?;
        parents
            .iter()
            .filter(|parent| parent.as_str() != head_sha)
            .next_back()
            .cloned()
            .ok_or_else(|| RunError::AmbiguousMergeAncestry {
                sha: merge_sha.to_string(),
                detail: format!(
                    "no parent differs from head {} (parents: {:?})",
                    head_sha, parents
                ),
            })
    }

    /// Deepen the fetched history for base and head in fixed steps until git
    /// can compute a merge base for them.
    async fn widen_history(&self, base_sha: &str, head_sha: &str) -> Result<(), RunError> {
        for depth in fetch_depths() {
            info!(depth, "fetching more history");
            self.git.fetch(&[base_sha, head_sha], depth).await?;
            if self.git.can_merge(base_sha, head_sha).await? {
                debug!(depth, "merge base is reachable");
                return Ok(());
            }
        }
        Err(RunError::AmbiguousMergeAncestry {
            sha: head_sha.to_string(),
            detail: format!(
                "no common ancestry between {} and {} within fetch depth {}",
                base_sha, head_sha, FETCH_DEPTH_LIMIT
            ),
        })
    }

    /// Push the local HEAD to the head branch by name, overwriting an
    /// outdated remote ref with the newly composed history.
    async fn push_head(&self, remote_ref: &str) -> Result<(), RunError> {
        let code = self
            .git
            .push("HEAD", remote_ref, self.inputs.dry_run)
            .await?;
        if code != 0 {
            return Err(RunError::Git(GitError::PushRejected {
                remote_ref: remote_ref.to_string(),
                exit_code: code,
            }));
        }
        Ok(())
    }
}
