//! Follow-up engine.
//!
//! One invocation per CI run. The engine decides, from the event kind and
//! the working-tree status alone, which of the terminal paths applies:
//! nothing to commit, loop detected, pull-request reconciliation,
//! fast-forward push, or pull-request fallback after a rejected push.
//! Every subprocess and network call is awaited to completion before the
//! next step; the working copy is a single shared mutable resource.

use chrono::Utc;
use tracing::{info, warn};

use crate::commit_format::{commit_message_lines, follow_up_branch, pull_request_body};
use crate::context::{EventContext, PullRequestDescriptor};
use crate::errors::{GitError, RunError};
use crate::git::{GitClient, GitHubClient};
use crate::inputs::Inputs;
use crate::loop_guard::{LoopGuard, LOOKBACK_COMMITS};
use crate::models::{PullRequestOutcome, RunOutcome};
use crate::reconcile::MergeCommitReconciler;

// ---------------------------------------------------------------------------
// Run states
// ---------------------------------------------------------------------------

/// Terminal paths of a follow-up run, for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
enum FollowUpState {
    NothingToCommit,
    LoopDetected,
    MergeReconcile,
    FastForward,
    PullRequestFallback,
}

impl std::fmt::Display for FollowUpState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NothingToCommit => write!(f, "nothing_to_commit"),
            Self::LoopDetected => write!(f, "loop_detected"),
            Self::MergeReconcile => write!(f, "merge_reconcile"),
            Self::FastForward => write!(f, "fast_forward"),
            Self::PullRequestFallback => write!(f, "pull_request_fallback"),
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Top-level dispatcher for one follow-up run.
pub struct FollowUpEngine {
    git: GitClient,
    github: GitHubClient,
    inputs: Inputs,
    context: EventContext,
}

impl FollowUpEngine {
    pub fn new(
        git: GitClient,
        github: GitHubClient,
        inputs: Inputs,
        context: EventContext,
    ) -> Self {
        Self {
            git,
            github,
            inputs,
            context,
        }
    }

    /// Execute the run.
    ///
    /// Returns the produced outcome, or a [`RunError`], including the
    /// deliberate `Policy` failures that carry a completed outcome.
    pub async fn run(&self) -> Result<RunOutcome, RunError> {
        let mut outcome = RunOutcome::begin();

        // A clean tree means the generation step produced nothing new;
        // nothing to guard, nothing to push.
        if self.git.status().await?.is_empty() {
            info!(state = %FollowUpState::NothingToCommit, "working tree is clean");
            outcome.completed_at = Some(Utc::now());
            return Ok(outcome);
        }

        // Guard the same ref the run will eventually push to: the PR head
        // for pull-request events, the triggering commit otherwise.
        let guard_sha = self
            .context
            .pull_request
            .as_ref()
            .map(|pr| pr.head_sha.as_str())
            .unwrap_or(self.context.sha.as_str());
        if LoopGuard::new(&self.git).is_looping(guard_sha).await? {
            warn!(state = %FollowUpState::LoopDetected, sha = %guard_sha, "aborting run");
            return Err(RunError::LoopDetected {
                limit: LOOKBACK_COMMITS,
                ref_name: guard_sha.to_string(),
            });
        }

        match &self.context.pull_request {
            Some(pr) => self.follow_up_pull_request(pr, outcome).await,
            None => self.follow_up_branch(outcome).await,
        }
    }

    /// Pull-request events: land the change on the PR head branch, then
    /// deliberately fail the run for opened/synchronize actions so that
    /// checks re-run against the pushed commit.
    async fn follow_up_pull_request(
        &self,
        pr: &PullRequestDescriptor,
        mut outcome: RunOutcome,
    ) -> Result<RunOutcome, RunError> {
        info!(
            state = %FollowUpState::MergeReconcile,
            head_ref = %pr.head_ref,
            "updating the pull request head branch"
        );
        let reconciler = MergeCommitReconciler::new(&self.git, &self.inputs, &self.context);
        let updated_ref = reconciler.run(pr).await?;
        outcome.updated_ref = Some(updated_ref.clone());
        outcome.completed_at = Some(Utc::now());

        if pr.action.requires_recheck() {
            return Err(RunError::Policy {
                message: format!(
                    "added a commit to {}; failing this run so checks re-run against the new commit",
                    updated_ref
                ),
                outcome,
            });
        }
        Ok(outcome)
    }

    /// Non-pull-request events: fast-forward the triggering ref, falling
    /// back to a follow-up pull request when the remote rejects the push.
    async fn follow_up_branch(&self, mut outcome: RunOutcome) -> Result<RunOutcome, RunError> {
        let footer = self
            .inputs
            .message_footer
            .clone()
            .unwrap_or_else(|| self.context.run_url());
        let message = commit_message_lines(&self.inputs.message, &footer);
        self.git.commit(&message).await?;

        info!(state = %FollowUpState::FastForward, ref_name = %self.context.ref_name, "attempting fast-forward push");
        let code = self
            .git
            .push("HEAD", &self.context.ref_name, self.inputs.dry_run)
            .await?;
        if code == 0 {
            outcome.updated_ref = Some(self.context.ref_name.clone());
            outcome.completed_at = Some(Utc::now());
            return Ok(outcome);
        }

        // The remote has diverged. Propose the already-created commit as a
        // follow-up pull request instead.
        info!(state = %FollowUpState::PullRequestFallback, "remote rejected fast-forward");
        let head_branch = follow_up_branch(&self.context.sha, self.context.run_number);
        let remote_ref = format!("refs/heads/{}", head_branch);
        let code = self
            .git
            .push("HEAD", &remote_ref, self.inputs.dry_run)
            .await?;
        if code != 0 {
            return Err(RunError::Git(GitError::PushRejected {
                remote_ref,
                exit_code: code,
            }));
        }

        if self.inputs.dry_run {
            info!(head = %head_branch, "dry-run: skipping pull request creation");
            outcome.completed_at = Some(Utc::now());
            return Ok(outcome);
        }

        let body = pull_request_body(
            &self.context.actor,
            &self.inputs.body,
            &self.inputs.message,
            &footer,
        );
        let pull = self
            .github
            .create_pull_request(
                &self.context.repo,
                self.context.branch_name(),
                &head_branch,
                &self.inputs.title,
                &body,
                self.inputs.draft,
            )
            .await?;
        outcome.pull_request = Some(PullRequestOutcome {
            number: pull.number,
            url: pull.html_url.clone(),
        });

        self.add_collaborators(pull.number).await;

        outcome.completed_at = Some(Utc::now());
        if self.context.event_name == "push" {
            return Err(RunError::Policy {
                message: format!(
                    "{} is out of date; merge {} to follow up the generated files",
                    self.context.ref_name, pull.html_url
                ),
                outcome,
            });
        }
        Ok(outcome)
    }

    /// Best-effort reviewer/assignee/label assignment. Failures here must
    /// never block the primary goal of getting the fix proposed; each call
    /// is logged and swallowed.
    async fn add_collaborators(&self, pr_number: u64) {
        let (users, teams) = self.inputs.split_reviewers();
        if !users.is_empty() || !teams.is_empty() {
            if let Err(error) = self
                .github
                .request_reviewers(&self.context.repo, pr_number, &users, &teams)
                .await
            {
                info!(error = %error, "could not request reviewers");
            }
        }

        let assignees = vec![self.context.actor.clone()];
        if let Err(error) = self
            .github
            .add_assignees(&self.context.repo, pr_number, &assignees)
            .await
        {
            info!(error = %error, actor = %self.context.actor, "could not add assignee");
        }

        if !self.inputs.labels.is_empty() {
            if let Err(error) = self
                .github
                .add_labels(&self.context.repo, pr_number, &self.inputs.labels)
                .await
            {
                info!(error = %error, "could not add labels");
            }
        }
    }
}
