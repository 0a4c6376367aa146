//! Error types for the gencommit core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and the
//! run-level [`RunError`] unifies them for the engine and the CLI boundary.

use thiserror::Error;

use crate::models::RunOutcome;

// ---------------------------------------------------------------------------
// Run-level errors
// ---------------------------------------------------------------------------

/// Errors that terminate a follow-up run.
///
/// `Policy` is not a defect: it is the deliberately failed run status used to
/// force CI to re-evaluate against a newly pushed commit, or to prompt a
/// human to merge a follow-up pull request. It carries the outcome that was
/// successfully produced before the run was failed.
#[derive(Debug, Error)]
pub enum RunError {
    /// The last `limit` commits on the target ref were all produced by this
    /// automation.
    #[error("this automation produced the last {limit} commits on {ref_name}; stopping the job to prevent an infinite loop")]
    LoopDetected { limit: usize, ref_name: String },

    /// The synthetic merge commit's parents do not yield a determinable base
    /// commit, or no common ancestry was found within the fetch-depth bound.
    #[error("cannot determine merge ancestry for {sha}: {detail}")]
    AmbiguousMergeAncestry { sha: String, detail: String },

    /// The final fallback cherry-pick still failed after an explicit
    /// re-merge. The conflicted working copy is left in place for manual
    /// resolution.
    #[error("cherry-pick of {change_sha} onto {head_ref} failed even after re-merging; resolve the conflict manually")]
    ReconciliationConflict {
        change_sha: String,
        head_ref: String,
    },

    /// A deliberately failed run status carrying the produced outcome.
    #[error("{message}")]
    Policy {
        message: String,
        outcome: RunOutcome,
    },

    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    GitHub(#[from] GitHubError),
}

// ---------------------------------------------------------------------------
// Git errors
// ---------------------------------------------------------------------------

/// Errors from `git` CLI operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// The `git` binary was not found on `$PATH`.
    #[error("git binary not found: {0}")]
    BinaryNotFound(String),

    /// A `git` command exited with a non-zero status.
    #[error("git command failed (exit {exit_code}): {stderr}")]
    CommandFailed { exit_code: i32, stderr: String },

    /// Push was rejected and the caller had no fallback for it.
    #[error("git push to '{remote_ref}' rejected (exit {exit_code})")]
    PushRejected { remote_ref: String, exit_code: i32 },

    /// Generic I/O wrapper.
    #[error("git I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// GitHub errors
// ---------------------------------------------------------------------------

/// Errors from the GitHub REST API.
#[derive(Debug, Error)]
pub enum GitHubError {
    /// The token was rejected (HTTP 401/403).
    #[error("github authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Rate limited (HTTP 429).
    #[error("github rate limited, resets at {reset_at}")]
    RateLimited { reset_at: String },

    /// Any other non-success response.
    #[error("github API error (HTTP {status}): {body}")]
    ApiError { status: u16, body: String },

    /// Transport-level failure.
    #[error("github request error: {0}")]
    RequestError(#[from] reqwest::Error),
}

// ---------------------------------------------------------------------------
// Context errors
// ---------------------------------------------------------------------------

/// Errors while reading the CI event context.
#[derive(Debug, Error)]
pub enum ContextError {
    /// A required environment variable is missing or empty.
    #[error("required environment variable {0} is not set")]
    MissingEnv(String),

    /// An environment variable is present but not parseable.
    #[error("environment variable {name} has invalid value '{value}'")]
    InvalidEnv { name: String, value: String },

    /// `GITHUB_REPOSITORY` is not of the form `owner/name`.
    #[error("malformed repository identifier: '{0}'")]
    MalformedRepository(String),

    /// The event payload file could not be read.
    #[error("failed to read event payload at {path}: {source}")]
    PayloadRead {
        path: String,
        source: std::io::Error,
    },

    /// The event payload file is not valid JSON.
    #[error("failed to parse event payload: {0}")]
    PayloadParse(#[from] serde_json::Error),

    /// A pull-request event arrived without a `pull_request` object.
    #[error("event payload has no pull_request object")]
    MissingPullRequest,
}
