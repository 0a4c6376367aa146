//! CI event context.
//!
//! Everything the run needs to know about the triggering event is read once
//! at startup from the `GITHUB_*` environment variables and the JSON event
//! payload file, then treated as immutable. Pull-request events are
//! discriminated here, at entry, so the rest of the pipeline can match on a
//! typed variant instead of probing payload fields.

use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::errors::ContextError;

/// Default GitHub REST endpoint, overridden by `GITHUB_API_URL` on
/// enterprise installs.
const DEFAULT_API_URL: &str = "https://api.github.com";

// ---------------------------------------------------------------------------
// Context types
// ---------------------------------------------------------------------------

/// Repository identity (`owner/name`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoId {
    pub owner: String,
    pub name: String,
}

impl std::fmt::Display for RepoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// The action recorded on a pull-request event payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullRequestAction {
    Opened,
    Synchronize,
    Other(String),
}

impl PullRequestAction {
    fn from_payload(action: Option<&str>) -> Self {
        match action {
            Some("opened") => Self::Opened,
            Some("synchronize") => Self::Synchronize,
            Some(other) => Self::Other(other.to_string()),
            None => Self::Other(String::new()),
        }
    }

    /// True for the actions where a successful push must still fail the run
    /// so that checks re-run against the new commit.
    pub fn requires_recheck(&self) -> bool {
        matches!(self, Self::Opened | Self::Synchronize)
    }
}

/// The pull request behind a pull-request event.
///
/// `head_sha` is the true tip of the contributor's branch; it differs from
/// the checked-out commit when CI checked out the synthetic merge ref.
#[derive(Debug, Clone)]
pub struct PullRequestDescriptor {
    pub head_ref: String,
    pub head_sha: String,
    pub base_ref: String,
    pub action: PullRequestAction,
}

/// Immutable per-run event context.
#[derive(Debug, Clone)]
pub struct EventContext {
    pub repo: RepoId,
    pub actor: String,
    pub event_name: String,
    /// The triggering ref (`refs/heads/...` or a PR merge ref).
    pub ref_name: String,
    /// The triggering commit SHA (`GITHUB_SHA`).
    pub sha: String,
    pub run_id: u64,
    pub run_number: u64,
    pub server_url: String,
    pub api_url: String,
    pub workflow: String,
    pub job: String,
    /// Present only for pull-request events.
    pub pull_request: Option<PullRequestDescriptor>,
}

impl EventContext {
    /// Read the context from the CI environment.
    pub fn from_env() -> Result<Self, ContextError> {
        let repo = parse_repo(&require_env("GITHUB_REPOSITORY")?)?;
        let event_name = require_env("GITHUB_EVENT_NAME")?;
        let payload_path = require_env("GITHUB_EVENT_PATH")?;
        let payload = read_payload(Path::new(&payload_path))?;

        let action = PullRequestAction::from_payload(payload.action.as_deref());
        let pull_request = payload.pull_request.map(|pr| PullRequestDescriptor {
            head_ref: pr.head.ref_name,
            head_sha: pr.head.sha,
            base_ref: pr.base.ref_name,
            action,
        });
        if event_name == "pull_request" && pull_request.is_none() {
            return Err(ContextError::MissingPullRequest);
        }

        let context = Self {
            repo,
            actor: require_env("GITHUB_ACTOR")?,
            event_name,
            ref_name: require_env("GITHUB_REF")?,
            sha: require_env("GITHUB_SHA")?,
            run_id: require_u64_env("GITHUB_RUN_ID")?,
            run_number: require_u64_env("GITHUB_RUN_NUMBER")?,
            server_url: require_env("GITHUB_SERVER_URL")?,
            api_url: std::env::var("GITHUB_API_URL")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            workflow: require_env("GITHUB_WORKFLOW")?,
            job: require_env("GITHUB_JOB")?,
            pull_request,
        };
        debug!(
            repo = %context.repo,
            event = %context.event_name,
            sha = %context.sha,
            pull_request = context.pull_request.is_some(),
            "loaded event context"
        );
        Ok(context)
    }

    /// The URL of this CI run, used in commit footers and PR bodies.
    pub fn run_url(&self) -> String {
        format!(
            "{}/{}/actions/runs/{}",
            self.server_url, self.repo, self.run_id
        )
    }

    /// The branch name behind the triggering ref.
    pub fn branch_name(&self) -> &str {
        self.ref_name
            .strip_prefix("refs/heads/")
            .unwrap_or(&self.ref_name)
    }
}

// ---------------------------------------------------------------------------
// Payload parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct EventPayload {
    action: Option<String>,
    pull_request: Option<PullRequestPayload>,
}

#[derive(Debug, Deserialize)]
struct PullRequestPayload {
    head: HeadRefPayload,
    base: BaseRefPayload,
}

#[derive(Debug, Deserialize)]
struct HeadRefPayload {
    #[serde(rename = "ref")]
    ref_name: String,
    sha: String,
}

#[derive(Debug, Deserialize)]
struct BaseRefPayload {
    #[serde(rename = "ref")]
    ref_name: String,
}

fn read_payload(path: &Path) -> Result<EventPayload, ContextError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ContextError::PayloadRead {
        path: path.display().to_string(),
        source,
    })?;
    Ok(serde_json::from_str(&raw)?)
}

fn parse_repo(value: &str) -> Result<RepoId, ContextError> {
    match value.split_once('/') {
        Some((owner, name)) if !owner.is_empty() && !name.is_empty() => Ok(RepoId {
            owner: owner.to_string(),
            name: name.to_string(),
        }),
        _ => Err(ContextError::MalformedRepository(value.to_string())),
    }
}

fn require_env(name: &str) -> Result<String, ContextError> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(ContextError::MissingEnv(name.to_string())),
    }
}

fn require_u64_env(name: &str) -> Result<u64, ContextError> {
    let value = require_env(name)?;
    value.parse().map_err(|_| ContextError::InvalidEnv {
        name: name.to_string(),
        value,
    })
}
