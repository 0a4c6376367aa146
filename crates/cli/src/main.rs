//! gencommit command-line entry point.
//!
//! Runs once per CI job, after the generation step. Reads step inputs from
//! flags or the `INPUT_*` environment variables the CI runner exports, reads
//! the event context from the `GITHUB_*` environment, then hands off to the
//! follow-up engine. A deliberate policy failure exits non-zero like any
//! other failure, but only after reporting the ref or pull request the run
//! successfully produced.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context as _, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use gencommit_core::context::EventContext;
use gencommit_core::engine::FollowUpEngine;
use gencommit_core::errors::RunError;
use gencommit_core::git::{GitClient, GitHubClient};
use gencommit_core::inputs::{Inputs, AUTOMATION_EMAIL, AUTOMATION_NAME};
use gencommit_core::models::RunOutcome;

/// Commit generated files back to the triggering branch.
#[derive(Parser, Debug)]
#[command(name = "gencommit", version, about)]
struct Cli {
    /// Path to the checked-out working copy.
    #[arg(long, default_value = ".")]
    repo_path: PathBuf,

    /// Committer name for commits created by this run.
    #[arg(long, env = "INPUT_COMMITTER_NAME", default_value = AUTOMATION_NAME)]
    committer_name: String,

    /// Committer email for commits created by this run.
    #[arg(long, env = "INPUT_COMMITTER_EMAIL", default_value = AUTOMATION_EMAIL)]
    committer_email: String,

    /// Commit title line.
    #[arg(long, env = "INPUT_MESSAGE", default_value = "Update generated files")]
    message: String,

    /// Commit footer; defaults to the URL of this run.
    #[arg(long, env = "INPUT_MESSAGE_FOOTER")]
    message_footer: Option<String>,

    /// Title of the follow-up pull request.
    #[arg(
        long,
        env = "INPUT_TITLE",
        default_value = "Follow up the generated files"
    )]
    title: String,

    /// Body of the follow-up pull request.
    #[arg(
        long,
        env = "INPUT_BODY",
        default_value = "This pull request fixes the difference between the source and the generated files."
    )]
    body: String,

    /// Create the follow-up pull request as a draft.
    #[arg(long, env = "INPUT_DRAFT")]
    draft: bool,

    /// Reviewers for the follow-up pull request: users or `org/team`
    /// entries, comma separated.
    #[arg(long, env = "INPUT_REVIEWERS", value_delimiter = ',')]
    reviewers: Vec<String>,

    /// Labels for the follow-up pull request, comma separated.
    #[arg(long, env = "INPUT_LABELS", value_delimiter = ',')]
    labels: Vec<String>,

    /// API and push token. Secret.
    #[arg(long, env = "INPUT_TOKEN", hide_env_values = true)]
    token: String,

    /// Simulate push and pull-request side effects without changing the
    /// remote.
    #[arg(long, env = "INPUT_DRY_RUN")]
    dry_run: bool,
}

impl Cli {
    fn into_parts(self) -> (PathBuf, Inputs) {
        let inputs = Inputs {
            committer_name: self.committer_name,
            committer_email: self.committer_email,
            message: self.message,
            message_footer: self.message_footer,
            title: self.title,
            body: self.body,
            draft: self.draft,
            reviewers: self.reviewers,
            labels: self.labels,
            token: self.token,
            dry_run: self.dry_run,
        };
        (self.repo_path, inputs)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let engine = match build_engine(cli) {
        Ok(engine) => engine,
        Err(error) => {
            error!("{:#}", error);
            return ExitCode::FAILURE;
        }
    };

    match engine.run().await {
        Ok(outcome) => {
            report(&outcome);
            ExitCode::SUCCESS
        }
        Err(RunError::Policy { message, outcome }) => {
            // Not a defect: the run produced its outcome and is failed on
            // purpose (stale checks or a follow-up PR awaiting a human).
            report(&outcome);
            error!("{}", message);
            ExitCode::FAILURE
        }
        Err(error) => {
            error!(error = %error, "run failed");
            ExitCode::FAILURE
        }
    }
}

fn build_engine(cli: Cli) -> Result<FollowUpEngine> {
    let context = EventContext::from_env().context("failed to read CI event context")?;
    let (repo_path, inputs) = cli.into_parts();
    inputs.validate().context("invalid inputs")?;

    let git = GitClient::new(
        &repo_path,
        &inputs.committer_name,
        &inputs.committer_email,
    )
    .with_credentials(&context.server_url, &inputs.token);
    let github = GitHubClient::new(&context.api_url, &inputs.token);

    Ok(FollowUpEngine::new(git, github, inputs, context))
}

fn report(outcome: &RunOutcome) {
    if outcome.is_noop() {
        info!("no remote state was changed");
        return;
    }
    if let Some(ref_name) = &outcome.updated_ref {
        info!(ref_name = %ref_name, "updated ref");
    }
    if let Some(pull) = &outcome.pull_request {
        info!(number = pull.number, url = %pull.url, "created follow-up pull request");
    }
}
