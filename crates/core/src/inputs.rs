//! Run inputs.
//!
//! The hosting CI passes step inputs as environment variables; the CLI crate
//! maps them (and their flag equivalents) into this struct. Core code only
//! ever sees the resolved values.

use crate::errors::ContextError;

/// Fixed automation identity used when no committer is configured.
pub const AUTOMATION_NAME: &str = "gencommit";
pub const AUTOMATION_EMAIL: &str = "41898282+github-actions[bot]@users.noreply.github.com";

/// Resolved inputs for one run.
#[derive(Debug, Clone)]
pub struct Inputs {
    /// Committer identity for every commit this run creates.
    pub committer_name: String,
    pub committer_email: String,
    /// Commit title line.
    pub message: String,
    /// Commit footer; defaults to the run URL when absent.
    pub message_footer: Option<String>,
    /// Follow-up pull-request title.
    pub title: String,
    /// Follow-up pull-request body.
    pub body: String,
    /// Create the follow-up pull request as a draft.
    pub draft: bool,
    /// Reviewer entries; `org/team` entries are routed to team review.
    pub reviewers: Vec<String>,
    /// Labels to add to the follow-up pull request.
    pub labels: Vec<String>,
    /// API and push credential. Secret; never logged.
    pub token: String,
    /// Simulate push and PR-creation side effects.
    pub dry_run: bool,
}

impl Inputs {
    /// Reject inputs that cannot possibly work before any side effect runs.
    pub fn validate(&self) -> Result<(), ContextError> {
        if self.token.is_empty() {
            return Err(ContextError::MissingEnv("INPUT_TOKEN".to_string()));
        }
        if self.committer_name.is_empty() || self.committer_email.is_empty() {
            return Err(ContextError::InvalidEnv {
                name: "INPUT_COMMITTER_NAME".to_string(),
                value: self.committer_name.clone(),
            });
        }
        Ok(())
    }

    /// Split reviewer entries into individual users and team slugs.
    ///
    /// An entry containing `/` is an `org/team` reference; only the slug part
    /// is sent to the team-reviewer endpoint.
    pub fn split_reviewers(&self) -> (Vec<String>, Vec<String>) {
        let mut users = Vec::new();
        let mut teams = Vec::new();
        for entry in &self.reviewers {
            match entry.split_once('/') {
                Some((_, slug)) if !slug.is_empty() => teams.push(slug.to_string()),
                _ => users.push(entry.clone()),
            }
        }
        (users, teams)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Inputs {
        Inputs {
            committer_name: AUTOMATION_NAME.to_string(),
            committer_email: AUTOMATION_EMAIL.to_string(),
            message: "Update generated files".to_string(),
            message_footer: None,
            title: "Follow up the generated files".to_string(),
            body: "This pull request fixes the generated files.".to_string(),
            draft: false,
            reviewers: vec!["alice".to_string(), "org/bots".to_string()],
            labels: vec![],
            token: "token".to_string(),
            dry_run: false,
        }
    }

    #[test]
    fn test_split_reviewers() {
        let (users, teams) = sample().split_reviewers();
        assert_eq!(users, vec!["alice"]);
        assert_eq!(teams, vec!["bots"]);
    }

    #[test]
    fn test_validate_requires_token() {
        let mut inputs = sample();
        inputs.token.clear();
        assert!(inputs.validate().is_err());
        assert!(sample().validate().is_ok());
    }
}
