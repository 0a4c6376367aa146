//! GitHub REST API client.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::context::RepoId;
use crate::errors::GitHubError;

/// A pull request as returned by the GitHub API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub html_url: String,
}

/// Asynchronous GitHub REST API client.
#[derive(Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    api_url: String,
    token: String,
}

impl GitHubClient {
    pub fn new(api_url: impl Into<String>, token: impl Into<String>) -> Self {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        let token = token.into();
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static("gencommit/0.1"));
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .expect("failed to build reqwest client");
        info!(api_url = %api_url, "created GitHubClient");
        Self {
            http,
            api_url,
            token,
        }
    }

    /// Open a pull request from `head` into `base`.
    #[instrument(skip(self, body))]
    pub async fn create_pull_request(
        &self,
        repo: &RepoId,
        base: &str,
        head: &str,
        title: &str,
        body: &str,
        draft: bool,
    ) -> Result<PullRequest, GitHubError> {
        let url = format!("{}/repos/{}/pulls", self.api_url, repo);
        let payload = serde_json::json!({
            "title": title,
            "body": body,
            "head": head,
            "base": base,
            "draft": draft,
        });
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await?;
        self.check_response(&resp)?;
        let pr: PullRequest = resp.json().await?;
        info!(number = pr.number, url = %pr.html_url, "created pull request");
        Ok(pr)
    }

    /// Request reviews from individual users and/or team slugs.
    #[instrument(skip(self))]
    pub async fn request_reviewers(
        &self,
        repo: &RepoId,
        pr_number: u64,
        reviewers: &[String],
        team_reviewers: &[String],
    ) -> Result<(), GitHubError> {
        let url = format!(
            "{}/repos/{}/pulls/{}/requested_reviewers",
            self.api_url, repo, pr_number
        );
        let payload = serde_json::json!({
            "reviewers": reviewers,
            "team_reviewers": team_reviewers,
        });
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await?;
        self.check_response(&resp)?;
        debug!(pr_number, "requested reviewers");
        Ok(())
    }

    /// Add assignees to a pull request (issues endpoint).
    #[instrument(skip(self))]
    pub async fn add_assignees(
        &self,
        repo: &RepoId,
        pr_number: u64,
        assignees: &[String],
    ) -> Result<(), GitHubError> {
        let url = format!(
            "{}/repos/{}/issues/{}/assignees",
            self.api_url, repo, pr_number
        );
        let payload = serde_json::json!({ "assignees": assignees });
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await?;
        self.check_response(&resp)?;
        debug!(pr_number, "added assignees");
        Ok(())
    }

    /// Add labels to a pull request (issues endpoint).
    #[instrument(skip(self))]
    pub async fn add_labels(
        &self,
        repo: &RepoId,
        pr_number: u64,
        labels: &[String],
    ) -> Result<(), GitHubError> {
        let url = format!(
            "{}/repos/{}/issues/{}/labels",
            self.api_url, repo, pr_number
        );
        let payload = serde_json::json!({ "labels": labels });
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await?;
        self.check_response(&resp)?;
        debug!(pr_number, "added labels");
        Ok(())
    }

    fn check_response(&self, resp: &reqwest::Response) -> Result<(), GitHubError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(GitHubError::AuthenticationFailed(format!(
                "HTTP {}",
                status
            )));
        }
        if status.as_u16() == 429 {
            let reset = resp
                .headers()
                .get("x-ratelimit-reset")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("unknown")
                .to_string();
            return Err(GitHubError::RateLimited { reset_at: reset });
        }
        Err(GitHubError::ApiError {
            status: status.as_u16(),
            body: format!("HTTP {}", status),
        })
    }
}
