//! Asynchronous `git` CLI client.
//!
//! All repository access goes through the `git` binary as a subprocess; this
//! automation never interprets repository internals itself. Merge and
//! cherry-pick semantics in particular are delegated entirely to git, and
//! the client only reports their success or failure.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use super::parse::parse_commit_parents;
use crate::errors::GitError;

/// Result of a git invocation whose exit status the caller inspects.
#[derive(Debug)]
struct GitOutput {
    code: i32,
    stdout: String,
    stderr: String,
}

/// Asynchronous client for a local git working copy and its `origin` remote.
#[derive(Debug, Clone)]
pub struct GitClient {
    repo_path: PathBuf,
    committer_name: String,
    committer_email: String,
    /// Server URL and token for authenticated fetch/push. `None` for local
    /// remotes (tests).
    auth: Option<(String, String)>,
}

impl GitClient {
    /// Create a client for the working copy at `repo_path`.
    pub fn new<P: AsRef<Path>>(
        repo_path: P,
        committer_name: impl Into<String>,
        committer_email: impl Into<String>,
    ) -> Self {
        let client = Self {
            repo_path: repo_path.as_ref().to_path_buf(),
            committer_name: committer_name.into(),
            committer_email: committer_email.into(),
            auth: None,
        };
        info!(path = %client.repo_path.display(), "created GitClient");
        client
    }

    /// Attach a push/fetch credential for the given server URL.
    ///
    /// The token is injected per invocation as an `http.<server>/.extraheader`
    /// config pair (reset, then set), replacing whatever stale header the CI
    /// checkout step left in the local config.
    pub fn with_credentials(
        mut self,
        server_url: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        self.auth = Some((
            server_url.into().trim_end_matches('/').to_string(),
            token.into(),
        ));
        self
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Working-tree status in porcelain format, trimmed. Empty means clean.
    #[instrument(skip(self))]
    pub async fn status(&self) -> Result<String, GitError> {
        let out = self.run(&["status", "--porcelain"]).await?;
        Ok(out.trim().to_string())
    }

    /// SHA of the current HEAD commit.
    pub async fn current_sha(&self) -> Result<String, GitError> {
        let out = self.run(&["rev-parse", "HEAD"]).await?;
        Ok(out.trim().to_string())
    }

    /// Parent SHAs of a commit, via `cat-file`.
    #[instrument(skip(self))]
    pub async fn parent_shas(&self, sha: &str) -> Result<Vec<String>, GitError> {
        let out = self.run(&["cat-file", "commit", sha]).await?;
        let parents = parse_commit_parents(&out);
        debug!(sha, count = parents.len(), "read commit parents");
        Ok(parents)
    }

    /// Full messages of the most recent commits reachable from `ref_name`,
    /// newest first, at most `max` entries.
    #[instrument(skip(self))]
    pub async fn recent_commit_messages(
        &self,
        ref_name: &str,
        max: usize,
    ) -> Result<Vec<String>, GitError> {
        let max_count = format!("--max-count={}", max);
        let out = self
            .run(&["log", "--format=%B%x1e", &max_count, ref_name])
            .await?;
        let messages: Vec<String> = out
            .split('\u{1e}')
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .collect();
        debug!(ref_name, count = messages.len(), "read commit messages");
        Ok(messages)
    }

    /// Whether git can compute a merge base for the two commits with the
    /// history fetched so far. Non-mutating.
    pub async fn can_merge(&self, base: &str, head: &str) -> Result<bool, GitError> {
        let out = self.run_unchecked(&["merge-base", base, head]).await?;
        Ok(out.code == 0)
    }

    /// Log the recent commit graph at debug level. Diagnostic only.
    pub async fn show_graph(&self) -> Result<(), GitError> {
        let out = self
            .run(&[
                "log",
                "--max-count=10",
                "--graph",
                "--decorate",
                "--pretty=oneline",
                "--color=never",
            ])
            .await?;
        debug!(graph = %out, "recent commit graph");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Fetch the given refs from origin at the given depth.
    #[instrument(skip(self))]
    pub async fn fetch(&self, refs: &[&str], depth: u32) -> Result<(), GitError> {
        let depth_arg = format!("--depth={}", depth);
        let mut args = vec!["fetch", "origin", depth_arg.as_str()];
        args.extend_from_slice(refs);
        self.run_authed(&args).await?;
        debug!(depth, "fetch completed");
        Ok(())
    }

    /// Check out a commit (detached HEAD for a bare SHA).
    #[instrument(skip(self))]
    pub async fn checkout(&self, sha: &str) -> Result<(), GitError> {
        self.run(&["checkout", sha]).await?;
        Ok(())
    }

    /// Stage the whole working tree and commit it with the configured
    /// committer identity. Each message line becomes its own paragraph.
    #[instrument(skip(self, message_lines))]
    pub async fn commit(&self, message_lines: &[String]) -> Result<(), GitError> {
        self.run(&["add", "--all"]).await?;
        let identity = self.identity_flags();
        let mut args: Vec<&str> = identity.iter().map(String::as_str).collect();
        args.extend(["commit", "--quiet"]);
        for line in message_lines {
            args.extend(["-m", line.as_str()]);
        }
        self.run(&args).await?;
        info!("created commit");
        Ok(())
    }

    /// Merge `sha` into the current HEAD with an explicit merge commit.
    #[instrument(skip(self, message))]
    pub async fn merge(&self, sha: &str, message: &str) -> Result<(), GitError> {
        let identity = self.identity_flags();
        let mut args: Vec<&str> = identity.iter().map(String::as_str).collect();
        args.extend(["merge", "--no-ff", "-m", message, sha]);
        self.run(&args).await?;
        info!(sha, "merged commit");
        Ok(())
    }

    /// Cherry-pick `sha` onto the current HEAD. Fails loudly on conflict,
    /// leaving the conflicted state in place.
    #[instrument(skip(self))]
    pub async fn cherry_pick(&self, sha: &str) -> Result<(), GitError> {
        let identity = self.identity_flags();
        let mut args: Vec<&str> = identity.iter().map(String::as_str).collect();
        args.extend(["cherry-pick", sha]);
        self.run(&args).await?;
        info!(sha, "cherry-picked commit");
        Ok(())
    }

    /// Cherry-pick `sha`, aborting and restoring a clean tree on conflict.
    ///
    /// Returns `true` when the pick applied, `false` when it conflicted and
    /// was aborted.
    #[instrument(skip(self))]
    pub async fn try_cherry_pick(&self, sha: &str) -> Result<bool, GitError> {
        let identity = self.identity_flags();
        let mut args: Vec<&str> = identity.iter().map(String::as_str).collect();
        args.extend(["cherry-pick", sha]);
        let out = self.run_unchecked(&args).await?;
        if out.code == 0 {
            info!(sha, "cherry-picked commit");
            return Ok(true);
        }
        warn!(sha, stderr = %out.stderr, "cherry-pick conflicted, aborting");
        self.run(&["cherry-pick", "--abort"]).await?;
        Ok(false)
    }

    /// Push `local_ref` to `remote_ref` on origin, returning the raw exit
    /// status. A non-zero status is a normal result (remote rejected), not
    /// an error; callers decide how to react.
    #[instrument(skip(self))]
    pub async fn push(
        &self,
        local_ref: &str,
        remote_ref: &str,
        dry_run: bool,
    ) -> Result<i32, GitError> {
        let refspec = format!("{}:{}", local_ref, remote_ref);
        let mut args = vec!["push", "origin", refspec.as_str()];
        if dry_run {
            args.push("--dry-run");
        }
        let out = self.run_authed_unchecked(&args).await?;
        if out.code == 0 {
            info!(remote_ref, dry_run, "push completed");
        } else {
            warn!(remote_ref, exit_code = out.code, stderr = %out.stderr, "push rejected");
        }
        Ok(out.code)
    }

    // -----------------------------------------------------------------------
    // Invocation plumbing
    // -----------------------------------------------------------------------

    fn identity_flags(&self) -> Vec<String> {
        vec![
            "-c".to_string(),
            format!("user.name={}", self.committer_name),
            "-c".to_string(),
            format!("user.email={}", self.committer_email),
        ]
    }

    /// Config flags injecting the credential: reset the extraheader left by
    /// the CI checkout, then set ours. Never logged.
    fn credential_flags(&self) -> Vec<String> {
        match &self.auth {
            Some((server_url, token)) => {
                let key = format!("http.{}/.extraheader", server_url);
                let credentials = STANDARD.encode(format!("x-access-token:{}", token));
                vec![
                    "-c".to_string(),
                    format!("{}=", key),
                    "-c".to_string(),
                    format!("{}=AUTHORIZATION: basic {}", key, credentials),
                ]
            }
            None => Vec::new(),
        }
    }

    async fn run(&self, args: &[&str]) -> Result<String, GitError> {
        let out = self.exec(args, &[]).await?;
        if out.code != 0 {
            return Err(GitError::CommandFailed {
                exit_code: out.code,
                stderr: out.stderr,
            });
        }
        Ok(out.stdout)
    }

    async fn run_unchecked(&self, args: &[&str]) -> Result<GitOutput, GitError> {
        self.exec(args, &[]).await
    }

    async fn run_authed(&self, args: &[&str]) -> Result<String, GitError> {
        let hidden = self.credential_flags();
        let out = self.exec(args, &hidden).await?;
        if out.code != 0 {
            return Err(GitError::CommandFailed {
                exit_code: out.code,
                stderr: out.stderr,
            });
        }
        Ok(out.stdout)
    }

    async fn run_authed_unchecked(&self, args: &[&str]) -> Result<GitOutput, GitError> {
        let hidden = self.credential_flags();
        self.exec(args, &hidden).await
    }

    /// Run `git` with `hidden` config flags prepended to `args`. Only `args`
    /// is logged; credential material stays out of the logs.
    async fn exec(&self, args: &[&str], hidden: &[String]) -> Result<GitOutput, GitError> {
        debug!(cmd = %format!("git {}", args.join(" ")), "running git command");
        let mut cmd = Command::new("git");
        cmd.current_dir(&self.repo_path)
            .args(hidden)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let output = cmd.output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                GitError::BinaryNotFound("git".into())
            } else {
                GitError::IoError(e)
            }
        })?;

        Ok(GitOutput {
            code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}
