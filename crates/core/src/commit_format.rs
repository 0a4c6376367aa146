//! Commit, branch and pull-request message assembly.
//!
//! Every commit written by this automation carries the
//! [`GENERATED_BY_TRAILER`] marker; the loop guard keys on the same string.

/// Machine-readable trailer appended to every automation commit.
pub const GENERATED_BY_TRAILER: &str = "Generated-by: gencommit";

/// The message lines for a generated-change commit, passed to git as
/// separate `-m` paragraphs: title, footer, trailer.
pub fn commit_message_lines(title: &str, footer: &str) -> Vec<String> {
    vec![
        title.to_string(),
        footer.to_string(),
        GENERATED_BY_TRAILER.to_string(),
    ]
}

/// True if a commit message was produced by this automation.
pub fn is_automation_message(message: &str) -> bool {
    message.contains(GENERATED_BY_TRAILER)
}

/// Deterministic name of the follow-up branch for a triggering SHA and run
/// number. Collisions across runs are impossible by construction.
pub fn follow_up_branch(sha: &str, run_number: u64) -> String {
    format!("gencommit-{}-{}", sha, run_number)
}

/// Message for the fallback re-merge commit.
///
/// Records that the merge was recreated by automation, which branches and
/// commits it joins, and which run produced it.
pub fn remerge_message(
    base_ref: &str,
    base_sha: &str,
    head_ref: &str,
    head_sha: &str,
    merge_sha: &str,
    run_url: &str,
) -> String {
    format!(
        "Merge branch {base_ref} {base_sha} into {head_ref} {head_sha}\n\n\
         Recreated the CI merge commit {merge_sha} to keep the pull request diff clean.\n\n\
         {run_url}\n{GENERATED_BY_TRAILER}"
    )
}

/// Title of the follow-up pull request body greeting plus the caller's body
/// text and the commit message provenance.
pub fn pull_request_body(actor: &str, body: &str, commit_title: &str, footer: &str) -> String {
    format!("Hi @{actor},\n\n{body}\n\n----\n\n{commit_title}\n{footer}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_message_carries_trailer() {
        let lines = commit_message_lines("Update generated files", "https://ci.example/runs/1");
        assert_eq!(lines.len(), 3);
        assert!(is_automation_message(&lines.join("\n\n")));
    }

    #[test]
    fn test_is_automation_message() {
        assert!(is_automation_message(
            "Update generated files\n\nGenerated-by: gencommit"
        ));
        assert!(!is_automation_message("Fix typo"));
    }

    #[test]
    fn test_follow_up_branch_is_deterministic() {
        assert_eq!(
            follow_up_branch("0123456789abcdef", 321),
            "gencommit-0123456789abcdef-321"
        );
    }

    #[test]
    fn test_remerge_message_names_both_branches() {
        let message = remerge_message(
            "main",
            "b1",
            "topic",
            "h1",
            "m1",
            "https://ci.example/runs/9",
        );
        assert!(message.contains("main"));
        assert!(message.contains("topic"));
        assert!(message.contains(GENERATED_BY_TRAILER));
        assert!(message.contains("m1"));
    }

    #[test]
    fn test_pull_request_body_contains_inputs() {
        let body = pull_request_body(
            "octocat",
            "This pull request fixes the generated files.",
            "Update generated files",
            "https://ci.example/runs/9",
        );
        assert!(body.starts_with("Hi @octocat,"));
        assert!(body.contains("This pull request fixes the generated files."));
        assert!(body.contains("Update generated files"));
        assert!(body.contains("https://ci.example/runs/9"));
    }
}
