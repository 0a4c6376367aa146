//! Parsers for raw `git` plumbing output.

use regex_lite::Regex;

/// Extract the parent SHAs from `git cat-file commit` output.
///
/// Only the commit header (everything before the first blank line) is
/// scanned, so a message body line starting with `parent ` cannot leak in.
/// Multi-line header values such as `gpgsig` use indented continuation
/// lines, which the line-anchored match skips.
pub fn parse_commit_parents(raw: &str) -> Vec<String> {
    let header = raw.split("\n\n").next().unwrap_or(raw);
    let re = Regex::new(r"(?m)^parent ([0-9a-f]+)").expect("static parent regex");
    re.captures_iter(header)
        .map(|captures| captures[1].to_string())
        .collect()
}
