//! Git operations for gencommit.

pub mod client;
pub mod github;
pub mod parse;

pub use client::GitClient;
pub use github::GitHubClient;
