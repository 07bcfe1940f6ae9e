pub mod client;
pub mod types;

pub use client::{GithubClient, GithubError, PullRequestLookup};
pub use types::PullRequest;
