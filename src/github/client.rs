use crate::github::types::PullRequest;
use crate::retry::{is_transient_status, with_retries, RetryConfig};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;

const GITHUB_API_URL: &str = "https://api.github.com";
const USER_AGENT: &str = concat!("tcmon/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum GithubError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("GitHub returned error status {status}: {message}")]
    Api { status: u16, message: String },
}

pub type Result<T> = std::result::Result<T, GithubError>;

/// The pull-request capability the branch correlator needs.
#[async_trait]
pub trait PullRequestLookup: Send + Sync {
    /// Fetches one pull request by number. An absent PR (deleted ref, never
    /// opened) is `Ok(None)`, not an error.
    async fn pull_request(&self, number: u64) -> Result<Option<PullRequest>>;
}

/// HTTP client for the GitHub REST API, scoped to one repository.
pub struct GithubClient {
    repo: String,
    token: String,
    client: reqwest::Client,
    retry: RetryConfig,
}

impl GithubClient {
    /// `repo` is the `owner/name` slug of the repository the PR refs belong to.
    pub fn new(repo: &str, token: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            repo: repo.to_string(),
            token: token.to_string(),
            client,
            retry: RetryConfig::default(),
        })
    }

    async fn get_pull_request(&self, number: u64) -> Result<Option<PullRequest>> {
        let url = format!("{}/repos/{}/pulls/{}", GITHUB_API_URL, self.repo, number);
        let response = self
            .client
            .get(&url)
            .header(reqwest::header::AUTHORIZATION, format!("token {}", self.token))
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !response.status().is_success() {
            return Err(GithubError::Api {
                status: response.status().as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let pull_request = response.json().await?;
        Ok(Some(pull_request))
    }
}

fn is_transient(error: &GithubError) -> bool {
    match error {
        GithubError::Http(e) => e.is_timeout() || e.is_connect(),
        GithubError::Api { status, .. } => is_transient_status(*status),
    }
}

#[async_trait]
impl PullRequestLookup for GithubClient {
    async fn pull_request(&self, number: u64) -> Result<Option<PullRequest>> {
        with_retries(&self.retry, is_transient, || self.get_pull_request(number)).await
    }
}
