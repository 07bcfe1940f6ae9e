use crate::retry::{is_transient_status, with_retries, RetryConfig};
use crate::teamcity::types::{Agent, Agents, Build, QueuedBuilds};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("TeamCity returned error status {status}: {message}")]
    Api { status: u16, message: String },
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// The build-server capability the monitoring core needs.
#[async_trait]
pub trait BuildServerClient: Send + Sync {
    /// Lists the builds currently waiting in the queue.
    async fn queued_builds(&self) -> Result<QueuedBuilds>;

    /// Fetches the full detail of one build by id.
    async fn build(&self, id: i64) -> Result<Build>;

    /// Lists the agent pool, including disabled and unauthorized agents.
    async fn agents(&self) -> Result<Vec<Agent>>;
}

/// HTTP client for the TeamCity REST API.
pub struct TeamCityClient {
    base_url: String,
    token: String,
    client: reqwest::Client,
    retry: RetryConfig,
}

impl TeamCityClient {
    pub fn new(base_url: &str, token: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            client,
            retry: RetryConfig::default(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ClientError::Api {
                status: response.status().as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let payload = response.json().await?;
        Ok(payload)
    }

    async fn get_json_with_retries<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        with_retries(&self.retry, is_transient, || self.get_json::<T>(path)).await
    }
}

fn is_transient(error: &ClientError) -> bool {
    match error {
        ClientError::Http(e) => e.is_timeout() || e.is_connect(),
        ClientError::Api { status, .. } => is_transient_status(*status),
    }
}

#[async_trait]
impl BuildServerClient for TeamCityClient {
    async fn queued_builds(&self) -> Result<QueuedBuilds> {
        self.get_json_with_retries(
            "/app/rest/buildQueue?fields=count,build(id,buildTypeId,branchName)",
        )
        .await
    }

    async fn build(&self, id: i64) -> Result<Build> {
        let path = format!(
            "/app/rest/builds/id:{}?fields=id,buildTypeId,branchName,status,state,\
             queuedDate,startDate,finishDate,agent(name),triggered(type,date,user(username))",
            id
        );
        self.get_json_with_retries(&path).await
    }

    async fn agents(&self) -> Result<Vec<Agent>> {
        // defaultFilter:false so disabled and unauthorized agents are counted too
        let listing: Agents = self
            .get_json_with_retries(
                "/app/rest/agents?locator=defaultFilter:false\
                 &fields=count,agent(name,enabled,authorized,build(id))",
            )
            .await?;
        Ok(listing.agents)
    }
}
