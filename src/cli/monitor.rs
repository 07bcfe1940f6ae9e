use crate::cli::RunError;
use crate::github::GithubClient;
use crate::monitor::Monitor;
use crate::teamcity::TeamCityClient;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct MonitorOptions {
    pub url: String,
    pub token: String,
    pub folder: PathBuf,
    /// Time between two samplings.
    pub period: Duration,
    /// Optional overall monitoring duration; `None` runs until Ctrl-C.
    pub duration: Option<Duration>,
    pub github_token: String,
    /// `owner/name` slug of the repository the PR refs belong to.
    pub repo: String,
}

/// Runs the monitoring loop until Ctrl-C or the optional deadline fires.
pub async fn run(options: MonitorOptions) -> Result<(), RunError> {
    std::fs::create_dir_all(&options.folder)?;
    let server = Arc::new(TeamCityClient::new(&options.url, &options.token)?);
    let lookup = Arc::new(GithubClient::new(&options.repo, &options.github_token)?);
    let monitor = Monitor::new(server, lookup, options.folder, options.period);

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    let deadline = options.duration;
    tokio::spawn(async move {
        match deadline {
            Some(limit) => {
                tokio::select! {
                    _ = signal::ctrl_c() => info!("shutdown signal received"),
                    _ = tokio::time::sleep(limit) => info!("monitoring duration elapsed"),
                }
            }
            None => {
                let _ = signal::ctrl_c().await;
                info!("shutdown signal received");
            }
        }
        trigger.cancel();
    });

    monitor.run(shutdown).await?;
    Ok(())
}
