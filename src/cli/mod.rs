pub mod branches;
pub mod monitor;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("build server error: {0}")]
    Client(#[from] crate::teamcity::ClientError),

    #[error("github error: {0}")]
    Github(#[from] crate::github::GithubError),

    #[error("monitor error: {0}")]
    Monitor(#[from] crate::monitor::MonitorError),

    #[error("output error: {0}")]
    Sink(#[from] crate::output::SinkError),

    #[error("CSV read error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
