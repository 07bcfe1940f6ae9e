pub mod branches;
pub mod sampler;
pub mod tracker;

pub use tracker::BuildTracker;

use crate::github::client::{GithubError, PullRequestLookup};
use crate::output::sink::{DayOutputs, SinkError};
use crate::teamcity::client::{BuildServerClient, ClientError};
use crate::teamcity::timestamp::TimestampError;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("build server error: {0}")]
    Client(#[from] ClientError),

    #[error("pull request lookup error: {0}")]
    Github(#[from] GithubError),

    #[error("timestamp error: {0}")]
    Timestamp(#[from] TimestampError),

    #[error("output error: {0}")]
    Sink(#[from] SinkError),
}

/// The poll scheduler and rotation controller.
///
/// Owns the per-day tracking state and the four output streams for the
/// lifetime of one `run` call. The loop is strictly sequential at iteration
/// granularity; within an iteration the queue fetch, the agent fetch and the
/// period timer run concurrently and are joined before the next tick, so the
/// tracking sets only ever mutate from one place.
pub struct Monitor {
    server: Arc<dyn BuildServerClient>,
    lookup: Arc<dyn PullRequestLookup>,
    folder: PathBuf,
    period: Duration,
}

impl Monitor {
    pub fn new(
        server: Arc<dyn BuildServerClient>,
        lookup: Arc<dyn PullRequestLookup>,
        folder: PathBuf,
        period: Duration,
    ) -> Self {
        Self {
            server,
            lookup,
            folder,
            period,
        }
    }

    /// Runs the monitoring loop until the token is cancelled.
    ///
    /// Cancellation drains cleanly: one final forced resolution records every
    /// still-pending build (finish fields left unset), the remaining branches
    /// are correlated, and all four streams are flushed and closed before
    /// returning. A fatal error closes the streams and propagates instead.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<(), MonitorError> {
        info!(
            folder = %self.folder.display(),
            period_secs = self.period.as_secs(),
            "beginning of monitoring"
        );

        let day = Utc::now().date_naive();
        let mut outputs = DayOutputs::open(&self.folder, day)?;
        let mut tracker = BuildTracker::new();

        let result = match self.poll_loop(&shutdown, &mut tracker, &mut outputs).await {
            Ok(()) => {
                drain(
                    self.server.as_ref(),
                    self.lookup.as_ref(),
                    &mut tracker,
                    &mut outputs,
                )
                .await
            }
            Err(error) => Err(error),
        };

        match result {
            Ok(()) => {
                info!("end of monitoring");
                Ok(())
            }
            Err(error) => {
                // A failed loop or drain may still hold open sinks
                if let Err(close_error) = outputs.close() {
                    warn!(error = %close_error, "failed to close outputs after fatal error");
                }
                Err(error)
            }
        }
    }

    async fn poll_loop(
        &self,
        shutdown: &CancellationToken,
        tracker: &mut BuildTracker,
        outputs: &mut DayOutputs,
    ) -> Result<(), MonitorError> {
        loop {
            let now = Utc::now();
            if now.date_naive() != outputs.day {
                rotate_day(
                    self.server.as_ref(),
                    self.lookup.as_ref(),
                    tracker,
                    outputs,
                    &self.folder,
                    now,
                )
                .await?;
            }

            let tick = tokio::time::sleep(self.period);
            tokio::pin!(tick);

            let iteration = async {
                sampler::sample(self.server.as_ref(), tracker, outputs, now).await?;
                tracker
                    .resolve(self.server.as_ref(), &mut outputs.builds, false)
                    .await?;
                Ok::<(), MonitorError>(())
            };

            tokio::select! {
                _ = shutdown.cancelled() => return Ok(()),
                result = iteration => result?,
            }

            tokio::select! {
                _ = shutdown.cancelled() => return Ok(()),
                _ = &mut tick => {}
            }
        }
    }
}

/// Closes the outgoing day partition and opens the next one.
///
/// Pending builds are force-resolved into the outgoing detail stream first,
/// then the outgoing branch set is correlated, so no row ever straddles a
/// partition. All per-day tracking state starts empty for the new day.
pub async fn rotate_day(
    server: &dyn BuildServerClient,
    lookup: &dyn PullRequestLookup,
    tracker: &mut BuildTracker,
    outputs: &mut DayOutputs,
    folder: &Path,
    now: DateTime<Utc>,
) -> Result<(), MonitorError> {
    let next_day = now.date_naive();
    info!(from = %outputs.day, to = %next_day, "day boundary crossed, rotating outputs");

    tracker.resolve(server, &mut outputs.builds, true).await?;
    let outgoing = tracker.take_branches();
    branches::collect(lookup, &mut outputs.branches, &outgoing, now).await?;
    outputs.close()?;
    tracker.reset();
    *outputs = DayOutputs::open(folder, next_day)?;
    Ok(())
}

/// The shutdown sequence: one forced resolution, one last branch
/// correlation, then flush and close every stream.
pub async fn drain(
    server: &dyn BuildServerClient,
    lookup: &dyn PullRequestLookup,
    tracker: &mut BuildTracker,
    outputs: &mut DayOutputs,
) -> Result<(), MonitorError> {
    info!("shutdown: forced resolution of remaining pending builds");
    tracker.resolve(server, &mut outputs.builds, true).await?;
    let remaining = tracker.take_branches();
    branches::collect(lookup, &mut outputs.branches, &remaining, Utc::now()).await?;
    outputs.close()?;
    Ok(())
}
