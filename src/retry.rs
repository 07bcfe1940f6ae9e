use backoff::ExponentialBackoffBuilder;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Bounds for the exponential backoff applied to transient fetch failures.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_elapsed_time: Duration,
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_elapsed_time: Duration::from_secs(120),
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

/// HTTP statuses worth retrying: timeouts, throttling and server-side
/// failures. Client-side errors (auth, not-found, bad request) never are.
pub fn is_transient_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
}

/// Runs a fallible network operation with exponential backoff.
///
/// Errors the predicate classifies as transient are retried until
/// `max_elapsed_time` is exhausted; anything else fails immediately. The
/// caller sees a single `Result` either way.
pub async fn with_retries<F, Fut, T, E, P>(
    config: &RetryConfig,
    is_transient: P,
    operation: F,
) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let backoff = ExponentialBackoffBuilder::new()
        .with_initial_interval(config.initial_interval)
        .with_max_interval(config.max_interval)
        .with_multiplier(config.multiplier)
        .with_max_elapsed_time(Some(config.max_elapsed_time))
        .build();

    backoff::future::retry(backoff, || async {
        match operation().await {
            Ok(value) => Ok(value),
            Err(error) => {
                if is_transient(&error) {
                    warn!(error = %error, "transient fetch failure, retrying");
                    Err(backoff::Error::Transient {
                        err: error,
                        retry_after: None,
                    })
                } else {
                    Err(backoff::Error::Permanent(error))
                }
            }
        }
    })
    .await
}
