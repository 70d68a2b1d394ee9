//! Retry logic with exponential backoff
//!
//! Wraps an async operation with bounded retry and geometrically increasing
//! delay. Only errors classified as transient via [`IsRetryable`] are retried;
//! everything else propagates on first occurrence.
//!
//! # Example
//!
//! ```no_run
//! use http_dl::retry::{IsRetryable, with_backoff};
//! use http_dl::config::RetryConfig;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Transient,
//!     Permanent,
//! }
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{self:?}")
//!     }
//! }
//!
//! impl IsRetryable for MyError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, MyError::Transient)
//!     }
//! }
//!
//! # async fn example() -> Result<(), MyError> {
//! let config = RetryConfig::default();
//! let result = with_backoff(&config, || async {
//!     // Your operation here
//!     Ok::<_, MyError>(())
//! }).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::Error;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (network transport errors, timeouts, HTTP error
/// statuses) should return `true`. Permanent failures (storage rename errors,
/// database errors, invalid configuration) should return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

/// Implementation of IsRetryable for our Error type
impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            // Transport-level failures are the canonical transient class
            Error::Network(_) => true,
            // Per-read socket timeouts are transient
            Error::ReadTimeout { .. } => true,
            // Any non-success status is treated as transient so that backoff
            // gets a chance to ride out 429/5xx windows; the task attempt
            // budget bounds the damage for genuinely dead URLs
            Error::HttpStatus { .. } => true,
            // Connection-class I/O errors are transient
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::NotConnected
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::Interrupted
            ),
            // A short body is a failed attempt, not a transport blip; the
            // resume logic picks it up on the next batch run instead
            Error::Incomplete { .. } => false,
            // Filesystem rename/permission problems need operator action
            Error::Storage(_) => false,
            // Database errors are likely permanent
            Error::Database(_) => false,
            // Config errors are permanent
            Error::Config { .. } => false,
        }
    }
}

/// Execute an async operation with exponential backoff retry logic
///
/// Invokes `operation` up to `config.max_tries` times in total. After a
/// retryable failure the call sleeps for the current delay, multiplies it by
/// `config.backoff_multiplier`, and tries again; the delay sequence is
/// strictly geometric (`D, D·B, D·B², …`) unless `config.max_delay` caps it.
/// The final invocation's result is returned as-is, and non-retryable errors
/// propagate immediately without consuming a retry.
///
/// The policy is stateless across invocations: every call starts from
/// `config.initial_delay` with a fresh try counter.
pub async fn with_backoff<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut delay = config.initial_delay;
    let max_tries = config.max_tries.max(1);

    for attempt in 1..max_tries {
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(attempts = attempt, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() => {
                tracing::warn!(
                    error = %e,
                    attempt = attempt,
                    max_tries = max_tries,
                    delay_ms = delay.as_millis(),
                    "Operation failed, retrying"
                );

                let sleep_for = if config.jitter { add_jitter(delay) } else { delay };
                tokio::time::sleep(sleep_for).await;

                let next_delay = Duration::from_secs_f64(
                    delay.as_secs_f64() * config.backoff_multiplier,
                );
                delay = match config.max_delay {
                    Some(cap) => next_delay.min(cap),
                    None => next_delay,
                };
            }
            Err(e) => {
                tracing::error!(error = %e, "Operation failed with non-retryable error");
                return Err(e);
            }
        }
    }

    // Final try: propagate whatever it returns
    let result = operation().await;
    if let Err(e) = &result {
        if e.is_retryable() {
            tracing::error!(
                error = %e,
                attempts = max_tries,
                "Operation failed after all retry attempts exhausted"
            );
        }
    }
    result
}

/// Add random jitter to a delay to prevent thundering herd
///
/// Jitter is uniformly distributed between 0% and 100% of the delay, so the
/// actual delay lies between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor))
}
