//! Bounded-retry executor

use std::fmt::Display;
use std::future::Future;

use tracing::debug;

use super::backoff::BackoffSchedule;

/// Outcome of a retry session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome<T, E> {
    /// The operation eventually succeeded
    Succeeded(T),
    /// The keep-retrying predicate turned false; carries the last failure
    Aborted(E),
}

impl<T, E> RetryOutcome<T, E> {
    /// The success value, if any
    pub fn succeeded(self) -> Option<T> {
        match self {
            Self::Succeeded(value) => Some(value),
            Self::Aborted(_) => None,
        }
    }

    /// Whether the session was abandoned
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted(_))
    }
}

/// Run `operation` until it succeeds or `keep_trying` returns false.
///
/// After every failure `keep_trying` is polled afresh; when it allows another
/// attempt the session sleeps for the next delay of `schedule` first and asks
/// again on waking, so a session stopped during the sleep makes no further
/// attempt. There is no attempt limit: termination comes from success or from
/// the predicate.
pub async fn run<T, E, F, Fut, K>(
    mut schedule: BackoffSchedule,
    name: &str,
    mut operation: F,
    mut keep_trying: K,
) -> RetryOutcome<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    K: FnMut() -> bool,
    E: Display,
{
    let mut attempt: u32 = 1;
    loop {
        let err = match operation().await {
            Ok(value) => return RetryOutcome::Succeeded(value),
            Err(err) => err,
        };

        if !keep_trying() {
            debug!(operation = name, attempt, error = %err, "Giving up, not retrying anymore");
            return RetryOutcome::Aborted(err);
        }

        let delay = schedule.advance();
        debug!(
            operation = name,
            attempt,
            error = %err,
            retry_in = ?delay,
            "Attempt failed, sleeping before retrying"
        );
        tokio::time::sleep(delay).await;

        if !keep_trying() {
            debug!(operation = name, attempt, error = %err, "Stopped while sleeping, not retrying");
            return RetryOutcome::Aborted(err);
        }
        attempt += 1;
    }
}
