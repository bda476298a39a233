//! Retry primitives used to mask transient failures of remote calls

mod backoff;
mod runner;

pub use backoff::BackoffSchedule;
pub use runner::{run, RetryOutcome};
