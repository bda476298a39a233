//! # Alert Engine
//!
//! Continuously evaluates threshold alerts against a metrics backend and
//! drives notifications for them.
//!
//! ## Architecture
//!
//! - **Engine**: fetches the alert definitions once and runs one supervisor per alert
//! - **Supervisor**: polls an alert's metric and tracks its pass / warn / critical severity
//! - **Reporter**: notifies (and re-notifies) while an alert fires, resolves once it recovers
//! - **Retry**: backoff schedules and a retry runner for transient transport failures
//! - **Transport**: the backend interface and its HTTP implementation
//!
//! ## Quick Start
//!
//! ```bash
//! # Run every alert served by the backend
//! alert-engine run
//!
//! # Inspect the alert definitions
//! alert-engine alerts list
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod alerting;
pub mod config;
pub mod error;
pub mod models;
pub mod retry;
pub mod transport;

pub use config::Config;
pub use error::{Error, Result};

/// Re-exports for convenience
pub mod prelude {
    pub use crate::alerting::{AlertSupervisor, CancellationToken, Engine, Reporter};
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::models::*;
    pub use crate::retry::{BackoffSchedule, RetryOutcome};
    pub use crate::transport::{AlertBackend, HttpBackend};
}
