//! Alert execution: per-alert supervisors and their notification reporters
//!
//! The [`Engine`] starts one [`AlertSupervisor`] per alert definition. Each
//! supervisor polls its metric, tracks the alert's severity and, on every
//! transition, replaces its [`Reporter`] with one for the new severity.

mod cancellation;
mod engine;
mod reporter;
mod supervisor;

#[cfg(test)]
pub(crate) mod testing;

pub use cancellation::CancellationToken;
pub use engine::{Engine, EngineReport};
pub use reporter::{Reporter, ReporterExit, ReporterHandle, ReporterId};
pub use supervisor::{AlertSupervisor, SupervisorExit};
