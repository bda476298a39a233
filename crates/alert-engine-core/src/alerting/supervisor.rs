//! Per-alert poll loop

use std::sync::Arc;

use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use super::cancellation::CancellationToken;
use super::reporter::{Reporter, ReporterHandle};
use crate::error::Error;
use crate::models::{AlertDefinition, AlertSeverity};
use crate::transport::AlertBackend;

/// Why a supervisor stopped
#[derive(Debug)]
pub enum SupervisorExit {
    /// A metric query failed; this alert is no longer monitored
    Failed(Error),
    /// The engine is shutting down
    Shutdown,
}

impl SupervisorExit {
    /// Whether the supervisor stopped because of a failure
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Watches a single alert.
///
/// Polls the alert's query every poll interval, evaluates the sample against
/// the thresholds and, whenever the severity changes, cancels the running
/// reporter and spawns one for the new severity. Starts out passing with no
/// reporter, so an initial passing sample triggers nothing.
pub struct AlertSupervisor<B> {
    alert: AlertDefinition,
    backend: Arc<B>,
    shutdown: CancellationToken,
    severity: AlertSeverity,
    reporter: Option<ReporterHandle>,
}

impl<B: AlertBackend> AlertSupervisor<B> {
    /// Create a supervisor; `shutdown` stops it and every reporter it spawns
    pub fn new(alert: AlertDefinition, backend: Arc<B>, shutdown: CancellationToken) -> Self {
        Self {
            alert,
            backend,
            shutdown,
            severity: AlertSeverity::Pass,
            reporter: None,
        }
    }

    /// The alert being watched
    pub fn alert(&self) -> &AlertDefinition {
        &self.alert
    }

    /// Last recorded severity
    pub fn severity(&self) -> &AlertSeverity {
        &self.severity
    }

    /// The live reporter, if any
    pub fn reporter(&self) -> Option<&ReporterHandle> {
        self.reporter.as_ref()
    }

    /// Poll until a query fails or shutdown is requested.
    ///
    /// The live reporter is cancelled on the way out so no notification task
    /// outlives its supervisor.
    pub async fn run(mut self) -> SupervisorExit {
        info!(
            alert = %self.alert.name,
            query = %self.alert.query,
            interval = ?self.alert.poll_interval,
            "Starting supervisor"
        );

        let exit = self.poll_loop().await;

        if let Some(reporter) = self.reporter.take() {
            debug!(reporter = %reporter.id(), "Stopping reporter of finished supervisor");
            reporter.cancel();
        }
        info!(alert = %self.alert.name, exit = ?exit, "Supervisor stopped");
        exit
    }

    async fn poll_loop(&mut self) -> SupervisorExit {
        loop {
            debug!(query = %self.alert.query, "Querying");
            let result = tokio::select! {
                biased;
                () = self.shutdown.cancelled() => return SupervisorExit::Shutdown,
                result = self.backend.query_metric(&self.alert.query) => result,
            };

            match result {
                Ok(value) => {
                    self.observe(value);
                }
                Err(e) => {
                    error!(alert = %self.alert.name, call = "query", error = %e, "Query failed");
                    return SupervisorExit::Failed(e);
                }
            }

            debug!(sleep_for = ?self.alert.poll_interval, "Sleeping until next poll");
            tokio::select! {
                biased;
                () = self.shutdown.cancelled() => return SupervisorExit::Shutdown,
                () = sleep(self.alert.poll_interval) => {}
            }
        }
    }

    /// Evaluate one sample and drive the reporter. Returns whether the
    /// severity changed.
    ///
    /// Spawns the new reporter, so it must run inside a tokio runtime.
    pub(crate) fn observe(&mut self, value: f64) -> bool {
        if !value.is_finite() {
            warn!(alert = %self.alert.name, value, "Received non-finite sample");
        }

        let severity = self.alert.thresholds.evaluate(value);
        debug!(value, severity = %severity, "Received sample");
        if severity == self.severity {
            debug!("State did not change");
            return false;
        }

        info!(alert = %self.alert.name, from = %self.severity, to = %severity, "State changed");

        if let Some(previous) = self.reporter.take() {
            debug!(reporter = %previous.id(), "Stopping previous reporter");
            previous.cancel();
        }

        let action = self.alert.action_for(&severity);
        self.severity = severity;
        let reporter = Reporter::new(
            self.backend.clone(),
            self.alert.name.clone(),
            action,
            self.shutdown.child_token(),
        );
        self.reporter = Some(reporter.spawn());
        true
    }
}
