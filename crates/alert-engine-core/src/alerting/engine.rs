//! Engine: one supervisor per alert definition

use std::collections::HashSet;
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{error, info, info_span, warn, Instrument};

use super::cancellation::CancellationToken;
use super::supervisor::{AlertSupervisor, SupervisorExit};
use crate::error::Result;
use crate::models::AlertName;
use crate::transport::AlertBackend;

/// What happened to every alert during one engine run
#[derive(Debug, Default)]
pub struct EngineReport {
    /// Supervisors in the order they finished
    pub exits: Vec<(AlertName, SupervisorExit)>,
    /// Definitions rejected by validation and never started
    pub skipped: Vec<AlertName>,
}

impl EngineReport {
    /// Exit of the named alert's supervisor
    pub fn exit_of(&self, name: &str) -> Option<&SupervisorExit> {
        self.exits
            .iter()
            .find(|(alert, _)| alert.as_str() == name)
            .map(|(_, exit)| exit)
    }
}

/// Runs every alert of a backend
pub struct Engine<B> {
    backend: Arc<B>,
}

impl<B: AlertBackend> Engine<B> {
    /// Create an engine over `backend`
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    /// Fetch the alert list once, start a supervisor per alert and wait
    /// until all of them have stopped.
    ///
    /// Fails only when the alert list cannot be fetched. A supervisor that
    /// stops does not affect the others and is not restarted. Cancelling
    /// `shutdown` stops every supervisor at its next suspension point.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<EngineReport> {
        info!("Fetching alert definitions");
        let alerts = self.backend.fetch_alert_definitions().await.map_err(|e| {
            error!(call = "alerts", error = %e, "Cannot fetch alert definitions");
            e
        })?;
        info!(count = alerts.len(), "Alert definitions fetched");

        let mut report = EngineReport::default();
        let mut names = HashSet::new();
        let mut supervisors = JoinSet::new();

        for alert in alerts {
            if let Err(e) = alert.validate() {
                warn!(alert = %alert.name, error = %e, "Skipping invalid alert definition");
                report.skipped.push(alert.name);
                continue;
            }
            if !names.insert(alert.name.clone()) {
                warn!(alert = %alert.name, "Duplicate alert name");
            }

            let name = alert.name.clone();
            let span = info_span!("alert", alert = %name);
            let supervisor =
                AlertSupervisor::new(alert, self.backend.clone(), shutdown.child_token());
            supervisors.spawn(
                async move {
                    let exit = supervisor.run().await;
                    (name, exit)
                }
                .instrument(span),
            );
        }

        info!(
            running = supervisors.len(),
            "Waiting until all supervisors finish or fail"
        );
        while let Some(joined) = supervisors.join_next().await {
            match joined {
                Ok((name, exit)) => {
                    info!(alert = %name, exit = ?exit, "Supervisor finished");
                    report.exits.push((name, exit));
                }
                Err(e) => error!(error = %e, "Supervisor task panicked"),
            }
        }

        info!("All supervisors finished");
        Ok(report)
    }
}
