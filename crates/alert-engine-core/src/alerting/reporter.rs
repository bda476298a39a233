//! Notification task for one severity state

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info_span, Instrument};
use uuid::Uuid;

use super::cancellation::CancellationToken;
use crate::models::{AlertMessage, AlertName, NotificationAction, NotifyRequest, ResolveRequest};
use crate::transport::AlertBackend;

/// Identifies one spawned reporter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReporterId(Uuid);

impl ReporterId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ReporterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// How a reporter finished
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReporterExit {
    /// The resolve call succeeded
    Resolved,
    /// The reporter was superseded or the engine shut down
    Cancelled,
    /// A notify or resolve call failed; nothing more is sent
    Failed(String),
}

/// Emits the notifications of one severity state.
///
/// Built from a [`NotificationAction`] and a token minted by the owning
/// supervisor. A `ResolveOnce` reporter sends a single resolve. A `Repeat`
/// reporter notifies, sleeps for its interval and notifies again until its
/// token is cancelled or a call fails.
pub struct Reporter<B> {
    backend: Arc<B>,
    alert: AlertName,
    action: NotificationAction,
    token: CancellationToken,
}

impl<B: AlertBackend> Reporter<B> {
    /// Create a reporter for `alert`
    pub fn new(
        backend: Arc<B>,
        alert: AlertName,
        action: NotificationAction,
        token: CancellationToken,
    ) -> Self {
        Self {
            backend,
            alert,
            action,
            token,
        }
    }

    /// Start the reporter on the runtime
    pub fn spawn(self) -> ReporterHandle {
        let id = ReporterId::new();
        let token = self.token.clone();
        let span = info_span!("reporter", reporter = %id);
        let task = tokio::spawn(self.run().instrument(span));
        ReporterHandle { id, token, task }
    }

    /// Run the reporter to completion on the current task
    pub async fn run(self) -> ReporterExit {
        match &self.action {
            NotificationAction::ResolveOnce => self.resolve_once().await,
            NotificationAction::Repeat { message, interval } => {
                self.repeat(message, *interval).await
            }
        }
    }

    async fn resolve_once(&self) -> ReporterExit {
        if self.token.is_cancelled() {
            debug!("Cancelled before resolving");
            return ReporterExit::Cancelled;
        }

        let request = ResolveRequest {
            alert_name: self.alert.clone(),
        };
        debug!(alert = %self.alert, "Sending resolve");
        match self.backend.send_resolve(&request, &self.token).await {
            Ok(()) => {
                debug!(alert = %self.alert, "Resolve sent");
                ReporterExit::Resolved
            }
            Err(e) if e.is_aborted() => ReporterExit::Cancelled,
            Err(e) => {
                error!(alert = %self.alert, call = "resolve", error = %e, "Resolve failed");
                ReporterExit::Failed(e.to_string())
            }
        }
    }

    async fn repeat(&self, message: &AlertMessage, interval: Duration) -> ReporterExit {
        let request = NotifyRequest {
            alert_name: self.alert.clone(),
            message: message.clone(),
        };

        loop {
            if self.token.is_cancelled() {
                debug!("Cancelled, not notifying");
                return ReporterExit::Cancelled;
            }

            debug!(alert = %self.alert, message = %request.message, "Sending notify");
            match self.backend.send_notify(&request, &self.token).await {
                Ok(()) => {}
                Err(e) if e.is_aborted() => return ReporterExit::Cancelled,
                Err(e) => {
                    error!(alert = %self.alert, call = "notify", error = %e, "Notify failed, stopping reporter");
                    return ReporterExit::Failed(e.to_string());
                }
            }

            debug!(sleep_for = ?interval, "Sleeping until next notify");
            tokio::select! {
                biased;
                () = self.token.cancelled() => {
                    debug!("Cancelled while sleeping");
                    return ReporterExit::Cancelled;
                }
                () = sleep(interval) => {}
            }
        }
    }
}

/// Owning side of a running reporter
#[derive(Debug)]
pub struct ReporterHandle {
    id: ReporterId,
    token: CancellationToken,
    task: JoinHandle<ReporterExit>,
}

impl ReporterHandle {
    /// Identifier used in logs
    pub fn id(&self) -> ReporterId {
        self.id
    }

    /// Ask the reporter to stop. Does not wait for it: a call already in
    /// flight may still complete.
    pub fn cancel(&self) {
        self.token.request_cancellation();
    }

    /// Whether the reporter task has finished
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the reporter to finish. `None` if the task panicked.
    pub async fn join(self) -> Option<ReporterExit> {
        self.task.await.ok()
    }
}
