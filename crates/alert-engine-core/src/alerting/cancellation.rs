//! One-shot cooperative cancellation signal

use tokio_util::sync::CancellationToken as Gate;

/// Broadcast-once "stop" flag shared by a task and whoever supervises it.
///
/// Once cancelled a token stays cancelled and every clone observes it. Child
/// tokens are cancelled together with their parent but can also be cancelled
/// on their own, which is how engine shutdown cascades down to supervisors and
/// reporters.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    gate: Gate,
}

impl CancellationToken {
    /// Create a token that is not cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the token. Idempotent, never blocks.
    pub fn request_cancellation(&self) {
        self.gate.cancel();
    }

    /// Whether cancellation has been requested on this token or an ancestor
    pub fn is_cancelled(&self) -> bool {
        self.gate.is_cancelled()
    }

    /// Resolves once the token is cancelled
    pub async fn cancelled(&self) {
        self.gate.cancelled().await;
    }

    /// A token cancelled whenever this one is
    pub fn child_token(&self) -> Self {
        Self {
            gate: self.gate.child_token(),
        }
    }
}
