//! Transport collaborator: the remote calls the engine depends on
//!
//! The engine only sees [`AlertBackend`]; [`HttpBackend`] implements it over
//! the alerting HTTP API.

mod http;

pub use http::HttpBackend;

use async_trait::async_trait;

use crate::alerting::CancellationToken;
use crate::error::Result;
use crate::models::{AlertDefinition, NotifyRequest, QueryName, ResolveRequest};

/// Remote operations consumed by the engine.
///
/// Whatever an implementation returns is final for that call: retries, if
/// any, happen inside the implementation. The token handed to the send calls
/// belongs to the calling reporter; an implementation that retries must stop
/// once it is cancelled.
#[async_trait]
pub trait AlertBackend: Send + Sync + 'static {
    /// Fetch every alert definition. Called once at startup.
    async fn fetch_alert_definitions(&self) -> Result<Vec<AlertDefinition>>;

    /// Run one metric query and return its sample
    async fn query_metric(&self, query: &QueryName) -> Result<f64>;

    /// Report a firing alert
    async fn send_notify(&self, request: &NotifyRequest, cancel: &CancellationToken)
        -> Result<()>;

    /// Report that an alert recovered
    async fn send_resolve(
        &self,
        request: &ResolveRequest,
        cancel: &CancellationToken,
    ) -> Result<()>;
}

