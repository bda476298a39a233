//! Request and response bodies of the alert backend

use serde::{Deserialize, Serialize};

use super::alert::{AlertMessage, AlertName};

/// Response of `GET /query`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub value: f64,
}

/// Request body for the `/notify` endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyRequest {
    #[serde(rename = "alertName")]
    pub alert_name: AlertName,
    pub message: AlertMessage,
}

/// Request body for the `/resolve` endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveRequest {
    #[serde(rename = "alertName")]
    pub alert_name: AlertName,
}
