//! In-memory backend for engine tests

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::cancellation::CancellationToken;
use crate::error::{Error, Result};
use crate::models::{
    AlertDefinition, NotifyRequest, QueryName, ResolveRequest, Threshold, Thresholds,
};
use crate::transport::AlertBackend;

/// A recorded send
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Notify { alert: String, message: String },
    Resolve { alert: String },
}

impl Call {
    pub fn notify(alert: &str, message: &str) -> Self {
        Self::Notify {
            alert: alert.to_string(),
            message: message.to_string(),
        }
    }

    pub fn resolve(alert: &str) -> Self {
        Self::Resolve {
            alert: alert.to_string(),
        }
    }
}

/// One scripted query answer
#[derive(Debug, Clone, Copy)]
pub enum Sample {
    Value(f64),
    Fail,
}

/// Scripted answers per query and a log of every send.
///
/// The last scripted answer of a query repeats forever.
#[derive(Default)]
pub struct RecordingBackend {
    alerts: Vec<AlertDefinition>,
    fail_fetch: bool,
    fail_sends: bool,
    scripts: Mutex<HashMap<QueryName, VecDeque<Sample>>>,
    queries: Mutex<HashMap<QueryName, usize>>,
    calls: Mutex<Vec<Call>>,
}

impl RecordingBackend {
    pub fn with_alerts(alerts: Vec<AlertDefinition>) -> Self {
        Self {
            alerts,
            ..Self::default()
        }
    }

    pub fn failing_fetch(mut self) -> Self {
        self.fail_fetch = true;
        self
    }

    pub fn failing_sends(mut self) -> Self {
        self.fail_sends = true;
        self
    }

    pub fn script(self, query: &str, samples: impl IntoIterator<Item = Sample>) -> Self {
        self.scripts
            .lock()
            .insert(query.into(), samples.into_iter().collect());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn query_count(&self, query: &str) -> usize {
        self.queries
            .lock()
            .get(&QueryName::from(query))
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl AlertBackend for RecordingBackend {
    async fn fetch_alert_definitions(&self) -> Result<Vec<AlertDefinition>> {
        if self.fail_fetch {
            return Err(Error::Status {
                endpoint: "alerts".to_string(),
                status: 500,
            });
        }
        Ok(self.alerts.clone())
    }

    async fn query_metric(&self, query: &QueryName) -> Result<f64> {
        *self.queries.lock().entry(query.clone()).or_insert(0) += 1;

        let sample = {
            let mut scripts = self.scripts.lock();
            let script = scripts
                .get_mut(query)
                .ok_or_else(|| Error::validation(format!("no script for {query}")))?;
            if script.len() > 1 {
                script.pop_front()
            } else {
                script.front().copied()
            }
        };

        match sample {
            Some(Sample::Value(value)) => Ok(value),
            Some(Sample::Fail) | None => Err(Error::Status {
                endpoint: "query".to_string(),
                status: 500,
            }),
        }
    }

    async fn send_notify(
        &self,
        request: &NotifyRequest,
        _cancel: &CancellationToken,
    ) -> Result<()> {
        self.calls.lock().push(Call::notify(
            request.alert_name.as_str(),
            request.message.as_str(),
        ));
        self.send_result("notify")
    }

    async fn send_resolve(
        &self,
        request: &ResolveRequest,
        _cancel: &CancellationToken,
    ) -> Result<()> {
        self.calls
            .lock()
            .push(Call::resolve(request.alert_name.as_str()));
        self.send_result("resolve")
    }
}

impl RecordingBackend {
    fn send_result(&self, endpoint: &str) -> Result<()> {
        if self.fail_sends {
            Err(Error::Status {
                endpoint: endpoint.to_string(),
                status: 502,
            })
        } else {
            Ok(())
        }
    }
}

/// Alert with warn at 50 and critical at 80
pub fn alert(name: &str, query: &str, poll: Duration, repeat: Duration) -> AlertDefinition {
    AlertDefinition {
        name: name.into(),
        query: query.into(),
        poll_interval: poll,
        repeat_interval: repeat,
        thresholds: Thresholds {
            warn: Threshold {
                message: "warn msg".into(),
                value: 50.0,
            },
            critical: Threshold {
                message: "critical msg".into(),
                value: 80.0,
            },
        },
    }
}
