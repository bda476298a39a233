//! HTTP implementation of the alert backend

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;
use url::Url;

use super::AlertBackend;
use crate::alerting::CancellationToken;
use crate::config::{BackendConfig, RetryConfig};
use crate::error::{Error, Result};
use crate::models::{AlertDefinition, NotifyRequest, QueryName, QueryResponse, ResolveRequest};
use crate::retry::{self, RetryOutcome};

/// Talks to the alerting API over HTTP.
///
/// Every request first takes a permit from the admission gate, when one is
/// configured, so that a burst of transitions across many alerts cannot fan
/// out into an unbounded number of concurrent requests.
#[derive(Clone)]
pub struct HttpBackend {
    base_url: Url,
    client: Client,
    admission: Option<Arc<Semaphore>>,
    retry: RetryConfig,
}

impl HttpBackend {
    /// Create a backend from configuration
    pub fn new(config: &BackendConfig, retry: RetryConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        let admission = config
            .max_concurrent_requests
            .map(|permits| Arc::new(Semaphore::new(permits)));

        Ok(Self {
            base_url: config.url()?,
            client,
            admission,
            retry,
        })
    }

    /// Replace the admission gate, e.g. to share one across several clients
    #[must_use]
    pub fn with_admission_gate(mut self, gate: Option<Arc<Semaphore>>) -> Self {
        self.admission = gate;
        self
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    async fn admit(&self) -> Result<Option<OwnedSemaphorePermit>> {
        let Some(gate) = &self.admission else {
            return Ok(None);
        };
        debug!(available = gate.available_permits(), "Waiting for a request permit");
        let permit = gate
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| Error::aborted("request admission"))?;
        Ok(Some(permit))
    }

    async fn get_json<T: DeserializeOwned>(&self, endpoint: &str, url: Url) -> Result<T> {
        let _permit = self.admit().await?;
        let response = self.client.get(url).send().await?;
        let body = check_status(endpoint, response)?.bytes().await?;
        serde_json::from_slice(&body).map_err(|source| Error::Decode {
            endpoint: endpoint.to_string(),
            source,
        })
    }

    async fn post_json<B: Serialize + Sync>(&self, endpoint: &str, body: &B) -> Result<()> {
        let url = self.endpoint(endpoint)?;
        let _permit = self.admit().await?;
        let response = self.client.post(url).json(body).send().await?;
        check_status(endpoint, response)?;
        Ok(())
    }

    /// Run `operation` once, or inside a retry session when `enabled`.
    ///
    /// With a token the session stops as soon as it is cancelled; without one
    /// it retries until success. Permanent errors end the session at once and
    /// are returned as is.
    async fn with_retry<T, F, Fut>(
        &self,
        enabled: bool,
        call: &str,
        cancel: Option<&CancellationToken>,
        mut operation: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if !enabled {
            return operation().await;
        }

        // A permanent failure counts as a finished attempt so the runner stops.
        let attempt = || {
            let fut = operation();
            async move {
                match fut.await {
                    Err(err) if err.is_permanent() => Ok(Err(err)),
                    other => other.map(Ok),
                }
            }
        };
        let keep_trying = || cancel.map_or(true, |token| !token.is_cancelled());
        match retry::run(self.retry.schedule()?, call, attempt, keep_trying).await {
            RetryOutcome::Succeeded(result) => result,
            RetryOutcome::Aborted(err) => {
                debug!(call, error = %err, "Retry session abandoned");
                Err(Error::aborted(call))
            }
        }
    }
}

fn check_status(endpoint: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(Error::Status {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
        })
    }
}

#[async_trait]
impl AlertBackend for HttpBackend {
    async fn fetch_alert_definitions(&self) -> Result<Vec<AlertDefinition>> {
        let url = self.endpoint("alerts")?;
        self.with_retry(self.retry.fetch_alerts, "alerts", None, || {
            self.get_json("alerts", url.clone())
        })
        .await
    }

    async fn query_metric(&self, query: &QueryName) -> Result<f64> {
        let mut url = self.endpoint("query")?;
        url.query_pairs_mut().append_pair("target", query.as_str());

        let response: QueryResponse = self
            .with_retry(self.retry.query, "query", None, || {
                self.get_json("query", url.clone())
            })
            .await?;
        Ok(response.value)
    }

    async fn send_notify(
        &self,
        request: &NotifyRequest,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.with_retry(self.retry.notify, "notify", Some(cancel), || {
            self.post_json("notify", request)
        })
        .await
    }

    async fn send_resolve(
        &self,
        request: &ResolveRequest,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.with_retry(self.retry.resolve, "resolve", Some(cancel), || {
            self.post_json("resolve", request)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend(server: &MockServer, retry: RetryConfig) -> HttpBackend {
        let config = BackendConfig {
            base_url: server.uri(),
            max_concurrent_requests: Some(1),
            request_timeout: Duration::from_secs(5),
        };
        HttpBackend::new(&config, retry).unwrap()
    }

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            backoff_ms: vec![1],
            ..RetryConfig::default()
        }
    }

    #[tokio::test]
    async fn test_fetch_alert_definitions() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/alerts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {
                    "name": "cpu",
                    "query": "cpu_pct",
                    "intervalSecs": 1,
                    "repeatIntervalSecs": 60,
                    "warn": {"message": "cpu high", "value": 50},
                    "critical": {"message": "cpu pegged", "value": 90}
                }
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let alerts = backend(&server, RetryConfig::never())
            .fetch_alert_definitions()
            .await
            .unwrap();

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].name.as_str(), "cpu");
        assert_eq!(alerts[0].repeat_interval, Duration::from_secs(60));
        assert_eq!(alerts[0].thresholds.critical.value, 90.0);
    }

    #[tokio::test]
    async fn test_query_metric_passes_target() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/query"))
            .and(query_param("target", "cpu_pct"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": 42.5})))
            .expect(3)
            .mount(&server)
            .await;

        let backend = backend(&server, RetryConfig::never());
        // Permits are released between calls, so a gate of one never blocks here.
        for _ in 0..3 {
            let value = backend.query_metric(&"cpu_pct".into()).await.unwrap();
            assert_eq!(value, 42.5);
        }
    }

    #[tokio::test]
    async fn test_malformed_body_is_a_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/query"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = backend(&server, RetryConfig::never())
            .query_metric(&"cpu_pct".into())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Decode { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn test_notify_posts_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/notify"))
            .and(body_json(json!({"alertName": "cpu", "message": "cpu high"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let request = NotifyRequest {
            alert_name: "cpu".into(),
            message: "cpu high".into(),
        };
        backend(&server, RetryConfig::never())
            .send_notify(&request, &CancellationToken::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_non_success_status_fails_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/resolve"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let request = ResolveRequest {
            alert_name: "cpu".into(),
        };
        let err = backend(&server, RetryConfig::never())
            .send_resolve(&request, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(
            matches!(err, Error::Status { status: 503, .. }),
            "{err:?}"
        );
    }

    #[tokio::test]
    async fn test_notify_retries_until_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/notify"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/notify"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let request = NotifyRequest {
            alert_name: "cpu".into(),
            message: "cpu high".into(),
        };
        backend(&server, fast_retry())
            .send_notify(&request, &CancellationToken::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_cancelled_notify_stops_retrying() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/notify"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let token = CancellationToken::new();
        token.request_cancellation();
        let request = NotifyRequest {
            alert_name: "cpu".into(),
            message: "cpu high".into(),
        };
        let err = backend(&server, fast_retry())
            .send_notify(&request, &token)
            .await
            .unwrap_err();

        assert!(err.is_aborted(), "{err:?}");
    }

    #[tokio::test]
    async fn test_cancel_during_backoff_sends_nothing_more() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/notify"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/notify"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let retry = RetryConfig {
            backoff_ms: vec![500],
            ..RetryConfig::default()
        };
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            canceller.request_cancellation();
        });

        let request = NotifyRequest {
            alert_name: "cpu".into(),
            message: "cpu high".into(),
        };
        let err = backend(&server, retry)
            .send_notify(&request, &token)
            .await
            .unwrap_err();

        assert!(err.is_aborted(), "{err:?}");
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/resolve"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let request = ResolveRequest {
            alert_name: "cpu".into(),
        };
        let err = backend(&server, fast_retry())
            .send_resolve(&request, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(
            matches!(err, Error::Status { status: 404, .. }),
            "{err:?}"
        );
    }

    #[tokio::test]
    async fn test_undecodable_alert_list_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/alerts"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[{]"))
            .expect(1)
            .mount(&server)
            .await;

        let err = backend(&server, fast_retry())
            .fetch_alert_definitions()
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Decode { .. }), "{err:?}");
    }
}
