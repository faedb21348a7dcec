//! Built-in HTTP GET health check.

use crate::probe::types::HealthCheck;
use crate::sink::BoxFuture;
use axum::body::Body;
use axum::http::Request;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

/// Probes a URL with GET; any 2xx answer passes.
pub struct HttpHealthCheck {
    client: Client<HttpConnector, Body>,
    url: String,
}

impl HttpHealthCheck {
    pub fn new(url: impl Into<String>) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            client,
            url: url.into(),
        }
    }
}

impl HealthCheck for HttpHealthCheck {
    fn check(&self) -> BoxFuture<'_, bool> {
        Box::pin(async move {
            let request = match Request::builder()
                .method("GET")
                .uri(&self.url)
                .header("user-agent", "aegis-health-check")
                .body(Body::empty())
            {
                Ok(req) => req,
                Err(e) => {
                    tracing::error!(url = %self.url, error = %e, "Failed to build health check request");
                    return false;
                }
            };

            match self.client.request(request).await {
                Ok(response) => {
                    let success = response.status().is_success();
                    if !success {
                        tracing::warn!(
                            url = %self.url,
                            status = %response.status(),
                            "Health check failed: non-success status"
                        );
                    }
                    success
                }
                Err(e) => {
                    tracing::warn!(url = %self.url, error = %e, "Health check failed: connection error");
                    false
                }
            }
        })
    }
}
