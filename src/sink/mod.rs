//! Persistence sink interface.
//!
//! The engine is storage-agnostic: direct writes and buffer replay both
//! go through [`PersistenceSink`], and any implementation (relational
//! store, log, object store) satisfying the contract is acceptable.

use crate::error::DependencyError;
use axum::body::Body;
use axum::http::Request;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

/// Boxed future used at trait seams.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A single write destined for the primary store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteRecord {
    /// Operation kind, e.g. `audit_event` or `metric_sample`.
    pub kind: String,
    /// Opaque payload; the engine never interprets it.
    pub payload: serde_json::Value,
}

/// Storage-agnostic persistence contract.
pub trait PersistenceSink: Send + Sync {
    fn persist<'a>(&'a self, record: &'a WriteRecord) -> BoxFuture<'a, Result<(), DependencyError>>;
}

/// Built-in sink posting records as JSON to an HTTP endpoint.
pub struct HttpSink {
    client: Client<HttpConnector, Body>,
    url: String,
}

impl HttpSink {
    pub fn new(url: impl Into<String>) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            client,
            url: url.into(),
        }
    }
}

impl PersistenceSink for HttpSink {
    fn persist<'a>(&'a self, record: &'a WriteRecord) -> BoxFuture<'a, Result<(), DependencyError>> {
        Box::pin(async move {
            let body = serde_json::to_vec(record)
                .map_err(|e| DependencyError::Validation(e.to_string()))?;
            let request = Request::builder()
                .method("POST")
                .uri(&self.url)
                .header("content-type", "application/json")
                .body(Body::from(body))
                .map_err(|e| DependencyError::Other(e.to_string()))?;

            let response = self.client.request(request).await.map_err(|e| {
                if e.is_connect() {
                    DependencyError::ConnectionRefused
                } else {
                    DependencyError::Other(e.to_string())
                }
            })?;

            if response.status().is_success() {
                Ok(())
            } else {
                Err(DependencyError::RemoteStatus(response.status().as_u16()))
            }
        })
    }
}
