//! Backend instance client.
//!
//! # Responsibilities
//! - Probe an instance's health endpoint
//! - Send one slice of a batch to an instance's inference endpoint
//!
//! # Design Decisions
//! - Callers own deadlines; the client only bounds connection setup
//! - A response whose result count differs from the item count is a
//!   protocol error, never a partial success

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use crate::backend::types::{BackendError, InferRequest, InferResponse, InstanceAddress};

/// Operations the router needs from a backend instance.
pub trait InstanceClient: Send + Sync + 'static {
    /// Check whether the instance is ready to serve.
    fn probe(
        &self,
        address: &InstanceAddress,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Run inference for `request.items`, returning one result per item.
    fn infer(
        &self,
        address: &InstanceAddress,
        request: InferRequest,
    ) -> impl Future<Output = Result<Vec<Value>, BackendError>> + Send;
}

/// HTTP implementation of [`InstanceClient`].
#[derive(Debug, Clone)]
pub struct HttpInstanceClient {
    client: Client,
    health_path: String,
    infer_path: String,
}

impl HttpInstanceClient {
    pub fn new(
        connect_timeout: Duration,
        health_path: impl Into<String>,
        infer_path: impl Into<String>,
    ) -> Result<Self, BackendError> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .user_agent(concat!("batch-router/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            health_path: health_path.into(),
            infer_path: infer_path.into(),
        })
    }
}

impl InstanceClient for HttpInstanceClient {
    fn probe(
        &self,
        address: &InstanceAddress,
    ) -> impl Future<Output = Result<(), BackendError>> + Send {
        let url = address.endpoint(&self.health_path);
        async move {
            let response = self.client.get(url).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(BackendError::Status {
                    status: status.as_u16(),
                    body: response.text().await.unwrap_or_default(),
                });
            }

            // Backends that report readiness in the body can veto a 2xx.
            let body = response.text().await?;
            let ready = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| v.get("engine_ready").and_then(Value::as_bool))
                .unwrap_or(true);
            if ready {
                Ok(())
            } else {
                Err(BackendError::Protocol("engine not ready".into()))
            }
        }
    }

    fn infer(
        &self,
        address: &InstanceAddress,
        request: InferRequest,
    ) -> impl Future<Output = Result<Vec<Value>, BackendError>> + Send {
        let url = address.endpoint(&self.infer_path);
        async move {
            let expected = request.items.len();
            if expected == 0 {
                return Ok(Vec::new());
            }

            let response = self.client.post(url).json(&request).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(BackendError::Status {
                    status: status.as_u16(),
                    body: response.text().await.unwrap_or_default(),
                });
            }

            let body: InferResponse = response.json().await?;
            if body.results.len() != expected {
                return Err(BackendError::Protocol(format!(
                    "expected {} results, got {}",
                    expected,
                    body.results.len()
                )));
            }
            Ok(body.results)
        }
    }
}
