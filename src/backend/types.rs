//! Wire types and error definitions for backend instances.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use url::Url;

/// Host and port of a backend instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceAddress {
    host: String,
    port: u16,
    base_url: Url,
}

impl InstanceAddress {
    pub fn new(host: &str, port: u16) -> Result<Self, AddressParseError> {
        let err = || AddressParseError(format!("{host}:{port}"));
        if host.is_empty() || port == 0 || host.contains(['/', '?', '#', '@']) {
            return Err(err());
        }
        let base_url = Url::parse(&format!("http://{host}:{port}")).map_err(|_| err())?;
        Ok(Self {
            host: host.to_lowercase(),
            port,
            base_url,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Full URL of `path` on this instance.
    pub fn endpoint(&self, path: &str) -> Url {
        let mut url = self.base_url.clone();
        url.set_path(path);
        url
    }
}

impl fmt::Display for InstanceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Error returned when an instance address is not `host:port`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("expected host:port, got '{0}'")]
pub struct AddressParseError(pub String);

impl FromStr for InstanceAddress {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || AddressParseError(s.to_string());
        let (host, port) = s.rsplit_once(':').ok_or_else(err)?;
        let port: u16 = port.parse().map_err(|_| err())?;
        Self::new(host, port).map_err(|_| err())
    }
}

/// Generation parameters shared by every item of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub temperature: f64,
    pub top_p: f64,
    /// Optional LoRA adapter the backend should apply.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lora_adapter: Option<String>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: 512,
            temperature: 0.7,
            top_p: 0.9,
            lora_adapter: None,
        }
    }
}

/// Body of a backend `POST /infer` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferRequest {
    pub items: Vec<Value>,
    #[serde(flatten)]
    pub params: GenerationParams,
}

/// Body of a successful backend `POST /infer` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferResponse {
    #[serde(alias = "responses")]
    pub results: Vec<Value>,
}

/// Errors that can occur when talking to a backend instance.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// The call did not complete before its deadline.
    #[error("backend call timed out")]
    Timeout,

    /// Connection or I/O failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The backend answered with a non-success status.
    #[error("backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The backend answered with a body that breaks the contract.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl BackendError {
    /// Short label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            BackendError::Timeout => "timeout",
            BackendError::Transport(_) => "transport",
            BackendError::Status { .. } => "status",
            BackendError::Protocol(_) => "protocol",
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            BackendError::Timeout
        } else if e.is_decode() {
            BackendError::Protocol(e.to_string())
        } else {
            BackendError::Transport(e.to_string())
        }
    }
}
