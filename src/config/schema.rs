//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the router.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the batch router.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RouterConfig {
    /// Listener configuration (bind address, body limit).
    pub listener: ListenerConfig,

    /// Explicitly listed backend instances.
    pub instances: Vec<InstanceConfig>,

    /// Optional contiguous port range of instances on one host.
    pub instance_range: Option<InstanceRangeConfig>,

    /// Health check settings.
    pub health_check: HealthCheckConfig,

    /// Dispatch and failover settings.
    pub dispatch: DispatchConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl RouterConfig {
    /// All instances in registry order: explicit entries first, then the
    /// expanded range.
    pub fn resolved_instances(&self) -> Vec<InstanceConfig> {
        let mut instances = self.instances.clone();
        if let Some(range) = &self.instance_range {
            instances.extend(range.expand());
        }
        instances
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum accepted request body in bytes.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_bytes: 8 * 1024 * 1024,
        }
    }
}

/// A single backend instance.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct InstanceConfig {
    /// Backend address as `host:port` (e.g., "127.0.0.1:8000").
    pub address: String,

    /// Whether the instance can serve requests that name a LoRA adapter.
    #[serde(default = "default_supports_adapter")]
    pub supports_adapter: bool,
}

impl InstanceConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            supports_adapter: true,
        }
    }
}

fn default_supports_adapter() -> bool {
    true
}

/// `count` instances on `host`, listening on consecutive ports from
/// `base_port`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InstanceRangeConfig {
    pub host: String,
    pub base_port: u16,
    pub count: u16,
    pub supports_adapter: bool,
}

impl InstanceRangeConfig {
    /// Expand the range into individual instance entries. Ports past 65535
    /// do not exist; `validate_config` rejects ranges that reach them.
    pub fn expand(&self) -> Vec<InstanceConfig> {
        (0..self.count)
            .filter_map(|i| self.base_port.checked_add(i))
            .map(|port| InstanceConfig {
                address: format!("{}:{}", self.host, port),
                supports_adapter: self.supports_adapter,
            })
            .collect()
    }
}

impl Default for InstanceRangeConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            base_port: 8000,
            count: 2,
            supports_adapter: true,
        }
    }
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable the periodic health monitor.
    pub enabled: bool,

    /// Interval between probe rounds in seconds.
    pub interval_secs: u64,

    /// Per-probe timeout in milliseconds.
    pub timeout_ms: u64,

    /// Path to probe on every instance.
    pub path: String,

    /// Consecutive probe failures before an instance is marked unhealthy.
    pub unhealthy_threshold: u32,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 10,
            timeout_ms: 2000,
            path: "/health".to_string(),
            unhealthy_threshold: 3,
        }
    }
}

/// Dispatch configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Path of the backend batch-inference endpoint.
    pub infer_path: String,

    /// Consecutive request-path failures before an instance is marked
    /// unhealthy.
    pub failure_threshold: u32,

    /// Re-split a failed slice across the remaining instances (one pass).
    pub redistribute: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            infer_path: "/infer".to_string(),
            failure_threshold: 1,
            redistribute: true,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Hard deadline for a single backend inference call in seconds.
    pub inference_secs: u64,

    /// Deadline for a whole HTTP request to the router in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            inference_secs: 300,
            request_secs: 660,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Human-readable or JSON log lines.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
