//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate instance addresses and detect duplicates
//! - Validate value ranges (intervals, timeouts, thresholds > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RouterConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;
use thiserror::Error;

use crate::backend::types::InstanceAddress;
use crate::config::schema::RouterConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no backend instances configured")]
    NoInstances,

    #[error("invalid instance address '{0}'")]
    InvalidInstanceAddress(String),

    #[error("instance address '{0}' listed more than once")]
    DuplicateInstance(String),

    #[error("invalid {field} '{value}'")]
    InvalidSocketAddress { field: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    ZeroValue(&'static str),

    #[error("path '{0}' must start with '/'")]
    InvalidPath(String),

    #[error("instance_range of {count} ports from {base_port} runs past port 65535")]
    PortRangeOverflow { base_port: u16, count: u16 },

    #[error(
        "timeouts.request_secs ({request_secs}) must exceed twice timeouts.inference_secs ({inference_secs})"
    )]
    RequestTimeoutTooShort { request_secs: u64, inference_secs: u64 },
}

/// Check a parsed configuration for semantic errors.
pub fn validate_config(config: &RouterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Some(range) = &config.instance_range {
        if u32::from(range.base_port) + u32::from(range.count) > u32::from(u16::MAX) + 1 {
            errors.push(ValidationError::PortRangeOverflow {
                base_port: range.base_port,
                count: range.count,
            });
        }
    }

    let instances = config.resolved_instances();
    if instances.is_empty() {
        errors.push(ValidationError::NoInstances);
    }

    let mut seen = HashSet::new();
    for instance in &instances {
        match instance.address.parse::<InstanceAddress>() {
            Ok(addr) => {
                if !seen.insert(addr.to_string()) {
                    errors.push(ValidationError::DuplicateInstance(instance.address.clone()));
                }
            }
            Err(_) => errors.push(ValidationError::InvalidInstanceAddress(
                instance.address.clone(),
            )),
        }
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidSocketAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidSocketAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    let positive = [
        ("health_check.interval_secs", config.health_check.interval_secs),
        ("health_check.timeout_ms", config.health_check.timeout_ms),
        (
            "health_check.unhealthy_threshold",
            u64::from(config.health_check.unhealthy_threshold),
        ),
        (
            "dispatch.failure_threshold",
            u64::from(config.dispatch.failure_threshold),
        ),
        ("timeouts.connect_secs", config.timeouts.connect_secs),
        ("timeouts.inference_secs", config.timeouts.inference_secs),
        ("timeouts.request_secs", config.timeouts.request_secs),
        ("listener.max_body_bytes", config.listener.max_body_bytes as u64),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::ZeroValue(field));
        }
    }

    // A redistributed slice can take two backend deadlines back to back.
    let timeouts = &config.timeouts;
    if timeouts.inference_secs > 0
        && timeouts.request_secs <= timeouts.inference_secs.saturating_mul(2)
    {
        errors.push(ValidationError::RequestTimeoutTooShort {
            request_secs: timeouts.request_secs,
            inference_secs: timeouts.inference_secs,
        });
    }

    for path in [&config.health_check.path, &config.dispatch.infer_path] {
        if !path.starts_with('/') {
            errors.push(ValidationError::InvalidPath(path.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
