//! Caller-facing batch types and error definitions.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::health::state::HealthState;
use crate::load_balancer::{InstanceId, InstanceView};

/// Batch-level rejections, produced before anything is dispatched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    /// The batch contained no items.
    #[error("batch must contain at least one item")]
    EmptyBatch,

    /// No eligible instance was healthy when the batch was split.
    #[error("no healthy instances available")]
    NoHealthyInstances,
}

/// Per-item failure marker.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemError {
    /// Every instance that could have served this item failed.
    #[error("backend unavailable: {reason}")]
    BackendUnavailable { reason: String },
}

/// Result at one position of a batch response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemResult {
    Ok(Value),
    Error(ItemError),
}

impl ItemResult {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        ItemResult::Error(ItemError::BackendUnavailable {
            reason: reason.into(),
        })
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, ItemResult::Ok(_))
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            ItemResult::Ok(v) => Some(v),
            ItemResult::Error(_) => None,
        }
    }
}

/// Ordered results for one batch plus routing metadata.
#[derive(Debug, Clone, Serialize)]
pub struct BatchResponse {
    pub batch_id: Uuid,
    /// `results[i]` always answers input item `i`.
    pub results: Vec<ItemResult>,
    pub lora_adapter_used: Option<String>,
    pub instances_used: usize,
    pub total_items: usize,
    pub failed_items: usize,
    pub redistributed_items: usize,
}

impl BatchResponse {
    /// True when at least one position carries an error marker.
    pub fn is_partial(&self) -> bool {
        self.failed_items > 0
    }
}

/// Lifecycle of one batch inside the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchPhase {
    Received,
    Splitting,
    Dispatching,
    Retrying,
    Aggregating,
    Responded,
    Rejected,
}

impl fmt::Display for BatchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BatchPhase::Received => "received",
            BatchPhase::Splitting => "splitting",
            BatchPhase::Dispatching => "dispatching",
            BatchPhase::Retrying => "retrying",
            BatchPhase::Aggregating => "aggregating",
            BatchPhase::Responded => "responded",
            BatchPhase::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

/// Log a phase change for `batch_id`.
pub fn enter_phase(batch_id: Uuid, phase: BatchPhase) {
    tracing::debug!(batch_id = %batch_id, phase = %phase, "Batch phase");
}

/// Overall router health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    /// Every instance is healthy.
    Healthy,
    /// Some, but not all, instances are healthy.
    Degraded,
    /// No instance is healthy.
    Unhealthy,
}

/// Health of one instance as reported by `health()`.
#[derive(Debug, Clone, Serialize)]
pub struct InstanceHealth {
    pub id: InstanceId,
    pub address: String,
    pub health: HealthState,
    pub consecutive_failures: u32,
}

impl From<&InstanceView> for InstanceHealth {
    fn from(view: &InstanceView) -> Self {
        Self {
            id: view.id,
            address: view.address.to_string(),
            health: view.health,
            consecutive_failures: view.consecutive_failures,
        }
    }
}

/// Result of `health()`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: OverallStatus,
    pub total_instances: usize,
    pub healthy_instances: usize,
    pub instances: Vec<InstanceHealth>,
}

impl HealthReport {
    pub fn from_views(views: &[InstanceView]) -> Self {
        let healthy = views.iter().filter(|v| v.is_healthy()).count();
        let status = match healthy {
            0 => OverallStatus::Unhealthy,
            n if n == views.len() => OverallStatus::Healthy,
            _ => OverallStatus::Degraded,
        };
        Self {
            status,
            total_instances: views.len(),
            healthy_instances: healthy,
            instances: views.iter().map(InstanceHealth::from).collect(),
        }
    }
}
