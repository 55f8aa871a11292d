//! Routing statistics.
//!
//! # Responsibilities
//! - Count batches, items and assignments as they complete
//! - Project registry state plus those counters into a read-only report
//!
//! # Design Decisions
//! - Holds no authority over health; health comes from the registry
//! - Plain atomic counters, updated once per assignment outcome

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::health::state::HealthState;
use crate::load_balancer::{InstanceId, InstanceRegistry, InstanceView};

/// Aggregate counters fed by the router and the dispatch coordinator.
#[derive(Debug, Default)]
pub struct StatsAggregator {
    batches_routed: AtomicU64,
    batches_rejected: AtomicU64,
    items_routed: AtomicU64,
    items_failed: AtomicU64,
    items_redistributed: AtomicU64,
    assignments_succeeded: AtomicU64,
    assignments_failed: AtomicU64,
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// One assignment finished, successfully or not.
    pub fn record_assignment(&self, items: usize, success: bool) {
        if success {
            self.assignments_succeeded.fetch_add(1, Ordering::Relaxed);
            self.items_routed.fetch_add(items as u64, Ordering::Relaxed);
        } else {
            self.assignments_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Items re-split after their first instance failed.
    pub fn record_redistributed(&self, items: usize) {
        self.items_redistributed.fetch_add(items as u64, Ordering::Relaxed);
    }

    /// Items answered with an error marker.
    pub fn record_items_failed(&self, items: usize) {
        self.items_failed.fetch_add(items as u64, Ordering::Relaxed);
    }

    pub fn record_batch_routed(&self) {
        self.batches_routed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_batch_rejected(&self) {
        self.batches_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Build a report from the current registry state.
    pub fn report(&self, registry: &InstanceRegistry) -> RouterStats {
        let views = registry.snapshot();
        let count = |state: HealthState| views.iter().filter(|v| v.health == state).count();

        let summary = StatsSummary {
            total_instances: views.len(),
            healthy_instances: count(HealthState::Healthy),
            unhealthy_instances: count(HealthState::Unhealthy),
            unknown_instances: count(HealthState::Unknown),
            batches_routed: self.batches_routed.load(Ordering::Relaxed),
            batches_rejected: self.batches_rejected.load(Ordering::Relaxed),
            items_routed: self.items_routed.load(Ordering::Relaxed),
            items_failed: self.items_failed.load(Ordering::Relaxed),
            items_redistributed: self.items_redistributed.load(Ordering::Relaxed),
            assignments_succeeded: self.assignments_succeeded.load(Ordering::Relaxed),
            assignments_failed: self.assignments_failed.load(Ordering::Relaxed),
        };

        RouterStats {
            summary,
            instances: views.iter().map(InstanceStats::from).collect(),
        }
    }
}

/// Full statistics report.
#[derive(Debug, Clone, Serialize)]
pub struct RouterStats {
    pub summary: StatsSummary,
    pub instances: Vec<InstanceStats>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StatsSummary {
    pub total_instances: usize,
    pub healthy_instances: usize,
    pub unhealthy_instances: usize,
    pub unknown_instances: usize,
    pub batches_routed: u64,
    pub batches_rejected: u64,
    pub items_routed: u64,
    pub items_failed: u64,
    pub items_redistributed: u64,
    pub assignments_succeeded: u64,
    pub assignments_failed: u64,
}

/// Per-instance projection. Timestamps are reported as seconds elapsed.
#[derive(Debug, Clone, Serialize)]
pub struct InstanceStats {
    pub id: InstanceId,
    pub address: String,
    pub health: HealthState,
    pub supports_adapter: bool,
    pub consecutive_failures: u32,
    pub requests_handled: u64,
    pub items_handled: u64,
    pub errors: u64,
    pub mean_latency_ms: Option<f64>,
    pub last_success_secs_ago: Option<f64>,
    pub last_checked_secs_ago: Option<f64>,
}

impl From<&InstanceView> for InstanceStats {
    fn from(view: &InstanceView) -> Self {
        Self {
            id: view.id,
            address: view.address.to_string(),
            health: view.health,
            supports_adapter: view.supports_adapter,
            consecutive_failures: view.consecutive_failures,
            requests_handled: view.counters.requests_handled,
            items_handled: view.counters.items_handled,
            errors: view.counters.errors,
            mean_latency_ms: view.mean_latency().map(|d| d.as_micros() as f64 / 1000.0),
            last_success_secs_ago: view.last_success_at.map(|t| t.elapsed().as_secs_f64()),
            last_checked_secs_ago: view.last_checked_at.map(|t| t.elapsed().as_secs_f64()),
        }
    }
}
