//! Instance abstraction.
//!
//! # Responsibilities
//! - Represent a single backend instance
//! - Hold its health tracker and request counters behind one lock
//! - Hand out consistent copies of that record

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::backend::InstanceAddress;
use crate::health::state::{HealthState, HealthTracker};

/// Stable ordinal of an instance, assigned at registry construction.
pub type InstanceId = usize;

/// Request counters fed by the dispatch coordinator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Counters {
    /// Successful inference calls.
    pub requests_handled: u64,
    /// Items returned by successful inference calls.
    pub items_handled: u64,
    /// Failed inference calls (timeouts, transport, bad responses).
    pub errors: u64,
    /// Sum of successful call latencies.
    pub cumulative_latency: Duration,
}

/// Mutable part of an instance.
#[derive(Debug, Clone, Default)]
pub(crate) struct InstanceRecord {
    pub(crate) tracker: HealthTracker,
    pub(crate) last_checked_at: Option<Instant>,
    pub(crate) last_success_at: Option<Instant>,
    pub(crate) counters: Counters,
}

/// A single backend instance.
#[derive(Debug)]
pub struct Instance {
    id: InstanceId,
    address: InstanceAddress,
    supports_adapter: bool,
    record: Mutex<InstanceRecord>,
}

impl Instance {
    pub fn new(id: InstanceId, address: InstanceAddress, supports_adapter: bool) -> Self {
        Self {
            id,
            address,
            supports_adapter,
            record: Mutex::new(InstanceRecord::default()),
        }
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn address(&self) -> &InstanceAddress {
        &self.address
    }

    /// Exclusive access to the mutable record. Poisoning is ignored: every
    /// update leaves the record consistent before it can panic.
    pub(crate) fn record(&self) -> MutexGuard<'_, InstanceRecord> {
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Point-in-time copy of this instance.
    pub fn view(&self) -> InstanceView {
        let record = self.record().clone();
        InstanceView {
            id: self.id,
            address: self.address.clone(),
            supports_adapter: self.supports_adapter,
            health: record.tracker.state(),
            consecutive_failures: record.tracker.consecutive_failures(),
            last_checked_at: record.last_checked_at,
            last_success_at: record.last_success_at,
            counters: record.counters,
        }
    }
}

/// Immutable copy of an instance taken under its lock.
#[derive(Debug, Clone)]
pub struct InstanceView {
    pub id: InstanceId,
    pub address: InstanceAddress,
    pub supports_adapter: bool,
    pub health: HealthState,
    pub consecutive_failures: u32,
    pub last_checked_at: Option<Instant>,
    pub last_success_at: Option<Instant>,
    pub counters: Counters,
}

impl InstanceView {
    pub fn is_healthy(&self) -> bool {
        self.health == HealthState::Healthy
    }

    /// Whether this instance may serve a batch asking for `adapter`.
    pub fn can_serve(&self, adapter: Option<&str>) -> bool {
        adapter.is_none() || self.supports_adapter
    }

    /// Mean latency of successful calls, if there were any.
    pub fn mean_latency(&self) -> Option<Duration> {
        let n = u32::try_from(self.counters.requests_handled).ok()?;
        if n == 0 {
            return None;
        }
        Some(self.counters.cumulative_latency / n)
    }
}
