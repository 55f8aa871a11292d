//! Instance registry.
//!
//! # Responsibilities
//! - Own the fixed, ordered set of backend instances
//! - Apply health transitions and counter updates from probes and dispatch
//! - Provide per-instance consistent snapshots for splitting and stats

use std::time::{Duration, Instant};

use crate::backend::types::{AddressParseError, InstanceAddress};
use crate::config::InstanceConfig;
use crate::health::state::Transition;
use crate::load_balancer::instance::{Instance, InstanceId, InstanceView};
use crate::observability::metrics;

/// Where an observation came from; selects the failure threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultSource {
    Probe,
    Dispatch,
}

/// Outcome of one probe or inference call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success {
        latency: Option<Duration>,
        items: usize,
    },
    Failure,
}

impl Outcome {
    /// Successful probe.
    pub fn healthy() -> Self {
        Outcome::Success {
            latency: None,
            items: 0,
        }
    }
}

/// Consecutive failures needed before an instance is marked unhealthy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub probe: u32,
    pub dispatch: u32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            probe: 3,
            dispatch: 1,
        }
    }
}

/// Fixed set of instances and their health records.
#[derive(Debug)]
pub struct InstanceRegistry {
    instances: Vec<Instance>,
    thresholds: Thresholds,
}

impl InstanceRegistry {
    /// Build the registry; ids follow configuration order.
    pub fn new(
        configs: &[InstanceConfig],
        thresholds: Thresholds,
    ) -> Result<Self, AddressParseError> {
        let instances = configs
            .iter()
            .enumerate()
            .map(|(id, config)| {
                let address: InstanceAddress = config.address.parse()?;
                tracing::info!(instance_id = id, address = %address, "Registered instance");
                Ok(Instance::new(id, address, config.supports_adapter))
            })
            .collect::<Result<Vec<_>, AddressParseError>>()?;

        Ok(Self {
            instances,
            thresholds,
        })
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    /// Copies of every instance, in registry order.
    pub fn snapshot(&self) -> Vec<InstanceView> {
        self.instances.iter().map(Instance::view).collect()
    }

    /// Copy of a single instance.
    pub fn get(&self, id: InstanceId) -> Option<InstanceView> {
        self.instances.get(id).map(Instance::view)
    }

    pub fn address(&self, id: InstanceId) -> Option<&InstanceAddress> {
        self.instances.get(id).map(Instance::address)
    }

    /// `(id, address)` pairs of every instance, for probing.
    pub fn addresses(&self) -> Vec<(InstanceId, InstanceAddress)> {
        self.instances
            .iter()
            .map(|i| (i.id(), i.address().clone()))
            .collect()
    }

    /// Apply one observation to an instance. Returns `None` for an unknown id.
    pub fn mark_result(
        &self,
        id: InstanceId,
        source: ResultSource,
        outcome: Outcome,
    ) -> Option<Transition> {
        let instance = self.instances.get(id)?;
        let now = Instant::now();

        let (transition, failures) = {
            let mut record = instance.record();
            record.last_checked_at = Some(now);

            let transition = match outcome {
                Outcome::Success { latency, items } => {
                    record.last_success_at = Some(now);
                    if source == ResultSource::Dispatch {
                        record.counters.requests_handled += 1;
                        record.counters.items_handled += items as u64;
                        record.counters.cumulative_latency += latency.unwrap_or_default();
                    }
                    record.tracker.record_success()
                }
                Outcome::Failure => {
                    let threshold = match source {
                        ResultSource::Probe => self.thresholds.probe,
                        ResultSource::Dispatch => {
                            record.counters.errors += 1;
                            self.thresholds.dispatch
                        }
                    };
                    record.tracker.record_failure(threshold)
                }
            };
            (transition, record.tracker.consecutive_failures())
        };

        match transition {
            Transition::BecameHealthy => {
                tracing::info!(
                    instance_id = id,
                    address = %instance.address(),
                    source = ?source,
                    "Instance became healthy"
                );
                metrics::record_instance_health(instance.address(), true);
            }
            Transition::BecameUnhealthy => {
                tracing::warn!(
                    instance_id = id,
                    address = %instance.address(),
                    source = ?source,
                    consecutive_failures = failures,
                    "Instance marked unhealthy"
                );
                metrics::record_instance_health(instance.address(), false);
            }
            Transition::Unchanged => {}
        }

        Some(transition)
    }
}
