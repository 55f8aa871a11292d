//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe every instance, all probes of a round concurrently
//! - Feed each outcome into the registry

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};

use crate::backend::InstanceClient;
use crate::config::HealthCheckConfig;
use crate::load_balancer::{InstanceRegistry, Outcome, ResultSource};
use crate::resilience::with_deadline;

pub struct HealthMonitor<C> {
    registry: Arc<InstanceRegistry>,
    client: Arc<C>,
    interval: Duration,
    timeout: Duration,
}

impl<C: InstanceClient> HealthMonitor<C> {
    pub fn new(
        registry: Arc<InstanceRegistry>,
        client: Arc<C>,
        config: &HealthCheckConfig,
    ) -> Self {
        Self {
            registry,
            client,
            interval: Duration::from_secs(config.interval_secs),
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }

    /// Probe on every tick until shutdown. The first round runs immediately.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            timeout_ms = self.timeout.as_millis() as u64,
            instances = self.registry.len(),
            "Health monitor starting"
        );

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_all().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Run one probe round. Failures are not retried within the round.
    pub async fn check_all(&self) {
        let probes = self
            .registry
            .addresses()
            .into_iter()
            .map(|(id, address)| async move {
                let result = with_deadline(self.timeout, self.client.probe(&address)).await;
                (id, address, result)
            });

        for (id, address, result) in join_all(probes).await {
            let outcome = match result {
                Ok(()) => Outcome::healthy(),
                Err(e) => {
                    tracing::debug!(
                        instance_id = id,
                        address = %address,
                        error = %e,
                        "Health probe failed"
                    );
                    Outcome::Failure
                }
            };
            self.registry.mark_result(id, ResultSource::Probe, outcome);
        }
    }
}
