//! Batch routing facade.
//!
//! # Responsibilities
//! - Reject empty batches and batches with nowhere to go
//! - Split the batch over the eligible healthy instances
//! - Hand the plan to the dispatch coordinator and wrap the outcome
//! - Expose health and stats projections
//!
//! # Design Decisions
//! - Eligibility is decided once, from a single registry snapshot
//! - Rejections happen before any backend is contacted
//! - Health probing is never triggered by batch traffic; `refresh_health`
//!   is an explicit operator action

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use uuid::Uuid;

use crate::backend::{GenerationParams, HttpInstanceClient, InstanceClient};
use crate::dispatch::{DispatchCoordinator, DispatchPolicy};
use crate::health::HealthMonitor;
use crate::load_balancer::{split, InstanceId, InstanceRegistry, NoTargets};
use crate::observability::{metrics, RouterStats, StatsAggregator};
use crate::routing::types::{enter_phase, BatchPhase, BatchResponse, HealthReport, RouteError};

pub struct BatchRouter<C = HttpInstanceClient> {
    registry: Arc<InstanceRegistry>,
    coordinator: DispatchCoordinator<C>,
    monitor: Arc<HealthMonitor<C>>,
    stats: Arc<StatsAggregator>,
}

impl<C: InstanceClient> BatchRouter<C> {
    pub fn new(
        registry: Arc<InstanceRegistry>,
        client: Arc<C>,
        monitor: Arc<HealthMonitor<C>>,
        policy: DispatchPolicy,
    ) -> Self {
        let stats = Arc::new(StatsAggregator::new());
        let coordinator = DispatchCoordinator::new(registry.clone(), client, stats.clone(), policy);
        Self {
            registry,
            coordinator,
            monitor,
            stats,
        }
    }

    pub fn registry(&self) -> &Arc<InstanceRegistry> {
        &self.registry
    }

    /// Route one batch. `results[i]` of the response always answers
    /// `items[i]`; per-item failures are markers, never a batch error.
    pub async fn route_batch(
        &self,
        items: Vec<Value>,
        params: GenerationParams,
    ) -> Result<BatchResponse, RouteError> {
        let batch_id = Uuid::new_v4();
        let start = Instant::now();
        enter_phase(batch_id, BatchPhase::Received);

        if items.is_empty() {
            return Err(self.reject(batch_id, start, RouteError::EmptyBatch));
        }

        enter_phase(batch_id, BatchPhase::Splitting);
        let eligible = self.eligible_instances(params.lora_adapter.as_deref());
        let plan = match split(items.len(), &eligible) {
            Ok(plan) => plan,
            Err(NoTargets) => {
                tracing::warn!(
                    batch_id = %batch_id,
                    items = items.len(),
                    lora_adapter = ?params.lora_adapter,
                    "No healthy instance can take the batch"
                );
                return Err(self.reject(batch_id, start, RouteError::NoHealthyInstances));
            }
        };

        tracing::info!(
            batch_id = %batch_id,
            items = items.len(),
            assignments = plan.len(),
            lora_adapter = ?params.lora_adapter,
            "Routing batch"
        );

        enter_phase(batch_id, BatchPhase::Dispatching);
        let total_items = items.len();
        let lora_adapter_used = params.lora_adapter.clone();
        let outcome = self
            .coordinator
            .execute(batch_id, items, params, plan, eligible)
            .await;

        enter_phase(batch_id, BatchPhase::Aggregating);
        let response = BatchResponse {
            batch_id,
            results: outcome.results,
            lora_adapter_used,
            instances_used: outcome.instances_used,
            total_items,
            failed_items: outcome.failed_items,
            redistributed_items: outcome.redistributed_items,
        };

        let label = if response.is_partial() { "partial" } else { "success" };
        self.stats.record_batch_routed();
        metrics::record_batch(label, start);
        enter_phase(batch_id, BatchPhase::Responded);

        tracing::info!(
            batch_id = %batch_id,
            total_items,
            failed_items = response.failed_items,
            redistributed_items = response.redistributed_items,
            instances_used = response.instances_used,
            duration_ms = start.elapsed().as_millis() as u64,
            "Batch responded"
        );

        Ok(response)
    }

    pub fn health(&self) -> HealthReport {
        HealthReport::from_views(&self.registry.snapshot())
    }

    pub fn stats(&self) -> RouterStats {
        self.stats.report(&self.registry)
    }

    /// Run one probe round now and report the result.
    pub async fn refresh_health(&self) -> HealthReport {
        tracing::info!("Manual health refresh requested");
        self.monitor.check_all().await;
        self.health()
    }

    /// Healthy instances able to serve `adapter`, in registry order.
    fn eligible_instances(&self, adapter: Option<&str>) -> Vec<InstanceId> {
        self.registry
            .snapshot()
            .into_iter()
            .filter(|view| view.is_healthy() && view.can_serve(adapter))
            .map(|view| view.id)
            .collect()
    }

    fn reject(&self, batch_id: Uuid, start: Instant, error: RouteError) -> RouteError {
        self.stats.record_batch_rejected();
        metrics::record_batch("rejected", start);
        enter_phase(batch_id, BatchPhase::Rejected);
        tracing::debug!(batch_id = %batch_id, error = %error, "Batch rejected");
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::{echoed, Behavior, ScriptedClient};
    use crate::config::{HealthCheckConfig, InstanceConfig};
    use crate::health::HealthState;
    use crate::load_balancer::{Outcome, ResultSource, Thresholds};
    use crate::routing::types::{ItemResult, OverallStatus};
    use serde_json::json;

    const BASE_PORT: u16 = 8000;

    fn router_with(
        configs: Vec<InstanceConfig>,
    ) -> (BatchRouter<ScriptedClient>, Arc<ScriptedClient>) {
        let registry = Arc::new(InstanceRegistry::new(&configs, Thresholds::default()).unwrap());
        let client = Arc::new(ScriptedClient::new());
        let health = HealthCheckConfig {
            timeout_ms: 100,
            ..Default::default()
        };
        let monitor = Arc::new(HealthMonitor::new(registry.clone(), client.clone(), &health));
        let router = BatchRouter::new(registry, client.clone(), monitor, DispatchPolicy::default());
        (router, client)
    }

    fn router(n: usize) -> (BatchRouter<ScriptedClient>, Arc<ScriptedClient>) {
        let configs = (0..n)
            .map(|i| InstanceConfig::new(format!("127.0.0.1:{}", BASE_PORT as usize + i)))
            .collect();
        router_with(configs)
    }

    fn mark_healthy(router: &BatchRouter<ScriptedClient>, ids: &[InstanceId]) {
        for &id in ids {
            router
                .registry()
                .mark_result(id, ResultSource::Probe, Outcome::healthy());
        }
    }

    fn mark_down(router: &BatchRouter<ScriptedClient>, id: InstanceId) {
        let threshold = router.registry().thresholds().probe;
        for _ in 0..threshold {
            router
                .registry()
                .mark_result(id, ResultSource::Probe, Outcome::Failure);
        }
    }

    fn tagged(n: usize) -> Vec<Value> {
        (0..n).map(|i| json!({ "index": i })).collect()
    }

    #[tokio::test]
    async fn test_even_split_over_two_instances() {
        let (router, client) = router(2);
        mark_healthy(&router, &[0, 1]);

        let response = router
            .route_batch(tagged(10), GenerationParams::default())
            .await
            .unwrap();

        assert_eq!(response.results.len(), 10);
        for (i, result) in response.results.iter().enumerate() {
            let port = if i < 5 { BASE_PORT } else { BASE_PORT + 1 };
            assert_eq!(result.value(), Some(&echoed(port, &json!({ "index": i }))));
        }
        assert_eq!(response.instances_used, 2);
        assert!(!response.is_partial());

        let stats = router.stats();
        assert_eq!(stats.instances[0].items_handled, 5);
        assert_eq!(stats.instances[1].items_handled, 5);
        assert_eq!(stats.summary.items_routed, 10);
        assert_eq!(client.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_unhealthy_instance_is_skipped() {
        let (router, client) = router(2);
        mark_healthy(&router, &[0, 1]);
        mark_down(&router, 1);
        let before = router.registry().get(1).unwrap();

        let response = router
            .route_batch(tagged(4), GenerationParams::default())
            .await
            .unwrap();

        assert!(response.results.iter().all(ItemResult::is_ok));
        assert!(client.calls().iter().all(|(port, _)| *port == BASE_PORT));

        let after = router.registry().get(1).unwrap();
        assert_eq!(after.counters, before.counters);
        assert_eq!(after.consecutive_failures, before.consecutive_failures);
        assert_eq!(router.registry().get(0).unwrap().counters.items_handled, 4);
    }

    #[tokio::test]
    async fn test_empty_batch_rejected_before_registry() {
        let (router, client) = router(2);

        let err = router
            .route_batch(Vec::new(), GenerationParams::default())
            .await
            .unwrap_err();

        assert_eq!(err, RouteError::EmptyBatch);
        assert!(client.calls().is_empty());
        assert!(router
            .registry()
            .snapshot()
            .iter()
            .all(|v| v.health == HealthState::Unknown && v.last_checked_at.is_none()));
        assert_eq!(router.stats().summary.batches_rejected, 1);
    }

    #[tokio::test]
    async fn test_no_healthy_instances() {
        let (router, client) = router(3);
        mark_healthy(&router, &[0, 1, 2]);
        for id in 0..3 {
            mark_down(&router, id);
        }

        let err = router
            .route_batch(tagged(3), GenerationParams::default())
            .await
            .unwrap_err();

        assert_eq!(err, RouteError::NoHealthyInstances);
        assert!(client.calls().is_empty());

        let summary = router.stats().summary;
        assert_eq!(summary.healthy_instances, 0);
        assert_eq!(summary.unhealthy_instances, 3);
        assert_eq!(summary.batches_rejected, 1);
        assert_eq!(summary.items_routed, 0);
    }

    #[tokio::test]
    async fn test_adapter_batches_skip_incapable_instances() {
        let mut no_adapter = InstanceConfig::new(format!("127.0.0.1:{}", BASE_PORT + 1));
        no_adapter.supports_adapter = false;
        let (router, client) = router_with(vec![
            InstanceConfig::new(format!("127.0.0.1:{}", BASE_PORT)),
            no_adapter,
        ]);
        mark_healthy(&router, &[0, 1]);

        let params = GenerationParams {
            lora_adapter: Some("sql".into()),
            ..Default::default()
        };
        let response = router.route_batch(tagged(6), params).await.unwrap();

        assert_eq!(response.lora_adapter_used.as_deref(), Some("sql"));
        assert_eq!(response.instances_used, 1);
        assert!(client.calls().iter().all(|(port, _)| *port == BASE_PORT));

        // Plain batches still use both.
        let response = router
            .route_batch(tagged(6), GenerationParams::default())
            .await
            .unwrap();
        assert_eq!(response.instances_used, 2);
    }

    #[tokio::test]
    async fn test_adapter_batch_without_capable_instance() {
        let mut config = InstanceConfig::new(format!("127.0.0.1:{}", BASE_PORT));
        config.supports_adapter = false;
        let (router, _client) = router_with(vec![config]);
        mark_healthy(&router, &[0]);

        let params = GenerationParams {
            lora_adapter: Some("sql".into()),
            ..Default::default()
        };
        let err = router.route_batch(tagged(2), params).await.unwrap_err();
        assert_eq!(err, RouteError::NoHealthyInstances);
    }

    #[tokio::test]
    async fn test_order_preserved_across_uneven_latency() {
        let (router, client) = router(3);
        mark_healthy(&router, &[0, 1, 2]);
        client.set_infer(BASE_PORT, Behavior::Delay(std::time::Duration::from_millis(30)));
        client.set_infer(BASE_PORT + 1, Behavior::Delay(std::time::Duration::from_millis(10)));

        let items = tagged(11);
        let response = router
            .route_batch(items.clone(), GenerationParams::default())
            .await
            .unwrap();

        for (item, result) in items.iter().zip(&response.results) {
            assert_eq!(result.value().unwrap()["item"], *item);
        }
    }

    #[tokio::test]
    async fn test_partial_failure_reported_in_place() {
        let (router, client) = router(2);
        mark_healthy(&router, &[0, 1]);
        client.set_infer(BASE_PORT, Behavior::Fail);
        client.set_infer(BASE_PORT + 1, Behavior::Fail);

        let response = router
            .route_batch(tagged(4), GenerationParams::default())
            .await
            .unwrap();

        assert_eq!(response.results.len(), 4);
        assert!(response.results.iter().all(|r| !r.is_ok()));
        assert_eq!(response.failed_items, 4);
        assert!(response.is_partial());
        assert_eq!(router.stats().summary.batches_routed, 1);
    }

    #[tokio::test]
    async fn test_health_report_and_refresh() {
        let (router, client) = router(2);
        assert_eq!(router.health().status, OverallStatus::Unhealthy);

        client.set_probe(BASE_PORT + 1, Behavior::Fail);
        let report = router.refresh_health().await;
        assert_eq!(report.healthy_instances, 1);
        // One probe failure is below the probe threshold.
        assert_eq!(report.instances[1].health, HealthState::Unknown);

        client.set_probe(BASE_PORT + 1, Behavior::Echo);
        let report = router.refresh_health().await;
        assert_eq!(report.status, OverallStatus::Healthy);
        assert!(client.calls().is_empty());
    }
}
