//! Dispatch coordinator.
//!
//! # Responsibilities
//! - Run every assignment of a plan concurrently, one task each
//! - Enforce the per-call deadline
//! - Re-split a failed slice across the instances still standing (once)
//! - Reassemble results into input order
//!
//! # Design Decisions
//! - Tasks return their own slice results; the joiner writes them into a
//!   pre-sized buffer by index, so no lock guards the output
//! - Each backend call updates the registry and stats exactly once
//! - A slice that cannot be served becomes error markers; the batch as a
//!   whole never fails here

use std::collections::BTreeSet;
use std::ops::Range;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use futures_util::FutureExt;
use serde_json::Value;
use tracing::Instrument;
use uuid::Uuid;

use crate::backend::{BackendError, GenerationParams, InferRequest, InstanceClient};
use crate::load_balancer::{
    split_range, Assignment, DispatchPlan, InstanceId, InstanceRegistry, NoTargets, Outcome,
    ResultSource,
};
use crate::observability::{metrics, StatsAggregator};
use crate::resilience::with_deadline;
use crate::routing::types::{enter_phase, BatchPhase, ItemResult};

/// Tunables for executing a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchPolicy {
    /// Hard deadline for one backend call.
    pub call_timeout: Duration,
    /// Re-split failed slices across the remaining instances.
    pub redistribute: bool,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(300),
            redistribute: true,
        }
    }
}

/// Everything the caller needs back from one executed plan.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    /// One entry per input item, in input order.
    pub results: Vec<ItemResult>,
    /// Distinct instances that returned at least one result.
    pub instances_used: usize,
    pub failed_items: usize,
    pub redistributed_items: usize,
}

/// Inputs shared by all assignments of one batch.
struct BatchContext {
    batch_id: Uuid,
    items: Vec<Value>,
    params: GenerationParams,
    /// Instances eligible when the plan was made.
    eligible: Vec<InstanceId>,
    /// Instances that failed during this batch, indexed by id.
    failed: Vec<AtomicBool>,
}

impl BatchContext {
    fn mark_failed(&self, id: InstanceId) {
        if let Some(flag) = self.failed.get(id) {
            flag.store(true, Ordering::SeqCst);
        }
    }

    fn has_failed(&self, id: InstanceId) -> bool {
        self.failed
            .get(id)
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }
}

/// Results for a contiguous index range.
struct Segment {
    range: Range<usize>,
    served_by: Option<InstanceId>,
    results: Vec<ItemResult>,
}

impl Segment {
    fn served(range: Range<usize>, instance_id: InstanceId, values: Vec<Value>) -> Self {
        Self {
            range,
            served_by: Some(instance_id),
            results: values.into_iter().map(ItemResult::Ok).collect(),
        }
    }

    fn unavailable(range: Range<usize>, reason: &str) -> Self {
        let results = range.clone().map(|_| ItemResult::unavailable(reason)).collect();
        Self {
            range,
            served_by: None,
            results,
        }
    }
}

/// Segments produced by one top-level assignment.
struct SliceOutcome {
    segments: Vec<Segment>,
    redistributed: usize,
}

impl SliceOutcome {
    fn single(segment: Segment) -> Self {
        Self {
            segments: vec![segment],
            redistributed: 0,
        }
    }
}

/// Executes dispatch plans against backend instances.
pub struct DispatchCoordinator<C> {
    registry: Arc<InstanceRegistry>,
    client: Arc<C>,
    stats: Arc<StatsAggregator>,
    policy: DispatchPolicy,
}

impl<C> Clone for DispatchCoordinator<C> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            client: self.client.clone(),
            stats: self.stats.clone(),
            policy: self.policy,
        }
    }
}

impl<C: InstanceClient> DispatchCoordinator<C> {
    pub fn new(
        registry: Arc<InstanceRegistry>,
        client: Arc<C>,
        stats: Arc<StatsAggregator>,
        policy: DispatchPolicy,
    ) -> Self {
        Self {
            registry,
            client,
            stats,
            policy,
        }
    }

    /// Execute `plan` over `items`. `eligible` is the set of instances the
    /// plan was made from; redistribution never leaves it.
    pub async fn execute(
        &self,
        batch_id: Uuid,
        items: Vec<Value>,
        params: GenerationParams,
        plan: DispatchPlan,
        eligible: Vec<InstanceId>,
    ) -> DispatchOutcome {
        let total = items.len();
        let ctx = Arc::new(BatchContext {
            batch_id,
            items,
            params,
            eligible,
            failed: (0..self.registry.len()).map(|_| AtomicBool::new(false)).collect(),
        });

        let mut ranges = Vec::with_capacity(plan.len());
        let mut handles = Vec::with_capacity(plan.len());
        for assignment in plan.into_assignments() {
            let span = tracing::debug_span!(
                "assignment",
                batch_id = %batch_id,
                instance_id = assignment.instance_id
            );
            let coordinator = self.clone();
            let ctx = ctx.clone();
            ranges.push((assignment.instance_id, assignment.range.clone()));
            handles.push(tokio::spawn(
                async move { coordinator.run_assignment(&ctx, assignment).await }.instrument(span),
            ));
        }

        let mut results = vec![ItemResult::unavailable("not dispatched"); total];
        let mut served_by = BTreeSet::new();
        let mut failed_items = 0;
        let mut redistributed_items = 0;

        for ((instance_id, range), joined) in ranges.into_iter().zip(join_all(handles).await) {
            let slice = match joined {
                Ok(slice) => slice,
                Err(e) => {
                    tracing::error!(
                        batch_id = %batch_id,
                        instance_id,
                        error = %e,
                        "Assignment task aborted"
                    );
                    let error = BackendError::Transport(format!("dispatch task aborted: {e}"));
                    self.record_failure(&ctx, instance_id, range.len(), &error, Duration::ZERO);
                    self.recover(&ctx, instance_id, range, error).await
                }
            };
            redistributed_items += slice.redistributed;

            for segment in slice.segments {
                match segment.served_by {
                    Some(id) => {
                        served_by.insert(id);
                    }
                    None => failed_items += segment.results.len(),
                }
                for (slot, result) in results[segment.range].iter_mut().zip(segment.results) {
                    *slot = result;
                }
            }
        }

        self.stats.record_items_failed(failed_items);
        metrics::record_items("failed", failed_items);
        metrics::record_items("success", total - failed_items);

        DispatchOutcome {
            results,
            instances_used: served_by.len(),
            failed_items,
            redistributed_items,
        }
    }

    async fn run_assignment(&self, ctx: &BatchContext, assignment: Assignment) -> SliceOutcome {
        let Assignment { instance_id, range } = assignment;
        match self.call(ctx, instance_id, range.clone()).await {
            Ok(values) => SliceOutcome::single(Segment::served(range, instance_id, values)),
            Err(error) => self.recover(ctx, instance_id, range, error).await,
        }
    }

    /// Handle a failed first-round slice: redistribute it once, or turn it
    /// into markers. The failure itself is already recorded.
    async fn recover(
        &self,
        ctx: &BatchContext,
        instance_id: InstanceId,
        range: Range<usize>,
        error: BackendError,
    ) -> SliceOutcome {
        ctx.mark_failed(instance_id);

        if !self.policy.redistribute {
            return SliceOutcome::single(Segment::unavailable(range, &error.to_string()));
        }

        let targets = self.redistribution_targets(ctx);
        let plan = match split_range(range.clone(), &targets) {
            Ok(plan) => plan,
            Err(NoTargets) => {
                tracing::warn!(
                    batch_id = %ctx.batch_id,
                    failed_instance = instance_id,
                    items = range.len(),
                    "No instance left to take failed slice"
                );
                return SliceOutcome::single(Segment::unavailable(range, &error.to_string()));
            }
        };

        enter_phase(ctx.batch_id, BatchPhase::Retrying);
        tracing::info!(
            batch_id = %ctx.batch_id,
            failed_instance = instance_id,
            items = range.len(),
            targets = plan.len(),
            "Redistributing failed slice"
        );
        self.stats.record_redistributed(range.len());

        let mut retries = Vec::with_capacity(plan.len());
        for sub in plan.into_assignments() {
            retries.push(self.run_retry(ctx, sub));
        }

        SliceOutcome {
            segments: join_all(retries).await,
            redistributed: range.len(),
        }
    }

    /// A redistributed sub-slice gets no further retries.
    async fn run_retry(&self, ctx: &BatchContext, assignment: Assignment) -> Segment {
        let Assignment { instance_id, range } = assignment;
        match self.call(ctx, instance_id, range.clone()).await {
            Ok(values) => Segment::served(range, instance_id, values),
            Err(e) => {
                ctx.mark_failed(instance_id);
                Segment::unavailable(range, &e.to_string())
            }
        }
    }

    /// Eligible instances that have not failed in this batch and are still
    /// healthy in the registry, in registry order.
    fn redistribution_targets(&self, ctx: &BatchContext) -> Vec<InstanceId> {
        ctx.eligible
            .iter()
            .copied()
            .filter(|&id| !ctx.has_failed(id))
            .filter(|&id| self.registry.get(id).is_some_and(|v| v.is_healthy()))
            .collect()
    }

    /// One backend call for `range`, recorded in registry, stats and metrics.
    async fn call(
        &self,
        ctx: &BatchContext,
        instance_id: InstanceId,
        range: Range<usize>,
    ) -> Result<Vec<Value>, BackendError> {
        let count = range.len();
        let Some(address) = self.registry.address(instance_id).cloned() else {
            return Err(BackendError::Transport(format!("unknown instance {instance_id}")));
        };

        let request = InferRequest {
            items: ctx.items[range].to_vec(),
            params: ctx.params.clone(),
        };

        // A panicking client is a failed call like any other.
        let call = AssertUnwindSafe(self.client.infer(&address, request))
            .catch_unwind()
            .map(|caught| {
                caught.unwrap_or_else(|_| {
                    Err(BackendError::Transport("instance client panicked".into()))
                })
            });

        let start = Instant::now();
        let result = with_deadline(self.policy.call_timeout, call)
            .await
            .and_then(|values| {
                if values.len() == count {
                    Ok(values)
                } else {
                    Err(BackendError::Protocol(format!(
                        "expected {} results, got {}",
                        count,
                        values.len()
                    )))
                }
            });
        let latency = start.elapsed();

        match &result {
            Ok(_) => {
                self.registry.mark_result(
                    instance_id,
                    ResultSource::Dispatch,
                    Outcome::Success {
                        latency: Some(latency),
                        items: count,
                    },
                );
                self.stats.record_assignment(count, true);
                metrics::record_assignment(&address, "success", latency);
                tracing::debug!(
                    batch_id = %ctx.batch_id,
                    instance_id,
                    address = %address,
                    items = count,
                    latency_ms = latency.as_millis() as u64,
                    "Assignment completed"
                );
            }
            Err(e) => self.record_failure(ctx, instance_id, count, e, latency),
        }

        result
    }

    /// Record one failed backend call in registry, stats and metrics.
    fn record_failure(
        &self,
        ctx: &BatchContext,
        instance_id: InstanceId,
        items: usize,
        error: &BackendError,
        latency: Duration,
    ) {
        self.registry
            .mark_result(instance_id, ResultSource::Dispatch, Outcome::Failure);
        self.stats.record_assignment(items, false);

        let address = self.registry.address(instance_id);
        if let Some(address) = address {
            metrics::record_assignment(address, error.kind(), latency);
        }
        tracing::warn!(
            batch_id = %ctx.batch_id,
            instance_id,
            address = address.map(tracing::field::display),
            items,
            error = %error,
            "Assignment failed"
        );
    }
}
