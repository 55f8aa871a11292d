//! Contiguous batch splitting.
//!
//! A batch of `n` items over `h` instances gets `n / h` items per
//! instance, and the first `n % h` instances take one extra. Ranges are
//! handed out in instance order, so the same input always yields the same
//! plan. Instances that would receive nothing are left out.

use std::ops::Range;

use crate::load_balancer::instance::InstanceId;

/// One instance's share of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub instance_id: InstanceId,
    /// Half-open range of input indices.
    pub range: Range<usize>,
}

impl Assignment {
    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}

/// Ordered, non-overlapping assignments covering one index range.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchPlan {
    assignments: Vec<Assignment>,
}

impl DispatchPlan {
    pub fn assignments(&self) -> &[Assignment] {
        &self.assignments
    }

    pub fn into_assignments(self) -> Vec<Assignment> {
        self.assignments
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}

/// No instance was available to take a share.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoTargets;

/// Split `[0, len)` across `instances`.
pub fn split(len: usize, instances: &[InstanceId]) -> Result<DispatchPlan, NoTargets> {
    split_range(0..len, instances)
}

/// Split `range` across `instances`, in order.
pub fn split_range(
    range: Range<usize>,
    instances: &[InstanceId],
) -> Result<DispatchPlan, NoTargets> {
    if instances.is_empty() {
        return Err(NoTargets);
    }

    let n = range.len();
    let h = instances.len();
    let base = n / h;
    let remainder = n % h;

    let mut start = range.start;
    let assignments = instances
        .iter()
        .enumerate()
        .map_while(|(i, &instance_id)| {
            let size = base + usize::from(i < remainder);
            if size == 0 {
                return None;
            }
            let assignment = Assignment {
                instance_id,
                range: start..start + size,
            };
            start += size;
            Some(assignment)
        })
        .collect();

    Ok(DispatchPlan { assignments })
}
