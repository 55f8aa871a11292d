//! Instance health state machine.
//!
//! # States
//! - Unknown: never observed; excluded from splitting
//! - Healthy: instance receives traffic
//! - Unhealthy: instance excluded from splitting and redistribution
//!
//! # State Transitions
//! ```text
//! any       → Healthy:   one success (failures reset to 0)
//! Unknown   → Unhealthy: consecutive failures >= threshold
//! Healthy   → Unhealthy: consecutive failures >= threshold
//! ```
//!
//! The threshold is supplied per observation: probes use a higher one
//! to ride out network blips, request-path failures a lower one.

use serde::Serialize;

/// Health of one instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    #[default]
    Unknown,
    Healthy,
    Unhealthy,
}

/// State change caused by a single observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Unchanged,
    BecameHealthy,
    BecameUnhealthy,
}

/// Consecutive-failure tracker for one instance.
#[derive(Debug, Clone, Default)]
pub struct HealthTracker {
    state: HealthState,
    consecutive_failures: u32,
}

impl HealthTracker {
    pub fn state(&self) -> HealthState {
        self.state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Record a successful probe or request.
    pub fn record_success(&mut self) -> Transition {
        self.consecutive_failures = 0;
        if self.state == HealthState::Healthy {
            return Transition::Unchanged;
        }
        self.state = HealthState::Healthy;
        Transition::BecameHealthy
    }

    /// Record a failed probe or request.
    pub fn record_failure(&mut self, threshold: u32) -> Transition {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        if self.state == HealthState::Unhealthy || self.consecutive_failures < threshold.max(1) {
            return Transition::Unchanged;
        }
        self.state = HealthState::Unhealthy;
        Transition::BecameUnhealthy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_unknown() {
        let tracker = HealthTracker::default();
        assert_eq!(tracker.state(), HealthState::Unknown);
        assert_eq!(tracker.consecutive_failures(), 0);
    }

    #[test]
    fn test_repeated_success_is_idempotent() {
        let mut tracker = HealthTracker::default();
        assert_eq!(tracker.record_success(), Transition::BecameHealthy);
        for _ in 0..5 {
            assert_eq!(tracker.record_success(), Transition::Unchanged);
            assert_eq!(tracker.state(), HealthState::Healthy);
            assert_eq!(tracker.consecutive_failures(), 0);
        }
    }

    #[test]
    fn test_failures_flip_exactly_once_at_threshold() {
        let mut tracker = HealthTracker::default();
        tracker.record_success();

        let mut flips = 0;
        for expected in 1..=6u32 {
            if tracker.record_failure(3) == Transition::BecameUnhealthy {
                flips += 1;
            }
            assert_eq!(tracker.consecutive_failures(), expected);
            let want = if expected < 3 { HealthState::Healthy } else { HealthState::Unhealthy };
            assert_eq!(tracker.state(), want);
        }
        assert_eq!(flips, 1);
    }

    #[test]
    fn test_single_success_recovers() {
        let mut tracker = HealthTracker::default();
        assert_eq!(tracker.record_failure(1), Transition::BecameUnhealthy);
        assert_eq!(tracker.record_success(), Transition::BecameHealthy);
        assert_eq!(tracker.consecutive_failures(), 0);
    }

    #[test]
    fn test_success_resets_failure_streak() {
        let mut tracker = HealthTracker::default();
        tracker.record_success();
        tracker.record_failure(3);
        tracker.record_failure(3);
        tracker.record_success();
        tracker.record_failure(3);
        assert_eq!(tracker.state(), HealthState::Healthy);
        assert_eq!(tracker.consecutive_failures(), 1);
    }
}
