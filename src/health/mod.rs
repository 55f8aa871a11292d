//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Periodic timer
//!     → Probe every instance concurrently
//!     → registry.mark_result(Probe, ...)
//!
//! Request-path failures (dispatch coordinator):
//!     Backend call fails or times out
//!     → registry.mark_result(Dispatch, Failure)
//!
//! State machine (state.rs):
//!     Unknown → Healthy ←→ Unhealthy
//!     Failure threshold chosen per observation source
//! ```
//!
//! # Design Decisions
//! - The monitor never runs on behalf of a batch request
//! - A single success restores Healthy
//! - Health state is per-instance

pub mod active;
pub mod state;

pub use active::HealthMonitor;
pub use state::{HealthState, HealthTracker, Transition};
