//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Assignment sent to an instance:
//!     → timeouts.rs (hard per-call deadline)
//!     → On failure: dispatch coordinator redistributes the slice once
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every backend call has a deadline
//! - A timeout cancels only its own call, never sibling assignments

pub mod timeouts;

pub use timeouts::with_deadline;
