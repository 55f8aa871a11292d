//! Dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! DispatchPlan + items
//!     → coordinator.rs (one task per assignment, per-call deadline)
//!     → On failure: mark instance, re-split slice over survivors (once)
//!     → Indexed reassembly into an N-length result vector
//! ```

pub mod coordinator;

pub use coordinator::{DispatchCoordinator, DispatchOutcome, DispatchPolicy};
