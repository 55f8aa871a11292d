//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Batch of N items
//!     → registry.rs (snapshot instance health)
//!     → filter to Healthy (and adapter-capable, if requested)
//!     → splitter.rs (contiguous ranges, ±1 item per instance)
//!     → DispatchPlan handed to the dispatch coordinator
//! ```
//!
//! # Design Decisions
//! - Splitting is a pure function of item count and instance order
//! - The registry is the only state shared between the health monitor and
//!   request handling; every update goes through `mark_result`
//! - Unhealthy and never-probed instances receive no traffic

pub mod instance;
pub mod registry;
pub mod splitter;

pub use instance::{Counters, Instance, InstanceId, InstanceView};
pub use registry::{InstanceRegistry, Outcome, ResultSource, Thresholds};
pub use splitter::{split, split_range, Assignment, DispatchPlan, NoTargets};
