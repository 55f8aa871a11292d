//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! route_batch(items, params)
//!     → reject empty batch                      (Rejected)
//!     → snapshot registry, filter eligible      (Splitting)
//!     → split into contiguous assignments
//!     → coordinator executes the plan           (Dispatching / Retrying)
//!     → ordered results + metadata              (Aggregating → Responded)
//! ```
//!
//! # Design Decisions
//! - Batch-level errors are only ever produced before dispatch
//! - Once dispatched, a batch always answers with one entry per item

pub mod router;
pub mod types;

pub use router::BatchRouter;
pub use types::{
    BatchPhase, BatchResponse, HealthReport, InstanceHealth, ItemError, ItemResult, OverallStatus,
    RouteError,
};
