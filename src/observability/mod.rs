//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Dispatch coordinator and router produce:
//!     → stats.rs (aggregate counters, read back through /stats)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Metrics are cheap (atomic increments)
//! - Stats are a read projection; they never feed back into routing

pub mod logging;
pub mod metrics;
pub mod stats;

pub use stats::{InstanceStats, RouterStats, StatsAggregator, StatsSummary};
