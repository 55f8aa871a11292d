//! Backend instance subsystem.
//!
//! # Data Flow
//! ```text
//! Health monitor → client.rs probe()  → GET  {instance}/health
//! Coordinator    → client.rs infer()  → POST {instance}/infer {items, params}
//!                                     ← {results} (1:1 with items)
//! ```
//!
//! # Design Decisions
//! - Instances are opaque collaborators behind the `InstanceClient` trait
//! - The HTTP implementation is the only one used in production; tests
//!   script their own

pub mod client;
#[cfg(test)]
pub(crate) mod mock;
pub mod types;

pub use client::{HttpInstanceClient, InstanceClient};
pub use types::{
    AddressParseError, BackendError, GenerationParams, InferRequest, InferResponse, InstanceAddress,
};
