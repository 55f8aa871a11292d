//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, trace, timeout, body limit)
//!     → request.rs (decode InferenceRequest)
//!     → BatchRouter (route_batch / health / stats / refresh)
//!     → response.rs (status mapping, JSON body)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{InferenceRequest, X_REQUEST_ID};
pub use server::HttpServer;
