//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap backend calls with a hard deadline
//! - Drop (cancel) the call future when the deadline passes
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are distinct from other backend errors

use std::future::Future;
use std::time::Duration;

use crate::backend::BackendError;

/// Run `call`, failing with [`BackendError::Timeout`] after `deadline`.
pub async fn with_deadline<T, F>(deadline: Duration, call: F) -> Result<T, BackendError>
where
    F: Future<Output = Result<T, BackendError>>,
{
    match tokio::time::timeout(deadline, call).await {
        Ok(result) => result,
        Err(_) => Err(BackendError::Timeout),
    }
}
