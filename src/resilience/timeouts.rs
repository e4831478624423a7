//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap backend calls with a deadline
//! - Turn an elapsed deadline into a distinct, classifiable error
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities; the losing future is dropped, so a
//!   late response can never mutate state
//! - Timeout errors are distinct from other errors (`BackendError::Timeout`)

use std::future::Future;
use std::time::Duration;

use tokio::time::timeout;

use crate::resilience::error::BackendError;

/// Run `call` with a hard deadline.
pub async fn with_deadline<F, T>(limit: Duration, call: F) -> Result<T, BackendError>
where
    F: Future<Output = Result<T, BackendError>>,
{
    match timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(BackendError::Timeout { after: limit }),
    }
}
