//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap provider calls and health checks with a deadline
//! - Cancel the inner future cleanly on timeout
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - A timeout is a provider failure like any other (`ProviderError::Timeout`)

use std::future::Future;
use std::time::Duration;

use crate::providers::{ProviderError, ProviderResult};

/// Run a provider future under `limit`.
pub async fn call_with_timeout<T, F>(limit: Duration, fut: F) -> ProviderResult<T>
where
    F: Future<Output = ProviderResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::Timeout(limit)),
    }
}
