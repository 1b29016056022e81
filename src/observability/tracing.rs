//! Per-call spans with correlation IDs.
//!
//! Every orchestration call gets a fresh UUID v4 `call_id` so the provider
//! attempts, breaker transitions and degradation logs of one call can be
//! grouped.

use tracing::Span;
use uuid::Uuid;

/// Span wrapping one orchestration call.
pub fn call_span(operation: &'static str) -> Span {
    tracing::info_span!("orchestrate", call_id = %Uuid::new_v4(), operation)
}
