//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to provider:
//!     → circuit_breaker.rs (gate: may this provider be tried?)
//!     → timeouts.rs (enforce provider call deadline)
//!     → On failure: circuit_breaker.rs (count, open if threshold reached)
//!     → backoff.rs (sleep between failover rounds)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every provider call has a deadline
//! - Circuit breaker prevents hammering a failing provider
//! - Backoff is a pure schedule; the orchestrator owns the loop

pub mod backoff;
pub mod circuit_breaker;
pub mod timeouts;

pub use backoff::RetryPolicy;
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerStatus, CircuitState};
pub use timeouts::call_with_timeout;
