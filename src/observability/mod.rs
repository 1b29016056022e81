//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!     → tracing.rs (per-call spans with correlation IDs)
//!     → errors.rs (error counts and recent history for the admin dashboard)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Call ID flows through every provider attempt of a call
//! - Metrics are cheap (no-op without a recorder)

pub mod errors;
pub mod logging;
pub mod metrics;
pub mod tracing;
