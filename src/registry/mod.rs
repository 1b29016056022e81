//! Provider registry subsystem.
//!
//! # Data Flow
//! ```text
//! factory-built adapters
//!     → pool.rs (one ProviderHandle per ProviderType)
//!     → handle.rs (capability + CircuitBreaker + PerformanceRecord + health flag)
//!     → performance.rs (request counters, running average latency)
//! ```
//!
//! # Design Decisions
//! - Breaker and counters share one mutex per provider; never held across an await
//! - Health flag is atomic so availability checks stay cheap
//! - Registry is built once; routing order lives in the orchestrator, not here

pub mod handle;
pub mod performance;
pub mod pool;

pub use handle::{ProviderHandle, ProviderSnapshot};
pub use performance::{PerformanceRecord, PerformanceSnapshot};
pub use pool::ProviderRegistry;
