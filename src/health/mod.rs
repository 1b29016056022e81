//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Periodic timer
//!     → Probe each provider (health_check under timeout)
//!     → Healthy: flag healthy, clear degradation entry
//!     → Unhealthy / timeout: flag unhealthy, record breaker failure
//!
//! Health flag (state.rs):
//!     Unknown → Healthy ←→ Unhealthy
//! ```
//!
//! # Design Decisions
//! - The flag is independent of the circuit breaker; both gate selection
//! - Failed orchestration calls do not flip the flag; only probes do
//! - The monitor stops cooperatively and its stop is awaited

pub mod active;
pub mod state;

pub use active::{check_provider, HealthMonitor, HealthMonitorHandle};
pub use state::ProviderStatus;
