//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → Metrics → Providers → Orchestrator → Health monitor
//!            → Config watcher → Admin API
//!
//! Shutdown (shutdown.rs):
//!     Signal received → broadcast → admin server + watcher exit
//!                     → health monitor stopped and awaited
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then core, then listeners
//! - Every background task is awaited on shutdown

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
