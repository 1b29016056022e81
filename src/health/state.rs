//! Provider health flag.
//!
//! # States
//! - Unknown: never checked, still receives traffic
//! - Healthy: last check passed
//! - Unhealthy: last check failed, excluded from selection
//!
//! # Design Decisions
//! - Independent of circuit-breaker state
//! - Stored as an `AtomicU8` on the handle so readers never lock

use std::fmt;

use serde::{Deserialize, Serialize};

/// Last known health evaluation of a provider.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderStatus {
    Unknown = 0,
    Healthy = 1,
    Unhealthy = 2,
}

impl ProviderStatus {
    /// Unknown counts as healthy until a check says otherwise.
    pub fn is_healthy(self) -> bool {
        self != ProviderStatus::Unhealthy
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProviderStatus::Unknown => "unknown",
            ProviderStatus::Healthy => "healthy",
            ProviderStatus::Unhealthy => "unhealthy",
        }
    }
}

impl From<u8> for ProviderStatus {
    fn from(val: u8) -> Self {
        match val {
            1 => ProviderStatus::Healthy,
            2 => ProviderStatus::Unhealthy,
            _ => ProviderStatus::Unknown,
        }
    }
}

impl fmt::Display for ProviderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_counts_as_healthy() {
        assert!(ProviderStatus::Unknown.is_healthy());
        assert!(ProviderStatus::Healthy.is_healthy());
        assert!(!ProviderStatus::Unhealthy.is_healthy());
    }

    #[test]
    fn test_round_trip_through_u8() {
        for status in [ProviderStatus::Unknown, ProviderStatus::Healthy, ProviderStatus::Unhealthy] {
            assert_eq!(ProviderStatus::from(status as u8), status);
        }
        assert_eq!(ProviderStatus::from(42), ProviderStatus::Unknown);
    }
}
