//! Successful orchestration results.

use serde::Serialize;

use crate::providers::ProviderType;

/// A value produced by a primary provider or by a degradation fallback.
///
/// Failures are the `Err` arm of the surrounding `Result`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome<T> {
    Success {
        value: T,
        provider: ProviderType,
    },
    Degraded {
        value: T,
        fallback: ProviderType,
        original_error: String,
    },
}

impl<T> Outcome<T> {
    pub fn value(&self) -> &T {
        match self {
            Outcome::Success { value, .. } | Outcome::Degraded { value, .. } => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Outcome::Success { value, .. } | Outcome::Degraded { value, .. } => value,
        }
    }

    /// Provider that actually served the call.
    pub fn served_by(&self) -> ProviderType {
        match self {
            Outcome::Success { provider, .. } => *provider,
            Outcome::Degraded { fallback, .. } => *fallback,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Outcome::Degraded { .. })
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U> {
        match self {
            Outcome::Success { value, provider } => Outcome::Success {
                value: f(value),
                provider,
            },
            Outcome::Degraded {
                value,
                fallback,
                original_error,
            } => Outcome::Degraded {
                value: f(value),
                fallback,
                original_error,
            },
        }
    }
}
