//! Domain error types.

use thiserror::Error;

/// Errors raised by domain-level validation.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The plan identifier is not one the platform sells.
    #[error("Unknown plan identifier: {0}")]
    UnknownPlan(String),

    /// The provider name is not one the platform integrates with.
    #[error("Unknown payment provider: {0}")]
    UnknownProvider(String),
}
