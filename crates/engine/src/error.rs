//! Engine error types.

use domain::{DomainError, Provider};
use ledger::LedgerError;
use thiserror::Error;

use crate::providers::AdapterError;

/// Errors that can occur during reconciliation operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A provider adapter call failed. The provider name is attached so
    /// operators can distinguish the failure source.
    #[error("{provider} error: {source}")]
    Provider {
        provider: Provider,
        #[source]
        source: AdapterError,
    },

    /// No adapter is configured for the requested provider.
    #[error("No adapter configured for provider {0}")]
    ProviderNotConfigured(Provider),

    /// An explicit lookup found nothing. Webhook paths never raise this;
    /// they treat a lookup miss as a reconciled no-op.
    #[error("Not found: {0}")]
    RecordNotFound(String),

    /// The ledger and the provider disagree. Reported for manual
    /// resolution; the engine does not attempt automatic correction.
    #[error("Inconsistent state: {0}")]
    InconsistentState(String),

    /// Domain validation error.
    #[error("Validation error: {0}")]
    Domain(#[from] DomainError),

    /// Ledger error.
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

impl EngineError {
    /// Wraps an adapter error with the provider it came from.
    pub fn provider(provider: Provider, source: AdapterError) -> Self {
        EngineError::Provider { provider, source }
    }
}

/// Convenience type alias for engine results.
pub type Result<T> = std::result::Result<T, EngineError>;
