//! Billing domain model for the subscription platform.
//!
//! This crate provides the provider-agnostic vocabulary shared by the
//! ledger, the reconciliation engine and the HTTP layer:
//! - `Provider` enum for the supported external payment processors
//! - `Money` and `PricingTable` for integer-cent plan pricing and the
//!   platform commission policy
//! - `Tier` for a user's entitlement classification
//! - `SubscriptionRecord` and `SubscriptionState` for the ledger record
//!   and its lifecycle state machine

pub mod error;
pub mod money;
pub mod plan;
pub mod provider;
pub mod subscription;

pub use error::DomainError;
pub use money::Money;
pub use plan::{PlanId, PricingTable, Tier};
pub use provider::Provider;
pub use subscription::{SubscriptionRecord, SubscriptionState, TerminalKind};
