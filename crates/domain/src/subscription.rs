//! Subscription ledger records and the lifecycle state machine.

use chrono::{DateTime, Utc};
use common::UserId;
use serde::{Deserialize, Serialize};

use crate::plan::PlanId;
use crate::provider::Provider;

/// The lifecycle state of a subscription.
///
/// State transitions:
/// ```text
/// NoSubscription ──► Pending ──► Active ──┬──► Cancelled
///                                         ├──► Expired
///                                         ├──► Suspended
///                                         └──► PaymentFailed
/// ```
/// Every terminal state collapses back to `NoSubscription` once
/// reconciled: the ledger record is deleted and the user's entitlement
/// downgraded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SubscriptionState {
    /// No subscription exists for the user.
    #[default]
    NoSubscription,

    /// Checkout started, awaiting provider confirmation.
    Pending,

    /// Provider confirmed the subscription is billable.
    Active,

    /// Cancelled by the user or the provider (terminal state).
    Cancelled,

    /// Ran out its billing term without renewal (terminal state).
    Expired,

    /// Suspended provider-side (terminal state).
    Suspended,

    /// Disabled after repeated payment failure (terminal state).
    PaymentFailed,
}

impl SubscriptionState {
    /// Returns true if the subscription can become active from this state.
    pub fn can_activate(&self) -> bool {
        matches!(
            self,
            SubscriptionState::NoSubscription | SubscriptionState::Pending
        )
    }

    /// Returns true if this state ends the subscription's billable life.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SubscriptionState::Cancelled
                | SubscriptionState::Expired
                | SubscriptionState::Suspended
                | SubscriptionState::PaymentFailed
        )
    }

    /// Returns the terminal event kind for a terminal state.
    pub fn terminal_kind(&self) -> Option<TerminalKind> {
        match self {
            SubscriptionState::Cancelled => Some(TerminalKind::Cancelled),
            SubscriptionState::Expired => Some(TerminalKind::Expired),
            SubscriptionState::Suspended => Some(TerminalKind::Suspended),
            SubscriptionState::PaymentFailed => Some(TerminalKind::PaymentFailed),
            _ => None,
        }
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionState::NoSubscription => "NoSubscription",
            SubscriptionState::Pending => "Pending",
            SubscriptionState::Active => "Active",
            SubscriptionState::Cancelled => "Cancelled",
            SubscriptionState::Expired => "Expired",
            SubscriptionState::Suspended => "Suspended",
            SubscriptionState::PaymentFailed => "PaymentFailed",
        }
    }
}

impl std::fmt::Display for SubscriptionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A provider notification kind that ends a subscription's billable life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TerminalKind {
    Cancelled,
    Expired,
    Suspended,
    PaymentFailed,
}

impl TerminalKind {
    /// The reason wording used in user-facing notifications.
    pub fn reason_text(&self) -> &'static str {
        match self {
            TerminalKind::Cancelled => "Cancelled",
            TerminalKind::Expired => "Expired",
            TerminalKind::Suspended => "Suspended",
            TerminalKind::PaymentFailed => "Disabled Due To Payment Failure",
        }
    }

    /// The subscription state this event kind maps to.
    pub fn state(&self) -> SubscriptionState {
        match self {
            TerminalKind::Cancelled => SubscriptionState::Cancelled,
            TerminalKind::Expired => SubscriptionState::Expired,
            TerminalKind::Suspended => SubscriptionState::Suspended,
            TerminalKind::PaymentFailed => SubscriptionState::PaymentFailed,
        }
    }
}

impl std::fmt::Display for TerminalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.reason_text())
    }
}

/// The ledger record mapping a user to their current external
/// subscription.
///
/// At most one record exists per user at any time; installing a new one
/// replaces the old.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    /// The owning platform user.
    pub user_id: UserId,

    /// Which provider holds the subscription.
    pub provider: Provider,

    /// The provider-assigned subscriber/customer identifier.
    pub subscriber_ref: String,

    /// The provider-assigned subscription/billing-agreement identifier.
    pub subscription_ref: String,

    /// The plan the subscription is on.
    pub plan: PlanId,

    /// When the record was installed.
    pub created_at: DateTime<Utc>,

    /// Whether the subscription is currently billable.
    pub active: bool,
}

impl SubscriptionRecord {
    /// Creates an active record stamped with the current time.
    pub fn new(
        user_id: UserId,
        provider: Provider,
        subscriber_ref: impl Into<String>,
        subscription_ref: impl Into<String>,
        plan: PlanId,
    ) -> Self {
        Self {
            user_id,
            provider,
            subscriber_ref: subscriber_ref.into(),
            subscription_ref: subscription_ref.into(),
            plan,
            created_at: Utc::now(),
            active: true,
        }
    }

    /// Returns true if either external reference matches.
    pub fn matches_ref(&self, reference: &str) -> bool {
        self.subscriber_ref == reference || self.subscription_ref == reference
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_is_no_subscription() {
        assert_eq!(SubscriptionState::default(), SubscriptionState::NoSubscription);
    }

    #[test]
    fn activation_only_from_pending_or_absent() {
        assert!(SubscriptionState::NoSubscription.can_activate());
        assert!(SubscriptionState::Pending.can_activate());
        assert!(!SubscriptionState::Active.can_activate());
        assert!(!SubscriptionState::Cancelled.can_activate());
    }

    #[test]
    fn terminal_states() {
        assert!(!SubscriptionState::NoSubscription.is_terminal());
        assert!(!SubscriptionState::Pending.is_terminal());
        assert!(!SubscriptionState::Active.is_terminal());
        assert!(SubscriptionState::Cancelled.is_terminal());
        assert!(SubscriptionState::Expired.is_terminal());
        assert!(SubscriptionState::Suspended.is_terminal());
        assert!(SubscriptionState::PaymentFailed.is_terminal());
    }

    #[test]
    fn terminal_kind_mapping() {
        assert_eq!(
            SubscriptionState::Expired.terminal_kind(),
            Some(TerminalKind::Expired)
        );
        assert_eq!(SubscriptionState::Active.terminal_kind(), None);
        assert_eq!(TerminalKind::Suspended.state(), SubscriptionState::Suspended);
    }

    #[test]
    fn payment_failure_reason_wording() {
        assert_eq!(
            TerminalKind::PaymentFailed.reason_text(),
            "Disabled Due To Payment Failure"
        );
    }

    #[test]
    fn record_matches_either_reference() {
        let record = SubscriptionRecord::new(
            UserId::new(),
            Provider::Paypal,
            "CUS-123",
            "I-ABC123",
            PlanId::new("monthly"),
        );
        assert!(record.matches_ref("CUS-123"));
        assert!(record.matches_ref("I-ABC123"));
        assert!(!record.matches_ref("I-OTHER"));
        assert!(record.active);
    }

    #[test]
    fn state_serialization_roundtrip() {
        let state = SubscriptionState::PaymentFailed;
        let json = serde_json::to_string(&state).unwrap();
        let deserialized: SubscriptionState = serde_json::from_str(&json).unwrap();
        assert_eq!(state, deserialized);
    }
}
