//! Inbound provider webhook events.

use domain::TerminalKind;
use serde::Deserialize;

/// A provider notification as delivered to the webhook endpoint.
///
/// Providers send a JSON body carrying at minimum an event-type string
/// and a resource object with the external subscription or
/// billing-agreement id. Unrecognized event types are acknowledged and
/// ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub event_type: String,

    #[serde(default)]
    pub resource: WebhookResource,
}

/// The resource object inside a webhook payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookResource {
    /// External subscription id.
    #[serde(default)]
    pub id: Option<String>,

    /// Billing agreement id, reported by renewal notifications.
    #[serde(default)]
    pub billing_agreement_id: Option<String>,
}

/// Classification of a webhook event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// The subscription is no longer billable.
    Terminal(TerminalKind),

    /// A recurring payment completed; the subscription continues.
    PaymentCompleted,

    /// Anything else, acknowledged and ignored.
    Unrecognized,
}

impl WebhookEvent {
    /// Classifies the event type string.
    pub fn kind(&self) -> EventKind {
        match self.event_type.as_str() {
            "BILLING.SUBSCRIPTION.CANCELLED" => EventKind::Terminal(TerminalKind::Cancelled),
            "BILLING.SUBSCRIPTION.EXPIRED" => EventKind::Terminal(TerminalKind::Expired),
            "BILLING.SUBSCRIPTION.SUSPENDED" => EventKind::Terminal(TerminalKind::Suspended),
            "BILLING.SUBSCRIPTION.PAYMENT.FAILED" => {
                EventKind::Terminal(TerminalKind::PaymentFailed)
            }
            "PAYMENT.SALE.COMPLETED" => EventKind::PaymentCompleted,
            _ => EventKind::Unrecognized,
        }
    }

    /// The id used to locate the affected subscription.
    pub fn subscription_ref(&self) -> Option<&str> {
        self.resource.id.as_deref()
    }

    /// The id reported by renewal notifications, falling back to the
    /// resource id for providers that don't report a separate
    /// billing-agreement id.
    pub fn billing_ref(&self) -> Option<&str> {
        self.resource
            .billing_agreement_id
            .as_deref()
            .or(self.resource.id.as_deref())
    }
}
