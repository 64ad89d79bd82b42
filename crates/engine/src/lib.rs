//! Reconciliation engine for multi-provider subscription billing.
//!
//! This crate keeps a user's billing state consistent across five
//! external payment providers. User actions (checkout, activation,
//! cancellation, plan change) and inbound provider webhooks enter the
//! `ReconciliationEngine`, which consults the relevant `ProviderAdapter`
//! for provider truth, updates the `Ledger`, adjusts the user's
//! entitlement tier, accrues the platform commission and dispatches a
//! notification.
//!
//! Provider quirks (auth schemes, payload shapes, identifier formats)
//! are encapsulated entirely inside the adapters and never leak into the
//! engine.

pub mod error;
pub mod event;
pub mod notify;
pub mod providers;
pub mod reconciler;

pub use error::EngineError;
pub use event::{EventKind, WebhookEvent, WebhookResource};
pub use notify::{InMemoryNotifier, Notifier, NotifyError, SentMessage, TracingNotifier};
pub use providers::{
    AdapterError, Checkout, CustomerProfile, FlutterwaveAdapter, InMemoryProviderAdapter,
    PaypalAdapter, PaystackAdapter, ProviderAdapter, ProviderRegistry, ProviderSubscription,
    RazorpayAdapter, StripeAdapter,
};
pub use reconciler::{ReconciliationEngine, StatusReport, WebhookOutcome};
