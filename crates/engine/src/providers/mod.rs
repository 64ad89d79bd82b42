//! Payment provider adapters.
//!
//! Each adapter translates the uniform operation set (`create`,
//! `retrieve`, `cancel`, `update_plan`) into one provider's API calls.
//! Authentication schemes, payload shapes and identifier formats stay
//! inside the adapter; the engine dispatches on the `Provider` enum via
//! the `ProviderRegistry` and sees only provider-agnostic types.

pub mod flutterwave;
pub mod memory;
pub mod paypal;
pub mod paystack;
pub mod razorpay;
pub mod stripe;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use domain::{Money, PlanId, Provider, SubscriptionState};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use flutterwave::FlutterwaveAdapter;
pub use memory::InMemoryProviderAdapter;
pub use paypal::PaypalAdapter;
pub use paystack::PaystackAdapter;
pub use razorpay::RazorpayAdapter;
pub use stripe::StripeAdapter;

/// Bound on every outbound provider call. Timeouts surface as
/// `AdapterError::Unavailable`, never silent success.
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors raised by a provider adapter.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Network failure or timeout reaching the provider.
    #[error("provider unreachable: {0}")]
    Unavailable(reqwest::Error),

    /// The provider answered with a non-success status.
    #[error("request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The reference failed the provider's allow-list pattern and was
    /// never sent.
    #[error("invalid external reference: {0}")]
    InvalidReference(String),

    /// The provider's API has no such operation.
    #[error("operation not supported by this provider")]
    Unsupported,

    /// The provider answered 2xx but the body was not what its API
    /// documents.
    #[error("malformed provider response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for AdapterError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            AdapterError::Malformed(e.to_string())
        } else {
            AdapterError::Unavailable(e)
        }
    }
}

/// Customer details supplied when starting a checkout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomerProfile {
    pub email: String,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub surname: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

impl CustomerProfile {
    /// Full display name, falling back to the email address.
    pub fn display_name(&self) -> String {
        match (&self.given_name, &self.surname) {
            (Some(given), Some(sur)) => format!("{given} {sur}"),
            (Some(given), None) => given.clone(),
            _ => self.email.clone(),
        }
    }
}

/// Result of beginning a checkout with a provider.
#[derive(Debug, Clone, Serialize)]
pub struct Checkout {
    /// The provider-assigned reference for the new checkout or
    /// subscription.
    pub reference: String,

    /// Hosted page the customer must complete, for redirect providers.
    pub redirect_url: Option<String>,

    /// Client secret for providers confirming in-page instead.
    pub client_secret: Option<String>,
}

impl Checkout {
    /// A checkout completed by redirecting the customer to a hosted page.
    pub fn redirect(reference: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            redirect_url: Some(url.into()),
            client_secret: None,
        }
    }
}

/// Provider-side subscription details.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderSubscription {
    pub provider: Provider,

    /// Subscriber/customer id, where the provider reports one.
    pub subscriber_ref: Option<String>,

    /// Subscription id.
    pub subscription_ref: String,

    /// The plan the provider says the subscription is on.
    pub plan: Option<PlanId>,

    /// Provider status normalized onto the lifecycle state machine.
    pub state: SubscriptionState,

    /// The raw provider status string, for operators.
    pub provider_status: String,
}

/// Uniform operation set implemented once per provider.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// The provider this adapter talks to.
    fn provider(&self) -> Provider;

    /// Begins a new subscription/checkout. `cost` is the full plan cost,
    /// for providers whose checkout API wants an explicit amount.
    async fn create(
        &self,
        plan: &PlanId,
        cost: Money,
        customer: &CustomerProfile,
    ) -> Result<Checkout, AdapterError>;

    /// Fetches current provider-side state for a subscription.
    async fn retrieve(&self, reference: &str) -> Result<ProviderSubscription, AdapterError>;

    /// Requests termination. Idempotent: cancelling an already-cancelled
    /// subscription is not a fatal error.
    async fn cancel(&self, reference: &str) -> Result<(), AdapterError>;

    /// In-place plan change, where the provider supports it.
    async fn update_plan(
        &self,
        reference: &str,
        new_plan: &PlanId,
    ) -> Result<ProviderSubscription, AdapterError>;
}

/// Dispatch table from provider enum to adapter.
///
/// The engine selects the adapter with the `provider` field stored on
/// the ledger record.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    adapters: HashMap<Provider, Arc<dyn ProviderAdapter>>,
}

impl ProviderRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an adapter under its own provider key.
    pub fn register(&mut self, adapter: Arc<dyn ProviderAdapter>) {
        self.adapters.insert(adapter.provider(), adapter);
    }

    /// Builder-style registration.
    pub fn with(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.register(adapter);
        self
    }

    /// Looks up the adapter for a provider.
    pub fn get(&self, provider: Provider) -> Option<Arc<dyn ProviderAdapter>> {
        self.adapters.get(&provider).cloned()
    }

    /// The providers that currently have an adapter configured.
    pub fn providers(&self) -> Vec<Provider> {
        let mut providers: Vec<_> = self.adapters.keys().copied().collect();
        providers.sort_by_key(|p| p.as_str());
        providers
    }
}

/// Validates an externally supplied identifier against a provider's
/// allow-list pattern before it is interpolated into a request URL.
///
/// The identifier must carry one of the expected prefixes followed by a
/// non-empty run of `[A-Za-z0-9_-]`. Anything else is rejected without
/// an outbound call, closing off request forgery through
/// attacker-controlled identifiers.
pub(crate) fn check_reference(reference: &str, prefixes: &[&str]) -> Result<(), AdapterError> {
    let acceptable = reference.len() <= 128
        && prefixes.iter().any(|prefix| {
            reference.strip_prefix(prefix).is_some_and(|rest| {
                !rest.is_empty()
                    && rest
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
            })
        });

    if acceptable {
        Ok(())
    } else {
        Err(AdapterError::InvalidReference(reference.to_string()))
    }
}

/// Validates a purely numeric identifier.
pub(crate) fn check_numeric_reference(reference: &str) -> Result<(), AdapterError> {
    if !reference.is_empty()
        && reference.len() <= 32
        && reference.chars().all(|c| c.is_ascii_digit())
    {
        Ok(())
    } else {
        Err(AdapterError::InvalidReference(reference.to_string()))
    }
}

/// Resolves a 2xx response to its JSON body, mapping non-success
/// statuses to `Rejected`.
pub(crate) async fn into_json(
    response: reqwest::Response,
) -> Result<serde_json::Value, AdapterError> {
    let status = response.status();
    if !status.is_success() {
        let mut message = response.text().await.unwrap_or_default();
        message.truncate(512);
        return Err(AdapterError::Rejected {
            status: status.as_u16(),
            message,
        });
    }
    Ok(response.json().await?)
}

/// Extracts a required string field from a provider response.
pub(crate) fn require_str<'a>(
    body: &'a serde_json::Value,
    pointer: &str,
) -> Result<&'a str, AdapterError> {
    body.pointer(pointer)
        .and_then(|v| v.as_str())
        .ok_or_else(|| AdapterError::Malformed(format!("missing field {pointer}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_reference_accepts_well_formed_ids() {
        assert!(check_reference("sub_1AbC9xYz", &["sub_"]).is_ok());
        assert!(check_reference("I-BW452GLLEP1G", &["I-"]).is_ok());
        assert!(check_reference("SUB_vsyqdmlzble3uii", &["SUB_"]).is_ok());
    }

    #[test]
    fn check_reference_rejects_forged_ids() {
        assert!(check_reference("sub_abc/../../admin", &["sub_"]).is_err());
        assert!(check_reference("sub_abc?expand=all", &["sub_"]).is_err());
        assert!(check_reference("https://evil.example", &["sub_"]).is_err());
        assert!(check_reference("sub_", &["sub_"]).is_err());
        assert!(check_reference("", &["sub_"]).is_err());
        assert!(check_reference("cs_123", &["sub_"]).is_err());
    }

    #[test]
    fn check_reference_rejects_overlong_ids() {
        let long = format!("sub_{}", "a".repeat(200));
        assert!(check_reference(&long, &["sub_"]).is_err());
    }

    #[test]
    fn numeric_reference_check() {
        assert!(check_numeric_reference("12345").is_ok());
        assert!(check_numeric_reference("12a45").is_err());
        assert!(check_numeric_reference("").is_err());
    }

    #[test]
    fn registry_dispatches_on_provider() {
        let registry = ProviderRegistry::new()
            .with(Arc::new(InMemoryProviderAdapter::new(Provider::Stripe)))
            .with(Arc::new(InMemoryProviderAdapter::new(Provider::Paypal)));

        assert!(registry.get(Provider::Stripe).is_some());
        assert!(registry.get(Provider::Paypal).is_some());
        assert!(registry.get(Provider::Razorpay).is_none());
        assert_eq!(
            registry.providers(),
            vec![Provider::Paypal, Provider::Stripe]
        );
    }

    #[test]
    fn display_name_falls_back_to_email() {
        let profile = CustomerProfile {
            email: "a@example.com".to_string(),
            ..Default::default()
        };
        assert_eq!(profile.display_name(), "a@example.com");

        let named = CustomerProfile {
            email: "a@example.com".to_string(),
            given_name: Some("Ada".to_string()),
            surname: Some("Lovelace".to_string()),
            ..Default::default()
        };
        assert_eq!(named.display_name(), "Ada Lovelace");
    }
}
