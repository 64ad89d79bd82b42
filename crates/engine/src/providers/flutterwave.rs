//! Flutterwave subscriptions via REST API.
//!
//! The original integration went through Flutterwave's vendor SDK; the
//! SDK is a thin wrapper over these endpoints, so the adapter calls them
//! directly.

use async_trait::async_trait;
use domain::{Money, PlanId, Provider, SubscriptionState};
use serde_json::json;

use super::{
    AdapterError, Checkout, CustomerProfile, ProviderAdapter, ProviderSubscription,
    REQUEST_TIMEOUT, check_numeric_reference, into_json, require_str,
};

const API_BASE: &str = "https://api.flutterwave.com/v3";

/// Adapter for Flutterwave payment-plan subscriptions.
///
/// Authenticates with the secret key as a bearer token. Subscription ids
/// are numeric; lookups also accept the customer email, which is what
/// Flutterwave's own listing endpoint filters on.
pub struct FlutterwaveAdapter {
    client: reqwest::Client,
    secret_key: String,
    redirect_url: String,
}

impl FlutterwaveAdapter {
    /// Creates a Flutterwave adapter from the secret key and the website
    /// base URL for post-payment redirects.
    pub fn new(secret_key: impl Into<String>, website_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            secret_key: secret_key.into(),
            redirect_url: format!("{website_url}/payment-success"),
        }
    }

    fn subscription_state(status: &str) -> SubscriptionState {
        match status {
            "active" => SubscriptionState::Active,
            "cancelled" => SubscriptionState::Cancelled,
            _ => SubscriptionState::Pending,
        }
    }

    fn parse_subscription(item: &serde_json::Value) -> Option<ProviderSubscription> {
        let id = item["id"].as_i64()?;
        let status = item["status"].as_str().unwrap_or("unknown");
        Some(ProviderSubscription {
            provider: Provider::Flutterwave,
            subscriber_ref: item
                .pointer("/customer/customer_email")
                .and_then(|v| v.as_str())
                .map(String::from),
            subscription_ref: id.to_string(),
            plan: item["plan"].as_i64().map(|p| PlanId::new(p.to_string())),
            state: Self::subscription_state(status),
            provider_status: status.to_string(),
        })
    }

    /// Finds a subscription in the account listing by numeric id or
    /// customer email.
    async fn find_subscription(
        &self,
        reference: &str,
    ) -> Result<Option<ProviderSubscription>, AdapterError> {
        let mut request = self
            .client
            .get(format!("{API_BASE}/subscriptions"))
            .timeout(REQUEST_TIMEOUT)
            .bearer_auth(&self.secret_key);

        if reference.contains('@') {
            request = request.query(&[("email", reference)]);
        } else {
            check_numeric_reference(reference)?;
        }

        let body = into_json(request.send().await?).await?;
        let items = body["data"]
            .as_array()
            .ok_or_else(|| AdapterError::Malformed("missing field /data".to_string()))?;

        Ok(items
            .iter()
            .filter_map(Self::parse_subscription)
            .find(|sub| {
                sub.subscription_ref == reference
                    || sub.subscriber_ref.as_deref() == Some(reference)
            }))
    }
}

#[async_trait]
impl ProviderAdapter for FlutterwaveAdapter {
    fn provider(&self) -> Provider {
        Provider::Flutterwave
    }

    async fn create(
        &self,
        plan: &PlanId,
        cost: Money,
        customer: &CustomerProfile,
    ) -> Result<Checkout, AdapterError> {
        let tx_ref = format!("sub-{}", uuid::Uuid::new_v4());
        let payload = json!({
            "tx_ref": tx_ref,
            "amount": cost.cents() as f64 / 100.0,
            "currency": "USD",
            "redirect_url": self.redirect_url,
            "payment_plan": plan.as_str(),
            "customer": {
                "email": customer.email,
                "name": customer.display_name(),
            },
        });

        let response = self
            .client
            .post(format!("{API_BASE}/payments"))
            .timeout(REQUEST_TIMEOUT)
            .bearer_auth(&self.secret_key)
            .json(&payload)
            .send()
            .await?;

        let body = into_json(response).await?;
        Ok(Checkout::redirect(tx_ref, require_str(&body, "/data/link")?))
    }

    async fn retrieve(&self, reference: &str) -> Result<ProviderSubscription, AdapterError> {
        self.find_subscription(reference).await?.ok_or_else(|| {
            AdapterError::Rejected {
                status: 404,
                message: format!("no subscription matching {reference}"),
            }
        })
    }

    async fn cancel(&self, reference: &str) -> Result<(), AdapterError> {
        check_numeric_reference(reference)?;

        // Already gone or already terminal satisfies the caller's intent.
        match self.find_subscription(reference).await? {
            None => return Ok(()),
            Some(details) if details.state.is_terminal() => return Ok(()),
            Some(_) => {}
        }

        let response = self
            .client
            .put(format!("{API_BASE}/subscriptions/{reference}/cancel"))
            .timeout(REQUEST_TIMEOUT)
            .bearer_auth(&self.secret_key)
            .send()
            .await?;
        into_json(response).await?;
        Ok(())
    }

    async fn update_plan(
        &self,
        _reference: &str,
        _new_plan: &PlanId,
    ) -> Result<ProviderSubscription, AdapterError> {
        // No in-place plan change; subscribers re-checkout instead.
        Err(AdapterError::Unsupported)
    }
}
