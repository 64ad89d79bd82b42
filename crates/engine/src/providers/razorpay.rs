//! Razorpay subscriptions via REST API.

use async_trait::async_trait;
use domain::{Money, PlanId, Provider, SubscriptionState};
use serde_json::json;

use super::{
    AdapterError, Checkout, CustomerProfile, ProviderAdapter, ProviderSubscription,
    REQUEST_TIMEOUT, check_reference, into_json, require_str,
};

const API_BASE: &str = "https://api.razorpay.com/v1";

/// Adapter for Razorpay subscriptions.
///
/// Authenticates with the key id/secret pair as basic auth.
/// Subscription ids are `sub_` prefixed.
pub struct RazorpayAdapter {
    client: reqwest::Client,
    key_id: String,
    key_secret: String,
}

impl RazorpayAdapter {
    /// Creates a Razorpay adapter from the key id/secret pair.
    pub fn new(key_id: impl Into<String>, key_secret: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            key_id: key_id.into(),
            key_secret: key_secret.into(),
        }
    }

    fn subscription_state(status: &str) -> SubscriptionState {
        match status {
            "active" | "resumed" => SubscriptionState::Active,
            "cancelled" => SubscriptionState::Cancelled,
            "completed" | "expired" => SubscriptionState::Expired,
            "paused" => SubscriptionState::Suspended,
            "halted" | "pending" => SubscriptionState::PaymentFailed,
            _ => SubscriptionState::Pending,
        }
    }

    fn parse_subscription(
        &self,
        body: &serde_json::Value,
    ) -> Result<ProviderSubscription, AdapterError> {
        let status = require_str(body, "/status")?;
        Ok(ProviderSubscription {
            provider: Provider::Razorpay,
            subscriber_ref: body["customer_id"].as_str().map(String::from),
            subscription_ref: require_str(body, "/id")?.to_string(),
            plan: body["plan_id"].as_str().map(PlanId::new),
            state: Self::subscription_state(status),
            provider_status: status.to_string(),
        })
    }
}

#[async_trait]
impl ProviderAdapter for RazorpayAdapter {
    fn provider(&self) -> Provider {
        Provider::Razorpay
    }

    async fn create(
        &self,
        plan: &PlanId,
        _cost: Money,
        customer: &CustomerProfile,
    ) -> Result<Checkout, AdapterError> {
        let payload = json!({
            "plan_id": plan.as_str(),
            "total_count": 12,
            "quantity": 1,
            "customer_notify": 1,
            "notes": {
                "address": customer.address.as_deref().unwrap_or_default(),
            },
            "notify_info": {
                "notify_email": customer.email,
            }
        });

        let response = self
            .client
            .post(format!("{API_BASE}/subscriptions"))
            .timeout(REQUEST_TIMEOUT)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&payload)
            .send()
            .await?;

        let body = into_json(response).await?;
        Ok(Checkout::redirect(
            require_str(&body, "/id")?,
            require_str(&body, "/short_url")?,
        ))
    }

    async fn retrieve(&self, reference: &str) -> Result<ProviderSubscription, AdapterError> {
        check_reference(reference, &["sub_"])?;

        let response = self
            .client
            .get(format!("{API_BASE}/subscriptions/{reference}"))
            .timeout(REQUEST_TIMEOUT)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .send()
            .await?;

        let body = into_json(response).await?;
        self.parse_subscription(&body)
    }

    async fn cancel(&self, reference: &str) -> Result<(), AdapterError> {
        check_reference(reference, &["sub_"])?;

        let response = self
            .client
            .post(format!("{API_BASE}/subscriptions/{reference}/cancel"))
            .timeout(REQUEST_TIMEOUT)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&json!({ "cancel_at_cycle_end": 0 }))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let mut message = response.text().await.unwrap_or_default();
        message.truncate(512);

        // Razorpay rejects a cancel for a subscription already in a
        // terminal status; confirm with a read instead of failing.
        if status.as_u16() == 400 {
            let details = self.retrieve(reference).await?;
            if details.state.is_terminal() {
                return Ok(());
            }
        }

        Err(AdapterError::Rejected {
            status: status.as_u16(),
            message,
        })
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(
            RazorpayAdapter::subscription_state("active"),
            SubscriptionState::Active
        );
        assert_eq!(
            RazorpayAdapter::subscription_state("halted"),
            SubscriptionState::PaymentFailed
        );
        assert_eq!(
            RazorpayAdapter::subscription_state("created"),
            SubscriptionState::Pending
        );
    }

    #[tokio::test]
    async fn forged_reference_is_rejected_before_any_call() {
        let adapter = RazorpayAdapter::new("key", "secret");

        let result = adapter.cancel("sub_abc/cancel_at_cycle_end").await;
        assert!(matches!(result, Err(AdapterError::InvalidReference(_))));

        let result = adapter.retrieve("plan_123").await;
        assert!(matches!(result, Err(AdapterError::InvalidReference(_))));
    }

    #[tokio::test]
    async fn update_plan_is_unsupported() {
        let adapter = RazorpayAdapter::new("key", "secret");
        let result = adapter.update_plan("sub_abc", &PlanId::new("plan_x")).await;
        assert!(matches!(result, Err(AdapterError::Unsupported)));
    }
}
