//! Paystack subscriptions via REST API.

use async_trait::async_trait;
use domain::{Money, PlanId, Provider, SubscriptionState};
use serde_json::json;

use super::{
    AdapterError, Checkout, CustomerProfile, ProviderAdapter, ProviderSubscription,
    REQUEST_TIMEOUT, check_reference, into_json, require_str,
};

const API_BASE: &str = "https://api.paystack.co";

/// Adapter for Paystack subscriptions.
///
/// Authenticates with the secret key as a bearer token. Subscription
/// codes are `SUB_` prefixed; disabling one additionally requires the
/// email token Paystack attaches to the subscription, which this adapter
/// fetches itself so the quirk never reaches the engine.
pub struct PaystackAdapter {
    client: reqwest::Client,
    secret_key: String,
}

impl PaystackAdapter {
    /// Creates a Paystack adapter from the secret key.
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            secret_key: secret_key.into(),
        }
    }

    fn subscription_state(status: &str) -> SubscriptionState {
        match status {
            "active" | "non-renewing" => SubscriptionState::Active,
            "cancelled" => SubscriptionState::Cancelled,
            "completed" => SubscriptionState::Expired,
            "attention" => SubscriptionState::PaymentFailed,
            _ => SubscriptionState::Pending,
        }
    }

    /// Fetches subscription details plus the email token needed for
    /// disabling.
    async fn fetch_subscription(
        &self,
        reference: &str,
    ) -> Result<(ProviderSubscription, Option<String>), AdapterError> {
        let response = self
            .client
            .get(format!("{API_BASE}/subscription/{reference}"))
            .timeout(REQUEST_TIMEOUT)
            .bearer_auth(&self.secret_key)
            .send()
            .await?;
        let body = into_json(response).await?;

        let status = require_str(&body, "/data/status")?;
        let details = ProviderSubscription {
            provider: Provider::Paystack,
            subscriber_ref: body
                .pointer("/data/customer/customer_code")
                .and_then(|v| v.as_str())
                .map(String::from),
            subscription_ref: require_str(&body, "/data/subscription_code")?.to_string(),
            plan: body
                .pointer("/data/plan/plan_code")
                .and_then(|v| v.as_str())
                .map(PlanId::new),
            state: Self::subscription_state(status),
            provider_status: status.to_string(),
        };

        let email_token = body
            .pointer("/data/email_token")
            .and_then(|v| v.as_str())
            .map(String::from);

        Ok((details, email_token))
    }
}

#[async_trait]
impl ProviderAdapter for PaystackAdapter {
    fn provider(&self) -> Provider {
        Provider::Paystack
    }

    async fn create(
        &self,
        plan: &PlanId,
        cost: Money,
        customer: &CustomerProfile,
    ) -> Result<Checkout, AdapterError> {
        // Paystack wants an explicit amount in subunits alongside the
        // plan code.
        let payload = json!({
            "email": customer.email,
            "amount": cost.cents(),
            "plan": plan.as_str(),
        });

        let response = self
            .client
            .post(format!("{API_BASE}/transaction/initialize"))
            .timeout(REQUEST_TIMEOUT)
            .bearer_auth(&self.secret_key)
            .json(&payload)
            .send()
            .await?;

        let body = into_json(response).await?;
        Ok(Checkout::redirect(
            require_str(&body, "/data/reference")?,
            require_str(&body, "/data/authorization_url")?,
        ))
    }

    async fn retrieve(&self, reference: &str) -> Result<ProviderSubscription, AdapterError> {
        check_reference(reference, &["SUB_"])?;
        let (details, _) = self.fetch_subscription(reference).await?;
        Ok(details)
    }

    async fn cancel(&self, reference: &str) -> Result<(), AdapterError> {
        check_reference(reference, &["SUB_"])?;

        let (details, email_token) = self.fetch_subscription(reference).await?;
        if details.state.is_terminal() {
            return Ok(());
        }

        let token = email_token.ok_or_else(|| {
            AdapterError::Malformed("subscription has no email_token".to_string())
        })?;

        let response = self
            .client
            .post(format!("{API_BASE}/subscription/disable"))
            .timeout(REQUEST_TIMEOUT)
            .bearer_auth(&self.secret_key)
            .json(&json!({ "code": reference, "token": token }))
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(
            PaystackAdapter::subscription_state("active"),
            SubscriptionState::Active
        );
        assert_eq!(
            PaystackAdapter::subscription_state("non-renewing"),
            SubscriptionState::Active
        );
        assert_eq!(
            PaystackAdapter::subscription_state("attention"),
            SubscriptionState::PaymentFailed
        );
    }

    #[tokio::test]
    async fn forged_reference_is_rejected_before_any_call() {
        let adapter = PaystackAdapter::new("sk_test_x");

        let result = adapter.retrieve("SUB_abc#fragment").await;
        assert!(matches!(result, Err(AdapterError::InvalidReference(_))));

        let result = adapter.cancel("CUS_xyz").await;
        assert!(matches!(result, Err(AdapterError::InvalidReference(_))));
    }

    #[tokio::test]
    async fn update_plan_is_unsupported() {
        let adapter = PaystackAdapter::new("sk_test_x");
        let result = adapter.update_plan("SUB_abc", &PlanId::new("PLN_x")).await;
        assert!(matches!(result, Err(AdapterError::Unsupported)));
    }
}
