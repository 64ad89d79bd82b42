//! Stripe integration via REST API (no SDK dependency).

use async_trait::async_trait;
use domain::{Money, PlanId, Provider, SubscriptionState};

use super::{
    AdapterError, Checkout, CustomerProfile, ProviderAdapter, ProviderSubscription,
    REQUEST_TIMEOUT, check_reference, into_json, require_str,
};

const API_BASE: &str = "https://api.stripe.com/v1";

/// Adapter for Stripe Checkout subscriptions.
///
/// All calls are form-encoded with the secret key as basic-auth
/// username, per Stripe's API conventions.
pub struct StripeAdapter {
    client: reqwest::Client,
    secret_key: String,
    success_url: String,
    cancel_url: String,
}

impl StripeAdapter {
    /// Creates a Stripe adapter from the secret key and the website base
    /// URL used for checkout redirects.
    pub fn new(secret_key: impl Into<String>, website_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            secret_key: secret_key.into(),
            success_url: format!("{website_url}/payment-success"),
            cancel_url: format!("{website_url}/payment-failed"),
        }
    }

    fn subscription_state(status: &str) -> SubscriptionState {
        match status {
            "active" | "trialing" => SubscriptionState::Active,
            "canceled" => SubscriptionState::Cancelled,
            "incomplete_expired" => SubscriptionState::Expired,
            "paused" => SubscriptionState::Suspended,
            "past_due" | "unpaid" => SubscriptionState::PaymentFailed,
            _ => SubscriptionState::Pending,
        }
    }

    async fn fetch_subscription(
        &self,
        reference: &str,
    ) -> Result<serde_json::Value, AdapterError> {
        let response = self
            .client
            .get(format!("{API_BASE}/subscriptions/{reference}"))
            .timeout(REQUEST_TIMEOUT)
            .basic_auth(&self.secret_key, None::<&str>)
            .send()
            .await?;
        into_json(response).await
    }

    fn parse_subscription(
        &self,
        body: &serde_json::Value,
    ) -> Result<ProviderSubscription, AdapterError> {
        let status = require_str(body, "/status")?;
        Ok(ProviderSubscription {
            provider: Provider::Stripe,
            subscriber_ref: body["customer"].as_str().map(String::from),
            subscription_ref: require_str(body, "/id")?.to_string(),
            plan: body
                .pointer("/items/data/0/price/id")
                .and_then(|v| v.as_str())
                .map(PlanId::new),
            state: Self::subscription_state(status),
            provider_status: status.to_string(),
        })
    }
}

#[async_trait]
impl ProviderAdapter for StripeAdapter {
    fn provider(&self) -> Provider {
        Provider::Stripe
    }

    async fn create(
        &self,
        plan: &PlanId,
        _cost: Money,
        customer: &CustomerProfile,
    ) -> Result<Checkout, AdapterError> {
        let success_url = format!("{}/{}", self.success_url, plan);
        let response = self
            .client
            .post(format!("{API_BASE}/checkout/sessions"))
            .timeout(REQUEST_TIMEOUT)
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&[
                ("mode", "subscription"),
                ("line_items[0][price]", plan.as_str()),
                ("line_items[0][quantity]", "1"),
                ("customer_email", customer.email.as_str()),
                ("success_url", success_url.as_str()),
                ("cancel_url", self.cancel_url.as_str()),
            ])
            .send()
            .await?;

        let body = into_json(response).await?;
        Ok(Checkout::redirect(
            require_str(&body, "/id")?,
            require_str(&body, "/url")?,
        ))
    }

    async fn retrieve(&self, reference: &str) -> Result<ProviderSubscription, AdapterError> {
        check_reference(reference, &["sub_", "cs_"])?;

        if reference.starts_with("cs_") {
            // Checkout session: the session status stands in until the
            // subscription id is known.
            let response = self
                .client
                .get(format!("{API_BASE}/checkout/sessions/{reference}"))
                .timeout(REQUEST_TIMEOUT)
                .basic_auth(&self.secret_key, None::<&str>)
                .send()
                .await?;
            let body = into_json(response).await?;

            let status = require_str(&body, "/status")?;
            let state = match status {
                "complete" => SubscriptionState::Active,
                "expired" => SubscriptionState::Expired,
                _ => SubscriptionState::Pending,
            };
            return Ok(ProviderSubscription {
                provider: Provider::Stripe,
                subscriber_ref: body["customer"].as_str().map(String::from),
                subscription_ref: body["subscription"]
                    .as_str()
                    .unwrap_or(reference)
                    .to_string(),
                plan: None,
                state,
                provider_status: status.to_string(),
            });
        }

        let body = self.fetch_subscription(reference).await?;
        self.parse_subscription(&body)
    }

    async fn cancel(&self, reference: &str) -> Result<(), AdapterError> {
        check_reference(reference, &["sub_"])?;

        let response = self
            .client
            .delete(format!("{API_BASE}/subscriptions/{reference}"))
            .timeout(REQUEST_TIMEOUT)
            .basic_auth(&self.secret_key, None::<&str>)
            .send()
            .await?;

        // A second cancel answers 404 once the subscription is gone;
        // the caller's intent is already satisfied.
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }

        into_json(response).await?;
        Ok(())
    }

    async fn update_plan(
        &self,
        reference: &str,
        new_plan: &PlanId,
    ) -> Result<ProviderSubscription, AdapterError> {
        check_reference(reference, &["sub_"])?;

        // The price change goes on the existing subscription item.
        let current = self.fetch_subscription(reference).await?;
        let item_id = require_str(&current, "/items/data/0/id")?;

        let response = self
            .client
            .post(format!("{API_BASE}/subscriptions/{reference}"))
            .timeout(REQUEST_TIMEOUT)
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&[
                ("items[0][id]", item_id),
                ("items[0][price]", new_plan.as_str()),
            ])
            .send()
            .await?;

        let body = into_json(response).await?;
        self.parse_subscription(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(
            StripeAdapter::subscription_state("active"),
            SubscriptionState::Active
        );
        assert_eq!(
            StripeAdapter::subscription_state("canceled"),
            SubscriptionState::Cancelled
        );
        assert_eq!(
            StripeAdapter::subscription_state("unpaid"),
            SubscriptionState::PaymentFailed
        );
        assert_eq!(
            StripeAdapter::subscription_state("incomplete"),
            SubscriptionState::Pending
        );
    }

    #[tokio::test]
    async fn forged_reference_is_rejected_before_any_call() {
        let adapter = StripeAdapter::new("sk_test_x", "https://example.com");
        let result = adapter.retrieve("sub_abc/../../customers").await;
        assert!(matches!(result, Err(AdapterError::InvalidReference(_))));

        let result = adapter.cancel("cs_123").await;
        assert!(matches!(result, Err(AdapterError::InvalidReference(_))));
    }
}
