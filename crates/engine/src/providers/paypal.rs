//! PayPal billing subscriptions via REST API.

use async_trait::async_trait;
use domain::{Money, PlanId, Provider, SubscriptionState};
use serde_json::json;

use super::{
    AdapterError, Checkout, CustomerProfile, ProviderAdapter, ProviderSubscription,
    REQUEST_TIMEOUT, check_reference, into_json, require_str,
};

const API_BASE: &str = "https://api-m.paypal.com/v1/billing";

/// Adapter for PayPal billing subscriptions.
///
/// Authenticates every call with the client id/secret pair as basic
/// auth. Subscription ids are `I-` prefixed.
pub struct PaypalAdapter {
    client: reqwest::Client,
    client_id: String,
    secret_key: String,
    brand_name: String,
    return_url: String,
    cancel_url: String,
}

impl PaypalAdapter {
    /// Creates a PayPal adapter from API credentials, the brand shown on
    /// the approval page and the website base URL for redirects.
    pub fn new(
        client_id: impl Into<String>,
        secret_key: impl Into<String>,
        brand_name: impl Into<String>,
        website_url: &str,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            client_id: client_id.into(),
            secret_key: secret_key.into(),
            brand_name: brand_name.into(),
            return_url: format!("{website_url}/payment-success"),
            cancel_url: format!("{website_url}/payment-failed"),
        }
    }

    fn subscription_state(status: &str) -> SubscriptionState {
        match status {
            "ACTIVE" => SubscriptionState::Active,
            "SUSPENDED" => SubscriptionState::Suspended,
            "CANCELLED" => SubscriptionState::Cancelled,
            "EXPIRED" => SubscriptionState::Expired,
            _ => SubscriptionState::Pending,
        }
    }

    fn application_context(&self, plan: &PlanId) -> serde_json::Value {
        json!({
            "brand_name": self.brand_name,
            "locale": "en-US",
            "user_action": "SUBSCRIBE_NOW",
            "payment_method": {
                "payer_selected": "PAYPAL",
                "payee_preferred": "IMMEDIATE_PAYMENT_REQUIRED"
            },
            "return_url": format!("{}/{plan}", self.return_url),
            "cancel_url": self.cancel_url,
        })
    }
}

#[async_trait]
impl ProviderAdapter for PaypalAdapter {
    fn provider(&self) -> Provider {
        Provider::Paypal
    }

    async fn create(
        &self,
        plan: &PlanId,
        _cost: Money,
        customer: &CustomerProfile,
    ) -> Result<Checkout, AdapterError> {
        let mut subscriber = json!({ "email_address": customer.email });
        if customer.given_name.is_some() || customer.surname.is_some() {
            subscriber["name"] = json!({
                "given_name": customer.given_name.as_deref().unwrap_or_default(),
                "surname": customer.surname.as_deref().unwrap_or_default(),
            });
        }
        if let Some(address) = &customer.address {
            subscriber["shipping_address"] = json!({
                "name": { "full_name": customer.display_name() },
                "address": {
                    "address_line_1": address,
                    "admin_area_1": customer.country.as_deref().unwrap_or_default(),
                    "postal_code": customer.postal_code.as_deref().unwrap_or_default(),
                    "country_code": customer.country.as_deref().unwrap_or_default(),
                }
            });
        }

        let payload = json!({
            "plan_id": plan.as_str(),
            "subscriber": subscriber,
            "application_context": self.application_context(plan),
        });

        let response = self
            .client
            .post(format!("{API_BASE}/subscriptions"))
            .timeout(REQUEST_TIMEOUT)
            .basic_auth(&self.client_id, Some(&self.secret_key))
            .json(&payload)
            .send()
            .await?;

        let body = into_json(response).await?;
        let id = require_str(&body, "/id")?;

        // The customer completes approval at the HATEOAS "approve" link.
        let approval = body["links"]
            .as_array()
            .and_then(|links| links.iter().find(|l| l["rel"] == "approve"))
            .and_then(|l| l["href"].as_str());

        Ok(Checkout {
            reference: id.to_string(),
            redirect_url: approval.map(String::from),
            client_secret: None,
        })
    }

    async fn retrieve(&self, reference: &str) -> Result<ProviderSubscription, AdapterError> {
        check_reference(reference, &["I-"])?;

        let response = self
            .client
            .get(format!("{API_BASE}/subscriptions/{reference}"))
            .timeout(REQUEST_TIMEOUT)
            .basic_auth(&self.client_id, Some(&self.secret_key))
            .send()
            .await?;
        let body = into_json(response).await?;

        let status = require_str(&body, "/status")?;
        Ok(ProviderSubscription {
            provider: Provider::Paypal,
            subscriber_ref: body
                .pointer("/subscriber/payer_id")
                .and_then(|v| v.as_str())
                .map(String::from),
            subscription_ref: require_str(&body, "/id")?.to_string(),
            plan: body["plan_id"].as_str().map(PlanId::new),
            state: Self::subscription_state(status),
            provider_status: status.to_string(),
        })
    }

    async fn cancel(&self, reference: &str) -> Result<(), AdapterError> {
        check_reference(reference, &["I-"])?;

        let response = self
            .client
            .post(format!("{API_BASE}/subscriptions/{reference}/cancel"))
            .timeout(REQUEST_TIMEOUT)
            .basic_auth(&self.client_id, Some(&self.secret_key))
            .json(&json!({ "reason": "Cancelled by customer" }))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let mut message = response.text().await.unwrap_or_default();
        message.truncate(512);

        // PayPal answers 422 for a subscription that is already in a
        // terminal status; confirm with a read instead of failing.
        if status.as_u16() == 422 {
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
        reference: &str,
        new_plan: &PlanId,
    ) -> Result<ProviderSubscription, AdapterError> {
        check_reference(reference, &["I-"])?;

        let payload = json!({
            "plan_id": new_plan.as_str(),
            "application_context": self.application_context(new_plan),
        });

        let response = self
            .client
            .post(format!("{API_BASE}/subscriptions/{reference}/revise"))
            .timeout(REQUEST_TIMEOUT)
            .basic_auth(&self.client_id, Some(&self.secret_key))
            .json(&payload)
            .send()
            .await?;
        into_json(response).await?;

        self.retrieve(reference).await
    }
}
