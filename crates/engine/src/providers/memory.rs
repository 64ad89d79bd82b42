//! In-memory provider adapter for testing.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use domain::{Money, PlanId, Provider, SubscriptionState};

use super::{
    AdapterError, Checkout, CustomerProfile, ProviderAdapter, ProviderSubscription,
};

#[derive(Debug, Clone)]
struct MockSubscription {
    subscriber_ref: String,
    subscription_ref: String,
    plan: PlanId,
    state: SubscriptionState,
}

#[derive(Debug, Default)]
struct AdapterState {
    subscriptions: Vec<MockSubscription>,
    next_id: u32,
    fail_on_create: bool,
    fail_on_retrieve: bool,
    fail_on_cancel: bool,
    fail_on_update: bool,
    create_calls: u32,
    cancel_calls: u32,
}

/// In-memory provider adapter for testing.
///
/// Plays the role of any provider (the enum value is chosen at
/// construction), with switches to simulate outages and counters for
/// asserting call behavior.
#[derive(Clone)]
pub struct InMemoryProviderAdapter {
    provider: Provider,
    state: Arc<RwLock<AdapterState>>,
}

impl InMemoryProviderAdapter {
    /// Creates an in-memory adapter posing as the given provider.
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            state: Arc::new(RwLock::new(AdapterState::default())),
        }
    }

    /// Registers an active provider-side subscription.
    pub fn seed_active(
        &self,
        subscriber_ref: impl Into<String>,
        subscription_ref: impl Into<String>,
        plan: impl Into<PlanId>,
    ) {
        self.state.write().unwrap().subscriptions.push(MockSubscription {
            subscriber_ref: subscriber_ref.into(),
            subscription_ref: subscription_ref.into(),
            plan: plan.into(),
            state: SubscriptionState::Active,
        });
    }

    /// Overrides the provider-side state of a seeded subscription.
    pub fn set_state(&self, reference: &str, state: SubscriptionState) {
        let mut guard = self.state.write().unwrap();
        if let Some(sub) = guard
            .subscriptions
            .iter_mut()
            .find(|s| s.subscription_ref == reference)
        {
            sub.state = state;
        }
    }

    /// Configures the adapter to fail create calls.
    pub fn set_fail_on_create(&self, fail: bool) {
        self.state.write().unwrap().fail_on_create = fail;
    }

    /// Configures the adapter to fail retrieve calls.
    pub fn set_fail_on_retrieve(&self, fail: bool) {
        self.state.write().unwrap().fail_on_retrieve = fail;
    }

    /// Configures the adapter to fail cancel calls.
    pub fn set_fail_on_cancel(&self, fail: bool) {
        self.state.write().unwrap().fail_on_cancel = fail;
    }

    /// Configures the adapter to fail update calls.
    pub fn set_fail_on_update(&self, fail: bool) {
        self.state.write().unwrap().fail_on_update = fail;
    }

    /// Returns the number of create calls accepted.
    pub fn create_count(&self) -> u32 {
        self.state.read().unwrap().create_calls
    }

    /// Returns the number of cancellations that changed provider state.
    pub fn cancel_count(&self) -> u32 {
        self.state.read().unwrap().cancel_calls
    }

    /// Returns the number of provider-side subscriptions still active.
    pub fn active_count(&self) -> usize {
        self.state
            .read()
            .unwrap()
            .subscriptions
            .iter()
            .filter(|s| s.state == SubscriptionState::Active)
            .count()
    }

    fn outage() -> AdapterError {
        AdapterError::Rejected {
            status: 503,
            message: "simulated outage".to_string(),
        }
    }

    fn details(&self, sub: &MockSubscription) -> ProviderSubscription {
        ProviderSubscription {
            provider: self.provider,
            subscriber_ref: Some(sub.subscriber_ref.clone()),
            subscription_ref: sub.subscription_ref.clone(),
            plan: Some(sub.plan.clone()),
            state: sub.state,
            provider_status: sub.state.as_str().to_string(),
        }
    }
}

#[async_trait]
impl ProviderAdapter for InMemoryProviderAdapter {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn create(
        &self,
        plan: &PlanId,
        _cost: Money,
        _customer: &CustomerProfile,
    ) -> Result<Checkout, AdapterError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_create {
            return Err(Self::outage());
        }

        state.next_id += 1;
        state.create_calls += 1;
        let subscriber_ref = format!("{}-cus-{:04}", self.provider, state.next_id);
        let subscription_ref = format!("{}-sub-{:04}", self.provider, state.next_id);
        state.subscriptions.push(MockSubscription {
            subscriber_ref,
            subscription_ref: subscription_ref.clone(),
            plan: plan.clone(),
            state: SubscriptionState::Pending,
        });

        Ok(Checkout::redirect(
            subscription_ref.clone(),
            format!("https://{}.example/checkout/{subscription_ref}", self.provider),
        ))
    }

    async fn retrieve(&self, reference: &str) -> Result<ProviderSubscription, AdapterError> {
        let state = self.state.read().unwrap();

        if state.fail_on_retrieve {
            return Err(Self::outage());
        }

        state
            .subscriptions
            .iter()
            .find(|s| s.subscription_ref == reference || s.subscriber_ref == reference)
            .map(|s| self.details(s))
            .ok_or(AdapterError::Rejected {
                status: 404,
                message: format!("no subscription matching {reference}"),
            })
    }

    async fn cancel(&self, reference: &str) -> Result<(), AdapterError> {
        let mut guard = self.state.write().unwrap();

        if guard.fail_on_cancel {
            return Err(Self::outage());
        }

        // Unknown or already-terminal subscriptions satisfy the caller's
        // intent: cancel is idempotent.
        let state = &mut *guard;
        if let Some(sub) = state
            .subscriptions
            .iter_mut()
            .find(|s| s.subscription_ref == reference || s.subscriber_ref == reference)
            && !sub.state.is_terminal()
        {
            sub.state = SubscriptionState::Cancelled;
            state.cancel_calls += 1;
        }
        Ok(())
    }

    async fn update_plan(
        &self,
        reference: &str,
        new_plan: &PlanId,
    ) -> Result<ProviderSubscription, AdapterError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_update {
            return Err(Self::outage());
        }

        let provider = self.provider;
        let sub = state
            .subscriptions
            .iter_mut()
            .find(|s| s.subscription_ref == reference)
            .ok_or(AdapterError::Rejected {
                status: 404,
                message: format!("no subscription matching {reference}"),
            })?;
        sub.plan = new_plan.clone();

        Ok(ProviderSubscription {
            provider,
            subscriber_ref: Some(sub.subscriber_ref.clone()),
            subscription_ref: sub.subscription_ref.clone(),
            plan: Some(sub.plan.clone()),
            state: sub.state,
            provider_status: sub.state.as_str().to_string(),
        })
    }
}
