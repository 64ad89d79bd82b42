//! The reconciliation engine.
//!
//! Applies user actions and inbound provider events to the ledger and
//! to user entitlement. Every operation is idempotent per external
//! subscription id: reprocessing a terminal event whose record is
//! already gone is a silent no-op.

use std::sync::Arc;

use common::UserId;
use domain::{PlanId, PricingTable, Provider, SubscriptionRecord, SubscriptionState, TerminalKind, Tier};
use ledger::{Ledger, LedgerExt, NewUser, UserRecord};
use serde::Serialize;

use crate::error::{EngineError, Result};
use crate::event::{EventKind, WebhookEvent};
use crate::notify::{self, Notifier};
use crate::providers::{
    Checkout, CustomerProfile, ProviderAdapter, ProviderRegistry, ProviderSubscription,
};

/// What the engine did with a webhook event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WebhookOutcome {
    /// The event changed state or produced a notification.
    Processed,

    /// The event was acknowledged and ignored (unrecognized kind, or
    /// already reconciled).
    Ignored,
}

/// Combined ledger and provider view of a user's subscription.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub record: SubscriptionRecord,
    pub provider_details: ProviderSubscription,
}

/// Keeps one user's billing state consistent across the external
/// payment providers.
///
/// The engine is the only mutator of subscription records and
/// entitlement tiers. Provider adapters are consulted for provider
/// truth before any ledger mutation on user-initiated paths; webhook
/// paths trust the provider's notification and mutate unconditionally
/// once the record is located.
pub struct ReconciliationEngine<L, N>
where
    L: Ledger,
    N: Notifier,
{
    ledger: L,
    registry: ProviderRegistry,
    notifier: N,
    pricing: PricingTable,
}

impl<L, N> ReconciliationEngine<L, N>
where
    L: Ledger,
    N: Notifier,
{
    /// Creates a new reconciliation engine.
    pub fn new(ledger: L, registry: ProviderRegistry, notifier: N, pricing: PricingTable) -> Self {
        Self {
            ledger,
            registry,
            notifier,
            pricing,
        }
    }

    /// The providers that currently have an adapter configured.
    pub fn configured_providers(&self) -> Vec<Provider> {
        self.registry.providers()
    }

    fn adapter(&self, provider: Provider) -> Result<Arc<dyn ProviderAdapter>> {
        self.registry
            .get(provider)
            .ok_or(EngineError::ProviderNotConfigured(provider))
    }

    /// Registers a new user, including the first-run owner bootstrap.
    #[tracing::instrument(skip(self, new_user))]
    pub async fn register_user(&self, new_user: NewUser) -> Result<UserRecord> {
        let user = self.ledger.create_user(new_user).await?;
        metrics::counter!("users_registered_total").increment(1);
        tracing::info!(user_id = %user.id, is_owner = user.is_owner, "user registered");
        Ok(user)
    }

    /// Begins a checkout with a provider.
    ///
    /// Validates the plan before any outbound call; no ledger mutation
    /// happens until the provider confirms activation.
    #[tracing::instrument(skip(self, customer))]
    pub async fn begin_checkout(
        &self,
        provider: Provider,
        plan: &PlanId,
        customer: &CustomerProfile,
    ) -> Result<Checkout> {
        let cost = self.pricing.cost_of(plan)?;
        let adapter = self.adapter(provider)?;

        let checkout = adapter
            .create(plan, cost, customer)
            .await
            .map_err(|e| EngineError::provider(provider, e))?;

        metrics::counter!("subscription_checkouts_total").increment(1);
        tracing::info!(%provider, %plan, reference = %checkout.reference, "checkout started");
        Ok(checkout)
    }

    /// Installs a subscription once the provider confirms activation.
    ///
    /// Idempotent per subscription id: re-activating an already-recorded
    /// subscription returns the existing record without accruing the
    /// commission again.
    #[tracing::instrument(skip(self, subscriber_ref, subscription_ref))]
    pub async fn activate(
        &self,
        user_id: UserId,
        provider: Provider,
        plan: PlanId,
        subscriber_ref: String,
        subscription_ref: String,
    ) -> Result<SubscriptionRecord> {
        let commission = self.pricing.commission(&plan)?;

        let user = self
            .ledger
            .find_user(user_id)
            .await?
            .ok_or_else(|| EngineError::RecordNotFound(format!("no user {user_id}")))?;

        if let Some(existing) = self.ledger.find_by_user(user_id).await?
            && existing.subscription_ref == subscription_ref
            && existing.active
        {
            tracing::info!(%subscription_ref, "activation replayed, already recorded");
            return Ok(existing);
        }

        let adapter = self.adapter(provider)?;
        let details = adapter
            .retrieve(&subscription_ref)
            .await
            .map_err(|e| EngineError::provider(provider, e))?;

        if details.state != SubscriptionState::Active {
            return Err(EngineError::InconsistentState(format!(
                "provider reports {} for {subscription_ref}",
                details.state
            )));
        }

        // Upsert replaces any prior record: at most one per user.
        let record =
            SubscriptionRecord::new(user_id, provider, subscriber_ref, subscription_ref, plan.clone());
        self.ledger.upsert_subscription(record.clone()).await?;

        // A Forever grant is independent of billing and is never
        // overwritten by a paid plan.
        if user.tier != Tier::Forever {
            self.ledger
                .set_user_tier(user_id, Tier::Paid(plan.clone()))
                .await?;
        }

        self.ledger.accrue_commission(commission).await?;
        metrics::counter!("subscription_activations_total").increment(1);
        metrics::counter!("commission_accrued_cents_total").increment(commission.cents() as u64);
        tracing::info!(%user_id, %provider, %plan, "subscription activated");

        self.send(
            &user.email,
            notify::RECEIPT_SUBJECT.to_string(),
            notify::receipt_body(&user.name, plan.as_str()),
        )
        .await;

        Ok(record)
    }

    /// User-initiated cancellation, looked up by subscriber or
    /// subscription reference.
    ///
    /// The ledger is only mutated after the adapter confirms; a missing
    /// record is reported as not found and leaves entitlement unchanged.
    #[tracing::instrument(skip(self))]
    pub async fn cancel(&self, reference: &str) -> Result<()> {
        let record = self
            .ledger
            .find_by_any_ref(reference)
            .await?
            .ok_or_else(|| {
                EngineError::RecordNotFound(format!("no subscription matching {reference}"))
            })?;

        let adapter = self.adapter(record.provider)?;
        adapter
            .cancel(&record.subscription_ref)
            .await
            .map_err(|e| EngineError::provider(record.provider, e))?;

        self.ledger.delete_by_ref(&record.subscription_ref).await?;
        self.downgrade(record.user_id).await?;
        metrics::counter!("subscription_cancellations_total").increment(1);
        tracing::info!(user_id = %record.user_id, provider = %record.provider, "subscription cancelled");

        self.notify_status_change(record.user_id, TerminalKind::Cancelled)
            .await?;
        Ok(())
    }

    /// In-place plan change.
    ///
    /// The ledger plan and the user tier are only updated after the
    /// adapter accepts the revision.
    #[tracing::instrument(skip(self))]
    pub async fn change_plan(&self, user_id: UserId, new_plan: PlanId) -> Result<SubscriptionRecord> {
        self.pricing.cost_of(&new_plan)?;

        let record = self
            .ledger
            .find_by_user(user_id)
            .await?
            .ok_or_else(|| EngineError::RecordNotFound(format!("no subscription for user {user_id}")))?;

        let adapter = self.adapter(record.provider)?;
        adapter
            .update_plan(&record.subscription_ref, &new_plan)
            .await
            .map_err(|e| EngineError::provider(record.provider, e))?;

        let mut updated = record;
        updated.plan = new_plan.clone();
        self.ledger.upsert_subscription(updated.clone()).await?;

        if let Some(user) = self.ledger.find_user(user_id).await? {
            if user.tier != Tier::Forever {
                self.ledger
                    .set_user_tier(user_id, Tier::Paid(new_plan))
                    .await?;
            }
            self.send(
                &user.email,
                notify::status_changed_subject(&user.name, "Modified"),
                notify::status_changed_body(&user.name, "Modified"),
            )
            .await;
        }

        tracing::info!(%user_id, plan = %updated.plan, "subscription plan changed");
        Ok(updated)
    }

    /// Explicit status query: the ledger record plus current
    /// provider-side details.
    ///
    /// A terminal provider-side state against an active record is
    /// reported as inconsistent for manual resolution; the engine does
    /// not attempt automatic correction.
    #[tracing::instrument(skip(self))]
    pub async fn status(&self, user_id: UserId) -> Result<StatusReport> {
        let record = self
            .ledger
            .find_by_user(user_id)
            .await?
            .ok_or_else(|| EngineError::RecordNotFound(format!("no subscription for user {user_id}")))?;

        let adapter = self.adapter(record.provider)?;
        let provider_details = adapter
            .retrieve(&record.subscription_ref)
            .await
            .map_err(|e| EngineError::provider(record.provider, e))?;

        if record.active && provider_details.state.is_terminal() {
            return Err(EngineError::InconsistentState(format!(
                "ledger holds an active record but {} reports {}",
                record.provider, provider_details.state
            )));
        }

        Ok(StatusReport {
            record,
            provider_details,
        })
    }

    /// Applies an inbound provider notification.
    ///
    /// Unrecognized kinds, missing identifiers and already-reconciled
    /// subscriptions are acknowledged no-ops; providers may redeliver
    /// any event.
    #[tracing::instrument(skip(self, event), fields(event_type = %event.event_type))]
    pub async fn handle_webhook(&self, event: &WebhookEvent) -> Result<WebhookOutcome> {
        metrics::counter!("webhook_events_total").increment(1);

        let outcome = match event.kind() {
            EventKind::Terminal(kind) => match event.subscription_ref() {
                Some(reference) => self.reconcile_terminal(reference, kind).await?,
                None => WebhookOutcome::Ignored,
            },
            EventKind::PaymentCompleted => match event.billing_ref() {
                Some(reference) => self.notify_renewal(reference).await?,
                None => WebhookOutcome::Ignored,
            },
            EventKind::Unrecognized => WebhookOutcome::Ignored,
        };

        if outcome == WebhookOutcome::Ignored {
            metrics::counter!("webhook_ignored_total").increment(1);
        }
        Ok(outcome)
    }

    /// Reconciles a provider-reported terminal event.
    ///
    /// Deletion proceeds unconditionally once the record is located;
    /// providers expect nothing beyond the HTTP acknowledgement.
    async fn reconcile_terminal(
        &self,
        reference: &str,
        kind: TerminalKind,
    ) -> Result<WebhookOutcome> {
        let Some(record) = self.ledger.find_by_any_ref(reference).await? else {
            tracing::debug!(reference, "terminal event for unknown subscription, ignoring");
            return Ok(WebhookOutcome::Ignored);
        };

        self.ledger.delete_by_ref(&record.subscription_ref).await?;
        self.downgrade(record.user_id).await?;
        metrics::counter!("subscription_cancellations_total").increment(1);
        tracing::info!(user_id = %record.user_id, reason = kind.reason_text(), "subscription ended by provider");

        self.notify_status_change(record.user_id, kind).await?;
        Ok(WebhookOutcome::Processed)
    }

    /// Sends the renewal notification; no ledger change.
    async fn notify_renewal(&self, reference: &str) -> Result<WebhookOutcome> {
        let Some(record) = self.ledger.find_by_any_ref(reference).await? else {
            tracing::debug!(reference, "renewal for unknown subscription, ignoring");
            return Ok(WebhookOutcome::Ignored);
        };

        if let Some(user) = self.ledger.find_user(record.user_id).await? {
            self.send(
                &user.email,
                notify::renewal_subject(&user.name),
                notify::renewal_body(&user.name),
            )
            .await;
        }
        Ok(WebhookOutcome::Processed)
    }

    async fn downgrade(&self, user_id: UserId) -> Result<()> {
        if let Some(user) = self.ledger.find_user(user_id).await? {
            self.ledger
                .set_user_tier(user_id, user.tier.downgraded())
                .await?;
        }
        Ok(())
    }

    async fn notify_status_change(&self, user_id: UserId, kind: TerminalKind) -> Result<()> {
        if let Some(user) = self.ledger.find_user(user_id).await? {
            self.send(
                &user.email,
                notify::status_changed_subject(&user.name, kind.reason_text()),
                notify::status_changed_body(&user.name, kind.reason_text()),
            )
            .await;
        }
        Ok(())
    }

    /// Fire-and-forget delivery: a failed notification is logged and
    /// never affects ledger state.
    async fn send(&self, to: &str, subject: String, body: String) {
        if let Err(e) = self.notifier.send(to, &subject, &body).await {
            tracing::warn!(error = %e, to, "notification delivery failed");
        }
    }
}
