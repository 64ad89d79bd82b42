use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::UserId;
use domain::{Money, SubscriptionRecord, Tier};
use tokio::sync::RwLock;

use crate::error::{LedgerError, Result};
use crate::store::Ledger;
use crate::user::{NewUser, UserRecord};

#[derive(Default)]
struct LedgerState {
    users: HashMap<UserId, UserRecord>,
    // Keyed by user: the map itself enforces at most one record per user.
    subscriptions: HashMap<UserId, SubscriptionRecord>,
    commission_cents: i64,
}

/// In-memory ledger implementation for testing and local development.
///
/// This implementation stores everything behind a single RwLock and
/// provides the same interface as the PostgreSQL implementation. The
/// commission increment happens under one write-lock acquisition, so
/// concurrent accruals never lose an update.
#[derive(Clone, Default)]
pub struct InMemoryLedger {
    state: Arc<RwLock<LedgerState>>,
}

impl InMemoryLedger {
    /// Creates a new empty in-memory ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of registered users.
    pub async fn user_count(&self) -> usize {
        self.state.read().await.users.len()
    }

    /// Returns the number of stored subscription records.
    pub async fn subscription_count(&self) -> usize {
        self.state.read().await.subscriptions.len()
    }

    /// Clears all users, subscriptions and the commission total.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.users.clear();
        state.subscriptions.clear();
        state.commission_cents = 0;
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn create_user(&self, new_user: NewUser) -> Result<UserRecord> {
        let mut state = self.state.write().await;

        if state.users.values().any(|u| u.email == new_user.email) {
            return Err(LedgerError::UserExists(new_user.email));
        }

        let is_first = state.users.is_empty();
        let user = UserRecord::register(new_user, is_first);
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, user_id: UserId) -> Result<Option<UserRecord>> {
        Ok(self.state.read().await.users.get(&user_id).cloned())
    }

    async fn set_user_tier(&self, user_id: UserId, tier: Tier) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some(user) = state.users.get_mut(&user_id) {
            user.tier = tier;
        }
        Ok(())
    }

    async fn upsert_subscription(&self, record: SubscriptionRecord) -> Result<()> {
        let mut state = self.state.write().await;
        state.subscriptions.insert(record.user_id, record);
        Ok(())
    }

    async fn find_by_user(&self, user_id: UserId) -> Result<Option<SubscriptionRecord>> {
        Ok(self.state.read().await.subscriptions.get(&user_id).cloned())
    }

    async fn find_by_subscriber_ref(
        &self,
        reference: &str,
    ) -> Result<Option<SubscriptionRecord>> {
        let state = self.state.read().await;
        Ok(state
            .subscriptions
            .values()
            .find(|r| r.subscriber_ref == reference)
            .cloned())
    }

    async fn find_by_subscription_ref(
        &self,
        reference: &str,
    ) -> Result<Option<SubscriptionRecord>> {
        let state = self.state.read().await;
        Ok(state
            .subscriptions
            .values()
            .find(|r| r.subscription_ref == reference)
            .cloned())
    }

    async fn delete_by_ref(&self, reference: &str) -> Result<bool> {
        let mut state = self.state.write().await;
        let user_id = state
            .subscriptions
            .values()
            .find(|r| r.matches_ref(reference))
            .map(|r| r.user_id);

        match user_id {
            Some(id) => {
                state.subscriptions.remove(&id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn accrue_commission(&self, amount: Money) -> Result<()> {
        let mut state = self.state.write().await;
        state.commission_cents += amount.cents();
        Ok(())
    }

    async fn commission_total(&self) -> Result<Money> {
        Ok(Money::from_cents(self.state.read().await.commission_cents))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LedgerExt;
    use domain::{PlanId, Provider};

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            name: "Test User".to_string(),
        }
    }

    fn record(user_id: UserId, subscriber: &str, subscription: &str) -> SubscriptionRecord {
        SubscriptionRecord::new(
            user_id,
            Provider::Stripe,
            subscriber,
            subscription,
            PlanId::new("monthly"),
        )
    }

    #[tokio::test]
    async fn first_user_is_bootstrapped_as_owner() {
        let ledger = InMemoryLedger::new();

        let first = ledger.create_user(new_user("a@example.com")).await.unwrap();
        let second = ledger.create_user(new_user("b@example.com")).await.unwrap();

        assert!(first.is_owner);
        assert_eq!(first.tier, Tier::Forever);
        assert!(!second.is_owner);
        assert_eq!(second.tier, Tier::Free);
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let ledger = InMemoryLedger::new();
        ledger.create_user(new_user("a@example.com")).await.unwrap();

        let result = ledger.create_user(new_user("a@example.com")).await;
        assert!(matches!(result, Err(LedgerError::UserExists(_))));
        assert_eq!(ledger.user_count().await, 1);
    }

    #[tokio::test]
    async fn upsert_replaces_existing_record_for_user() {
        let ledger = InMemoryLedger::new();
        let user_id = UserId::new();

        ledger
            .upsert_subscription(record(user_id, "cus_1", "sub_1"))
            .await
            .unwrap();
        ledger
            .upsert_subscription(record(user_id, "cus_2", "sub_2"))
            .await
            .unwrap();

        assert_eq!(ledger.subscription_count().await, 1);
        let stored = ledger.find_by_user(user_id).await.unwrap().unwrap();
        assert_eq!(stored.subscription_ref, "sub_2");
        assert!(ledger.find_by_subscription_ref("sub_1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn lookup_by_either_reference() {
        let ledger = InMemoryLedger::new();
        let user_id = UserId::new();
        ledger
            .upsert_subscription(record(user_id, "cus_1", "sub_1"))
            .await
            .unwrap();

        assert!(ledger.find_by_subscriber_ref("cus_1").await.unwrap().is_some());
        assert!(ledger.find_by_subscription_ref("sub_1").await.unwrap().is_some());
        assert!(ledger.find_by_subscriber_ref("sub_1").await.unwrap().is_none());

        // The convenience lookup tries subscriber ref first, then
        // subscription ref.
        assert!(ledger.find_by_any_ref("cus_1").await.unwrap().is_some());
        assert!(ledger.find_by_any_ref("sub_1").await.unwrap().is_some());
        assert!(ledger.find_by_any_ref("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_by_ref_reports_absence_without_error() {
        let ledger = InMemoryLedger::new();
        let user_id = UserId::new();
        ledger
            .upsert_subscription(record(user_id, "cus_1", "sub_1"))
            .await
            .unwrap();

        assert!(ledger.delete_by_ref("sub_1").await.unwrap());
        assert!(!ledger.delete_by_ref("sub_1").await.unwrap());
        assert_eq!(ledger.subscription_count().await, 0);
    }

    #[tokio::test]
    async fn set_tier_on_missing_user_is_a_no_op() {
        let ledger = InMemoryLedger::new();
        ledger.set_user_tier(UserId::new(), Tier::Free).await.unwrap();
        assert_eq!(ledger.user_count().await, 0);
    }

    #[tokio::test]
    async fn concurrent_accruals_lose_no_updates() {
        let ledger = InMemoryLedger::new();

        let mut handles = Vec::new();
        for _ in 0..50 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                ledger.accrue_commission(Money::from_cents(125)).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let total = ledger.commission_total().await.unwrap();
        assert_eq!(total.cents(), 50 * 125);
    }
}
