use async_trait::async_trait;
use common::UserId;
use domain::{Money, SubscriptionRecord, Tier};

use crate::error::Result;
use crate::user::{NewUser, UserRecord};

/// Core trait for ledger implementations.
///
/// The ledger stores three things: user records with their entitlement
/// tier, at most one subscription record per user, and the single
/// running commission total. All implementations must be thread-safe
/// (Send + Sync), and the commission increment must be atomic at the
/// store layer.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Registers a new user.
    ///
    /// Performs the first-run bootstrap check: when no user exists yet,
    /// the new user is granted `Forever` and marked platform owner.
    /// Fails with `UserExists` for a duplicate email.
    async fn create_user(&self, new_user: NewUser) -> Result<UserRecord>;

    /// Looks up a user by ID. Returns None if the user doesn't exist.
    async fn find_user(&self, user_id: UserId) -> Result<Option<UserRecord>>;

    /// Sets a user's entitlement tier.
    ///
    /// A missing user is a no-op; entitlement follows the subscription
    /// record, and a record without a user has nothing left to update.
    async fn set_user_tier(&self, user_id: UserId, tier: Tier) -> Result<()>;

    /// Installs a subscription record, replacing any existing record for
    /// the same user. Never creates a second record per user.
    async fn upsert_subscription(&self, record: SubscriptionRecord) -> Result<()>;

    /// Looks up the subscription record for a user.
    async fn find_by_user(&self, user_id: UserId) -> Result<Option<SubscriptionRecord>>;

    /// Looks up a subscription by the provider's subscriber/customer id.
    async fn find_by_subscriber_ref(&self, reference: &str)
    -> Result<Option<SubscriptionRecord>>;

    /// Looks up a subscription by the provider's subscription id.
    async fn find_by_subscription_ref(
        &self,
        reference: &str,
    ) -> Result<Option<SubscriptionRecord>>;

    /// Deletes the record matching either external reference.
    ///
    /// Returns false when no record matched; an absent record is a valid
    /// terminal state, not an error.
    async fn delete_by_ref(&self, reference: &str) -> Result<bool>;

    /// Adds to the platform commission total.
    ///
    /// Must be an atomic increment; implementations never expose a
    /// get-then-set path.
    async fn accrue_commission(&self, amount: Money) -> Result<()>;

    /// Returns the current commission total.
    async fn commission_total(&self) -> Result<Money>;
}

/// Extension trait providing convenience methods for ledgers.
#[async_trait]
pub trait LedgerExt: Ledger {
    /// Locates a subscription by any external reference.
    ///
    /// Different providers report different identifiers in their
    /// notifications, so callers try the subscriber id first, then the
    /// subscription id.
    async fn find_by_any_ref(&self, reference: &str) -> Result<Option<SubscriptionRecord>> {
        if let Some(record) = self.find_by_subscriber_ref(reference).await? {
            return Ok(Some(record));
        }
        self.find_by_subscription_ref(reference).await
    }
}

// Blanket implementation for all Ledger implementations
impl<T: Ledger + ?Sized> LedgerExt for T {}
