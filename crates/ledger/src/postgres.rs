use async_trait::async_trait;
use common::UserId;
use domain::{Money, Provider, SubscriptionRecord, Tier};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::error::{LedgerError, Result};
use crate::store::Ledger;
use crate::user::{NewUser, UserRecord};

/// PostgreSQL-backed ledger implementation.
#[derive(Clone)]
pub struct PostgresLedger {
    pool: PgPool,
}

impl PostgresLedger {
    /// Creates a new PostgreSQL ledger.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_user(row: PgRow) -> Result<UserRecord> {
        Ok(UserRecord {
            id: UserId::from_uuid(row.try_get::<Uuid, _>("id")?),
            email: row.try_get("email")?,
            name: row.try_get("name")?,
            tier: Tier::from(row.try_get::<String, _>("tier")?),
            is_owner: row.try_get("is_owner")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_subscription(row: PgRow) -> Result<SubscriptionRecord> {
        let provider: String = row.try_get("provider")?;
        let provider: Provider = provider
            .parse()
            .map_err(|e| LedgerError::Corrupt(format!("{e}")))?;

        Ok(SubscriptionRecord {
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            provider,
            subscriber_ref: row.try_get("subscriber_ref")?,
            subscription_ref: row.try_get("subscription_ref")?,
            plan: row.try_get::<String, _>("plan")?.into(),
            created_at: row.try_get("created_at")?,
            active: row.try_get("active")?,
        })
    }
}

const SUBSCRIPTION_COLUMNS: &str =
    "user_id, provider, subscriber_ref, subscription_ref, plan, created_at, active";

#[async_trait]
impl Ledger for PostgresLedger {
    async fn create_user(&self, new_user: NewUser) -> Result<UserRecord> {
        let mut tx = self.pool.begin().await?;

        // Bootstrap check: the first registered user becomes the
        // platform owner with a Forever grant.
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&mut *tx)
            .await?;

        let user = UserRecord::register(new_user, count == 0);

        sqlx::query(
            r#"
            INSERT INTO users (id, email, name, tier, is_owner, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&user.email)
        .bind(&user.name)
        .bind(user.tier.as_str())
        .bind(user.is_owner)
        .bind(user.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("users_email_key")
            {
                return LedgerError::UserExists(user.email.clone());
            }
            LedgerError::Database(e)
        })?;

        tx.commit().await?;
        Ok(user)
    }

    async fn find_user(&self, user_id: UserId) -> Result<Option<UserRecord>> {
        let row = sqlx::query(
            "SELECT id, email, name, tier, is_owner, created_at FROM users WHERE id = $1",
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_user).transpose()
    }

    async fn set_user_tier(&self, user_id: UserId, tier: Tier) -> Result<()> {
        sqlx::query("UPDATE users SET tier = $2 WHERE id = $1")
            .bind(user_id.as_uuid())
            .bind(tier.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn upsert_subscription(&self, record: SubscriptionRecord) -> Result<()> {
        // The primary key on user_id makes a second record per user
        // impossible; a conflicting insert replaces the old record.
        sqlx::query(
            r#"
            INSERT INTO subscriptions
                (user_id, provider, subscriber_ref, subscription_ref, plan, created_at, active)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (user_id) DO UPDATE SET
                provider = EXCLUDED.provider,
                subscriber_ref = EXCLUDED.subscriber_ref,
                subscription_ref = EXCLUDED.subscription_ref,
                plan = EXCLUDED.plan,
                created_at = EXCLUDED.created_at,
                active = EXCLUDED.active
            "#,
        )
        .bind(record.user_id.as_uuid())
        .bind(record.provider.as_str())
        .bind(&record.subscriber_ref)
        .bind(&record.subscription_ref)
        .bind(record.plan.as_str())
        .bind(record.created_at)
        .bind(record.active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_user(&self, user_id: UserId) -> Result<Option<SubscriptionRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE user_id = $1"
        ))
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_subscription).transpose()
    }

    async fn find_by_subscriber_ref(
        &self,
        reference: &str,
    ) -> Result<Option<SubscriptionRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE subscriber_ref = $1"
        ))
        .bind(reference)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_subscription).transpose()
    }

    async fn find_by_subscription_ref(
        &self,
        reference: &str,
    ) -> Result<Option<SubscriptionRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE subscription_ref = $1"
        ))
        .bind(reference)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_subscription).transpose()
    }

    async fn delete_by_ref(&self, reference: &str) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM subscriptions WHERE subscriber_ref = $1 OR subscription_ref = $1",
        )
        .bind(reference)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn accrue_commission(&self, amount: Money) -> Result<()> {
        // Atomic increment against the single platform-account row;
        // there is no read-modify-write path to race.
        sqlx::query(
            "UPDATE platform_account
             SET commission_total_cents = commission_total_cents + $1
             WHERE id = 1",
        )
        .bind(amount.cents())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn commission_total(&self) -> Result<Money> {
        let cents: i64 =
            sqlx::query_scalar("SELECT commission_total_cents FROM platform_account WHERE id = 1")
                .fetch_one(&self.pool)
                .await?;
        Ok(Money::from_cents(cents))
    }
}
