//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p ledger --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use domain::{Money, PlanId, Provider, SubscriptionRecord, Tier};
use ledger::{Ledger, LedgerError, NewUser, PostgresLedger, UserId};
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            // Create a temporary pool just for migrations
            let temp_pool = PgPool::connect(&connection_string).await.unwrap();

            // Run migrations using raw_sql to execute multiple statements
            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_billing_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();

            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh ledger with its own pool and cleared tables
async fn get_test_ledger() -> PostgresLedger {
    let info = get_container_info().await;

    // Create a fresh pool for each test to avoid connection issues
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    // Clear tables for test isolation; the platform account row is
    // reset rather than dropped.
    sqlx::query("TRUNCATE TABLE subscriptions, users")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("UPDATE platform_account SET commission_total_cents = 0 WHERE id = 1")
        .execute(&pool)
        .await
        .unwrap();

    PostgresLedger::new(pool)
}

fn new_user(email: &str) -> NewUser {
    NewUser {
        email: email.to_string(),
        name: "Test User".to_string(),
    }
}

fn record(user_id: UserId, subscriber: &str, subscription: &str) -> SubscriptionRecord {
    SubscriptionRecord::new(
        user_id,
        Provider::Razorpay,
        subscriber,
        subscription,
        PlanId::new("monthly"),
    )
}

#[tokio::test]
async fn bootstrap_grants_forever_to_first_user_only() {
    let ledger = get_test_ledger().await;

    let first = ledger.create_user(new_user("a@example.com")).await.unwrap();
    let second = ledger.create_user(new_user("b@example.com")).await.unwrap();

    assert!(first.is_owner);
    assert_eq!(first.tier, Tier::Forever);
    assert!(!second.is_owner);
    assert_eq!(second.tier, Tier::Free);

    let loaded = ledger.find_user(first.id).await.unwrap().unwrap();
    assert_eq!(loaded, first);
}

#[tokio::test]
async fn duplicate_email_maps_to_user_exists() {
    let ledger = get_test_ledger().await;
    ledger.create_user(new_user("a@example.com")).await.unwrap();

    let result = ledger.create_user(new_user("a@example.com")).await;
    assert!(matches!(result, Err(LedgerError::UserExists(_))));
}

#[tokio::test]
async fn upsert_replaces_instead_of_duplicating() {
    let ledger = get_test_ledger().await;
    let user = ledger.create_user(new_user("a@example.com")).await.unwrap();

    ledger
        .upsert_subscription(record(user.id, "cust_1", "sub_1"))
        .await
        .unwrap();
    ledger
        .upsert_subscription(record(user.id, "cust_2", "sub_2"))
        .await
        .unwrap();

    let stored = ledger.find_by_user(user.id).await.unwrap().unwrap();
    assert_eq!(stored.subscriber_ref, "cust_2");
    assert!(ledger.find_by_subscription_ref("sub_1").await.unwrap().is_none());

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM subscriptions")
        .fetch_one(ledger.pool())
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn lookup_and_delete_by_either_reference() {
    let ledger = get_test_ledger().await;
    let user = ledger.create_user(new_user("a@example.com")).await.unwrap();
    ledger
        .upsert_subscription(record(user.id, "cust_1", "sub_1"))
        .await
        .unwrap();

    assert!(ledger.find_by_subscriber_ref("cust_1").await.unwrap().is_some());
    assert!(ledger.find_by_subscription_ref("sub_1").await.unwrap().is_some());

    assert!(ledger.delete_by_ref("cust_1").await.unwrap());
    assert!(!ledger.delete_by_ref("cust_1").await.unwrap());
    assert!(ledger.find_by_user(user.id).await.unwrap().is_none());
}

#[tokio::test]
async fn tier_update_roundtrip() {
    let ledger = get_test_ledger().await;
    ledger.create_user(new_user("owner@example.com")).await.unwrap();
    let user = ledger.create_user(new_user("a@example.com")).await.unwrap();

    ledger
        .set_user_tier(user.id, Tier::Paid(PlanId::new("yearly")))
        .await
        .unwrap();

    let loaded = ledger.find_user(user.id).await.unwrap().unwrap();
    assert_eq!(loaded.tier, Tier::Paid(PlanId::new("yearly")));
}

#[tokio::test]
async fn concurrent_commission_accruals_lose_no_updates() {
    let ledger = get_test_ledger().await;

    let mut handles = Vec::new();
    for _ in 0..20 {
        let ledger = ledger.clone();
        handles.push(tokio::spawn(async move {
            ledger.accrue_commission(Money::from_cents(125)).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let total = ledger.commission_total().await.unwrap();
    assert_eq!(total.cents(), 20 * 125);
}
