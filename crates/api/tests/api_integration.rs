//! Integration tests for the API server.

use std::collections::HashMap;
use std::sync::OnceLock;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use domain::{Money, PricingTable, Provider};
use engine::{InMemoryNotifier, InMemoryProviderAdapter};
use ledger::{InMemoryLedger, Ledger};
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn pricing() -> PricingTable {
    PricingTable::new(
        "monthly",
        Money::from_cents(500),
        "yearly",
        Money::from_cents(4900),
    )
}

fn setup() -> (
    Router,
    InMemoryLedger,
    HashMap<Provider, InMemoryProviderAdapter>,
    InMemoryNotifier,
) {
    let ledger = InMemoryLedger::new();
    let (state, adapters, notifier) = api::create_default_state(ledger.clone(), pricing());
    let app = api::create_app(state, get_metrics_handle());
    (app, ledger, adapters, notifier)
}

async fn request(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_string(&json).unwrap())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, json)
}

/// Registers the owner plus a regular member, returning the member's id.
async fn register_member(app: &Router) -> String {
    let (status, _) = request(
        app,
        "POST",
        "/users",
        Some(serde_json::json!({ "email": "owner@example.com", "name": "Owner" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = request(
        app,
        "POST",
        "/users",
        Some(serde_json::json!({ "email": "ada@example.com", "name": "Ada" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().to_string()
}

/// Seeds an active PayPal subscription and activates it for the user.
async fn activate_paypal(
    app: &Router,
    adapters: &HashMap<Provider, InMemoryProviderAdapter>,
    user_id: &str,
    plan: &str,
) {
    adapters[&Provider::Paypal].seed_active("CUS-1", "I-SUB1", plan);

    let (status, _) = request(
        app,
        "POST",
        "/billing/activate",
        Some(serde_json::json!({
            "user_id": user_id,
            "provider": "paypal",
            "plan": plan,
            "subscriber_ref": "CUS-1",
            "subscription_ref": "I-SUB1",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_health_check() {
    let (app, _, _, _) = setup();

    let (status, body) = request(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_first_registration_bootstraps_owner() {
    let (app, _, _, _) = setup();

    let (status, body) = request(
        &app,
        "POST",
        "/users",
        Some(serde_json::json!({ "email": "owner@example.com", "name": "Owner" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["is_owner"], true);
    assert_eq!(body["tier"], "forever");

    let (status, body) = request(
        &app,
        "POST",
        "/users",
        Some(serde_json::json!({ "email": "b@example.com", "name": "B" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["tier"], "free");

    // Duplicate email conflicts.
    let (status, _) = request(
        &app,
        "POST",
        "/users",
        Some(serde_json::json!({ "email": "b@example.com", "name": "B" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_registration_requires_email_and_name() {
    let (app, _, _, _) = setup();

    let (status, body) = request(
        &app,
        "POST",
        "/users",
        Some(serde_json::json!({ "email": "", "name": "Ada" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("email"));
}

#[tokio::test]
async fn test_checkout_returns_redirect() {
    let (app, _, _, _) = setup();
    register_member(&app).await;

    let (status, body) = request(
        &app,
        "POST",
        "/billing/checkout",
        Some(serde_json::json!({
            "provider": "razorpay",
            "plan": "monthly",
            "customer": { "email": "ada@example.com" },
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["reference"].as_str().is_some());
    assert!(body["redirect_url"].as_str().is_some());
}

#[tokio::test]
async fn test_checkout_with_unknown_plan_is_rejected() {
    let (app, _, adapters, _) = setup();
    register_member(&app).await;

    let (status, body) = request(
        &app,
        "POST",
        "/billing/checkout",
        Some(serde_json::json!({
            "provider": "stripe",
            "plan": "lifetime",
            "customer": { "email": "ada@example.com" },
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("lifetime"));
    assert_eq!(adapters[&Provider::Stripe].create_count(), 0);
}

#[tokio::test]
async fn test_activation_and_status_flow() {
    let (app, ledger, adapters, notifier) = setup();
    let user_id = register_member(&app).await;

    activate_paypal(&app, &adapters, &user_id, "monthly").await;

    assert_eq!(ledger.subscription_count().await, 1);
    assert_eq!(ledger.commission_total().await.unwrap().cents(), 125);
    assert_eq!(notifier.sent_count(), 1);

    let (status, body) = request(&app, "GET", &format!("/billing/status/{user_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["record"]["plan"], "monthly");
    assert_eq!(body["provider_details"]["state"], "Active");
}

#[tokio::test]
async fn test_status_without_subscription_is_not_found() {
    let (app, _, _, _) = setup();
    let user_id = register_member(&app).await;

    let (status, _) = request(&app, "GET", &format!("/billing/status/{user_id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cancel_flow() {
    let (app, ledger, adapters, notifier) = setup();
    let user_id = register_member(&app).await;
    activate_paypal(&app, &adapters, &user_id, "yearly").await;

    let (status, body) = request(
        &app,
        "POST",
        "/billing/cancel",
        Some(serde_json::json!({ "reference": "CUS-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancelled");

    assert_eq!(ledger.subscription_count().await, 0);
    let sent = notifier.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent[1].subject.contains("Cancelled"));

    // A second cancel finds nothing.
    let (status, _) = request(
        &app,
        "POST",
        "/billing/cancel",
        Some(serde_json::json!({ "reference": "CUS-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_webhook_terminal_event_and_redelivery() {
    let (app, ledger, adapters, notifier) = setup();
    let user_id = register_member(&app).await;
    activate_paypal(&app, &adapters, &user_id, "monthly").await;

    let event = serde_json::json!({
        "event_type": "BILLING.SUBSCRIPTION.CANCELLED",
        "resource": { "id": "I-SUB1" },
    });

    let (status, body) = request(&app, "POST", "/billing/webhook", Some(event.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "Processed");
    assert_eq!(ledger.subscription_count().await, 0);
    let sent_after_first = notifier.sent_count();

    // Redelivery is acknowledged and changes nothing.
    let (status, body) = request(&app, "POST", "/billing/webhook", Some(event)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "Ignored");
    assert_eq!(notifier.sent_count(), sent_after_first);
}

#[tokio::test]
async fn test_webhook_for_unknown_subscription_is_acknowledged() {
    let (app, ledger, _, notifier) = setup();
    register_member(&app).await;

    let (status, body) = request(
        &app,
        "POST",
        "/billing/webhook",
        Some(serde_json::json!({
            "event_type": "BILLING.SUBSCRIPTION.EXPIRED",
            "resource": { "id": "I-NEVER-SEEN" },
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "Ignored");
    assert_eq!(ledger.subscription_count().await, 0);
    assert_eq!(notifier.sent_count(), 0);
}

#[tokio::test]
async fn test_webhook_rejects_unparseable_body() {
    let (app, _, _, _) = setup();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/billing/webhook")
                .header("content-type", "application/json")
                .body(Body::from("not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_change_plan_flow() {
    let (app, ledger, adapters, _) = setup();
    let user_id = register_member(&app).await;
    activate_paypal(&app, &adapters, &user_id, "monthly").await;

    let (status, body) = request(
        &app,
        "POST",
        "/billing/plan",
        Some(serde_json::json!({ "user_id": user_id, "plan": "yearly" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["plan"], "yearly");

    let record = ledger
        .find_by_subscription_ref("I-SUB1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.plan.as_str(), "yearly");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, _, _, _) = setup();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}
