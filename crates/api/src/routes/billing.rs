//! Billing endpoints: registration, checkout, activation, cancellation,
//! plan change and status.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::UserId;
use domain::{PlanId, Provider, SubscriptionRecord};
use engine::{Checkout, CustomerProfile, Notifier, ReconciliationEngine, StatusReport};
use ledger::{Ledger, NewUser, UserRecord};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<L, N>
where
    L: Ledger,
    N: Notifier,
{
    pub engine: ReconciliationEngine<L, N>,
}

// -- Request types --

#[derive(Deserialize)]
pub struct CheckoutRequest {
    pub provider: Provider,
    pub plan: String,
    pub customer: CustomerProfile,
}

#[derive(Deserialize)]
pub struct ActivateRequest {
    pub user_id: uuid::Uuid,
    pub provider: Provider,
    pub plan: String,
    pub subscriber_ref: String,
    pub subscription_ref: String,
}

#[derive(Deserialize)]
pub struct CancelRequest {
    /// Subscriber or subscription reference of the subscription to end.
    pub reference: String,
}

#[derive(Deserialize)]
pub struct ChangePlanRequest {
    pub user_id: uuid::Uuid,
    pub plan: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct CancelResponse {
    pub status: &'static str,
}

// -- Handlers --

fn require(value: &str, field: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::BadRequest(format!("{field} is required")));
    }
    Ok(())
}

/// POST /users — register a user (first registration bootstraps the
/// platform owner).
pub async fn register<L: Ledger + 'static, N: Notifier + 'static>(
    State(state): State<Arc<AppState<L, N>>>,
    Json(req): Json<NewUser>,
) -> Result<(StatusCode, Json<UserRecord>), ApiError> {
    require(&req.email, "email")?;
    require(&req.name, "name")?;

    let user = state.engine.register_user(req).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// POST /billing/checkout — begin a checkout with a provider.
pub async fn checkout<L: Ledger + 'static, N: Notifier + 'static>(
    State(state): State<Arc<AppState<L, N>>>,
    Json(req): Json<CheckoutRequest>,
) -> Result<Json<Checkout>, ApiError> {
    require(&req.customer.email, "customer email")?;

    let checkout = state
        .engine
        .begin_checkout(req.provider, &PlanId::new(req.plan), &req.customer)
        .await?;
    Ok(Json(checkout))
}

/// POST /billing/activate — install the subscription after the provider
/// confirms checkout.
pub async fn activate<L: Ledger + 'static, N: Notifier + 'static>(
    State(state): State<Arc<AppState<L, N>>>,
    Json(req): Json<ActivateRequest>,
) -> Result<(StatusCode, Json<SubscriptionRecord>), ApiError> {
    let record = state
        .engine
        .activate(
            UserId::from_uuid(req.user_id),
            req.provider,
            PlanId::new(req.plan),
            req.subscriber_ref,
            req.subscription_ref,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// POST /billing/cancel — user-initiated cancellation.
pub async fn cancel<L: Ledger + 'static, N: Notifier + 'static>(
    State(state): State<Arc<AppState<L, N>>>,
    Json(req): Json<CancelRequest>,
) -> Result<Json<CancelResponse>, ApiError> {
    require(&req.reference, "reference")?;

    state.engine.cancel(&req.reference).await?;
    Ok(Json(CancelResponse {
        status: "cancelled",
    }))
}

/// POST /billing/plan — in-place plan change.
pub async fn change_plan<L: Ledger + 'static, N: Notifier + 'static>(
    State(state): State<Arc<AppState<L, N>>>,
    Json(req): Json<ChangePlanRequest>,
) -> Result<Json<SubscriptionRecord>, ApiError> {
    let record = state
        .engine
        .change_plan(UserId::from_uuid(req.user_id), PlanId::new(req.plan))
        .await?;
    Ok(Json(record))
}

/// GET /billing/status/{user_id} — ledger record plus provider-side
/// details.
pub async fn status<L: Ledger + 'static, N: Notifier + 'static>(
    State(state): State<Arc<AppState<L, N>>>,
    Path(user_id): Path<uuid::Uuid>,
) -> Result<Json<StatusReport>, ApiError> {
    let report = state.engine.status(UserId::from_uuid(user_id)).await?;
    Ok(Json(report))
}
