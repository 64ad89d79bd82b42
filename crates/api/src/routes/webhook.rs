//! Inbound provider webhook endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use engine::{Notifier, WebhookEvent, WebhookOutcome};
use ledger::Ledger;
use serde::Serialize;

use crate::error::ApiError;
use crate::routes::billing::AppState;

#[derive(Serialize)]
pub struct WebhookAck {
    pub outcome: WebhookOutcome,
}

/// POST /billing/webhook — applies a provider notification.
///
/// Any parseable event is acknowledged with 200, including unrecognized
/// kinds and already-reconciled subscriptions; providers expect nothing
/// beyond the acknowledgement and may redeliver.
pub async fn receive<L: Ledger + 'static, N: Notifier + 'static>(
    State(state): State<Arc<AppState<L, N>>>,
    Json(event): Json<WebhookEvent>,
) -> Result<Json<WebhookAck>, ApiError> {
    let outcome = state.engine.handle_webhook(&event).await?;
    Ok(Json(WebhookAck { outcome }))
}
