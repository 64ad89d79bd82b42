//! HTTP API server for the billing platform.
//!
//! Exposes the reconciliation engine's operations (checkout, activation,
//! cancellation, plan change, status, webhook intake) as REST endpoints,
//! with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::collections::HashMap;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use domain::{PricingTable, Provider};
use engine::{
    FlutterwaveAdapter, InMemoryNotifier, InMemoryProviderAdapter, Notifier, PaypalAdapter,
    PaystackAdapter, ProviderRegistry, RazorpayAdapter, ReconciliationEngine, StripeAdapter,
    TracingNotifier,
};
use ledger::Ledger;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use routes::billing::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<L, N>(state: Arc<AppState<L, N>>, metrics_handle: PrometheusHandle) -> Router
where
    L: Ledger + 'static,
    N: Notifier + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/users", post(routes::billing::register::<L, N>))
        .route("/billing/checkout", post(routes::billing::checkout::<L, N>))
        .route("/billing/activate", post(routes::billing::activate::<L, N>))
        .route("/billing/cancel", post(routes::billing::cancel::<L, N>))
        .route("/billing/plan", post(routes::billing::change_plan::<L, N>))
        .route(
            "/billing/status/{user_id}",
            get(routes::billing::status::<L, N>),
        )
        .route("/billing/webhook", post(routes::webhook::receive::<L, N>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Builds the provider registry from configured credentials.
///
/// Providers without credentials simply get no adapter; requests naming
/// them are rejected by the engine.
pub fn build_registry(config: &Config) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();

    if let Some(key) = &config.stripe_secret_key {
        registry.register(Arc::new(StripeAdapter::new(
            key.clone(),
            &config.website_url,
        )));
    }
    if let (Some(client_id), Some(secret)) = (&config.paypal_client_id, &config.paypal_secret_key)
    {
        registry.register(Arc::new(PaypalAdapter::new(
            client_id.clone(),
            secret.clone(),
            config.company.clone(),
            &config.website_url,
        )));
    }
    if let (Some(key_id), Some(secret)) = (&config.razorpay_key_id, &config.razorpay_key_secret) {
        registry.register(Arc::new(RazorpayAdapter::new(
            key_id.clone(),
            secret.clone(),
        )));
    }
    if let Some(key) = &config.paystack_secret_key {
        registry.register(Arc::new(PaystackAdapter::new(key.clone())));
    }
    if let Some(key) = &config.flutterwave_secret_key {
        registry.register(Arc::new(FlutterwaveAdapter::new(
            key.clone(),
            &config.website_url,
        )));
    }

    registry
}

/// Creates application state wired to the live provider adapters.
pub fn create_live_state<L: Ledger + 'static>(
    ledger: L,
    config: &Config,
) -> Arc<AppState<L, TracingNotifier>> {
    let engine = ReconciliationEngine::new(
        ledger,
        build_registry(config),
        TracingNotifier,
        config.pricing_table(),
    );
    Arc::new(AppState { engine })
}

/// Creates the default application state with in-memory provider
/// adapters and a recording notifier, for tests and local development.
pub fn create_default_state<L: Ledger + 'static>(
    ledger: L,
    pricing: PricingTable,
) -> (
    Arc<AppState<L, InMemoryNotifier>>,
    HashMap<Provider, InMemoryProviderAdapter>,
    InMemoryNotifier,
) {
    let mut registry = ProviderRegistry::new();
    let mut adapters = HashMap::new();
    for provider in Provider::ALL {
        let adapter = InMemoryProviderAdapter::new(provider);
        registry.register(Arc::new(adapter.clone()));
        adapters.insert(provider, adapter);
    }

    let notifier = InMemoryNotifier::new();
    let engine = ReconciliationEngine::new(ledger, registry, notifier.clone(), pricing);

    (Arc::new(AppState { engine }), adapters, notifier)
}
