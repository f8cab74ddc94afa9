//! HTTP API server for the order and outbox system.
//!
//! Provides REST endpoints for order management, payment processing,
//! and outbox worker runs, with structured logging (tracing) and
//! Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use outbox::{
    InMemoryNotificationChannel, OrderService, OutboxWorker, PaymentService, SimulatedGateway,
};
use store::Storage;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::Config;
use routes::orders::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Storage + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders", post(routes::orders::create::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route("/orders/{id}/payment", post(routes::orders::pay::<S>))
        .route("/orders/{id}/cancel", post(routes::orders::cancel::<S>))
        .route("/outbox/run", post(routes::outbox::run::<S>))
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

/// Creates the application state over a storage backend.
///
/// The returned channel is the queue the outbox worker delivers into;
/// callers keep a handle so delivered messages stay observable.
pub fn create_state<S: Storage + Clone>(
    storage: S,
    gateway: SimulatedGateway,
) -> (Arc<AppState<S>>, InMemoryNotificationChannel) {
    let channel = InMemoryNotificationChannel::new();

    let state = Arc::new(AppState {
        orders: OrderService::new(storage.clone()),
        payments: PaymentService::new(storage.clone(), gateway),
        worker: OutboxWorker::new(storage, channel.clone()),
    });

    (state, channel)
}
