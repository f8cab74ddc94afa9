//! Order lifecycle endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::OrderId;
use domain::{Money, Order};
use outbox::{
    InMemoryNotificationChannel, OrderService, OutboxWorker, PaymentService, SimulatedGateway,
};
use serde::{Deserialize, Serialize};
use store::Storage;

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: Storage> {
    pub orders: OrderService<S>,
    pub payments: PaymentService<S, SimulatedGateway>,
    pub worker: OutboxWorker<S, InMemoryNotificationChannel>,
}

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub total_amount_cents: i64,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: i64,
    pub state: String,
    pub total_amount_cents: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl OrderResponse {
    pub(crate) fn from_order(order: &Order) -> Self {
        Self {
            id: order.id().as_i64(),
            state: order.state().as_str().to_string(),
            total_amount_cents: order.total_amount().cents(),
            created_at: order.created_at().to_rfc3339(),
            updated_at: order.updated_at().to_rfc3339(),
        }
    }
}

#[derive(Serialize)]
pub struct PaymentResponse {
    pub order: OrderResponse,
    pub event: super::outbox::EventResponse,
}

// -- Handlers --

/// POST /orders — create a new order awaiting payment.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: Storage + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(axum::http::StatusCode, Json<OrderResponse>), ApiError> {
    let order = state
        .orders
        .create_order(Money::from_cents(req.total_amount_cents))
        .await?;

    Ok((
        axum::http::StatusCode::CREATED,
        Json(OrderResponse::from_order(&order)),
    ))
}

/// GET /orders/:id — load an order by ID.
#[tracing::instrument(skip(state))]
pub async fn get<S: Storage + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<i64>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state
        .orders
        .get_order(OrderId::new(id))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Order {id} not found")))?;

    Ok(Json(OrderResponse::from_order(&order)))
}

/// POST /orders/:id/payment — process the payment for an order.
#[tracing::instrument(skip(state))]
pub async fn pay<S: Storage + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<i64>,
) -> Result<Json<PaymentResponse>, ApiError> {
    let (order, event) = state.payments.process_payment(OrderId::new(id)).await?;

    Ok(Json(PaymentResponse {
        order: OrderResponse::from_order(&order),
        event: super::outbox::EventResponse::from_event(&event),
    }))
}

/// POST /orders/:id/cancel — cancel an order.
#[tracing::instrument(skip(state))]
pub async fn cancel<S: Storage + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<i64>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state.orders.cancel_order(OrderId::new(id)).await?;
    Ok(Json(OrderResponse::from_order(&order)))
}
