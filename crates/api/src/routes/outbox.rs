//! Outbox worker trigger endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use domain::OutboxEvent;
use serde::Serialize;
use store::Storage;

use crate::error::ApiError;
use crate::routes::orders::AppState;

#[derive(Serialize)]
pub struct EventResponse {
    pub id: i64,
    pub aggregate_id: i64,
    #[serde(rename = "type")]
    pub event_type: String,
    pub status: String,
}

impl EventResponse {
    pub(crate) fn from_event(event: &OutboxEvent) -> Self {
        Self {
            id: event.id().as_i64(),
            aggregate_id: event.aggregate_id().as_i64(),
            event_type: event.event_type().to_string(),
            status: event.status().to_string(),
        }
    }
}

#[derive(Serialize)]
pub struct OutboxRunResponse {
    pub processed: bool,
    pub event: Option<EventResponse>,
}

/// POST /outbox/run — claim and deliver the oldest pending outbox event.
#[tracing::instrument(skip(state))]
pub async fn run<S: Storage + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<OutboxRunResponse>, ApiError> {
    let event = state.worker.process_next_event().await?;

    Ok(Json(OutboxRunResponse {
        processed: event.is_some(),
        event: event.as_ref().map(EventResponse::from_event),
    }))
}
