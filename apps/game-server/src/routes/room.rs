//! Read-only views of the room for dashboards and the browser client.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::{ApiError, ApiErrorBody};
use crate::gateway::SubscriberSummary;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/room", get(get_room))
        .route("/subscribers", get(list_subscribers))
        .route("/subscribers/{subscriber_id}", get(get_subscriber))
}

// ---------------------------------------------------------------------------
// GET /room
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoomResponse {
    pub id: String,
    pub name: String,
    pub subscriber_count: usize,
    pub queue_capacity: usize,
}

#[utoipa::path(
    get,
    path = "/room",
    tag = "Room",
    responses(
        (status = 200, description = "Room summary", body = RoomResponse),
    ),
)]
pub async fn get_room(State(state): State<AppState>) -> Json<RoomResponse> {
    let room = &state.room;
    Json(RoomResponse {
        id: room.id.clone(),
        name: room.name.clone(),
        subscriber_count: room.subscriber_count(),
        queue_capacity: room.queue_capacity(),
    })
}

// ---------------------------------------------------------------------------
// GET /subscribers
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/subscribers",
    tag = "Room",
    responses(
        (status = 200, description = "Currently connected subscribers", body = Vec<SubscriberSummary>),
    ),
)]
pub async fn list_subscribers(State(state): State<AppState>) -> Json<Vec<SubscriberSummary>> {
    let mut subscribers: Vec<SubscriberSummary> = state
        .room
        .list_subscribers()
        .iter()
        .map(|s| s.summary())
        .collect();
    // Oldest first, to the millisecond.
    subscribers.sort_by(|a, b| a.id.cmp(&b.id));
    Json(subscribers)
}

// ---------------------------------------------------------------------------
// GET /subscribers/{subscriber_id}
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/subscribers/{subscriber_id}",
    tag = "Room",
    params(
        ("subscriber_id" = String, Path, description = "Subscriber ID"),
    ),
    responses(
        (status = 200, description = "Subscriber", body = SubscriberSummary),
        (status = 404, description = "Not connected", body = ApiErrorBody),
    ),
)]
pub async fn get_subscriber(
    State(state): State<AppState>,
    Path(subscriber_id): Path<String>,
) -> Result<Json<SubscriberSummary>, ApiError> {
    state
        .room
        .get_subscriber(&subscriber_id)
        .map(|s| Json(s.summary()))
        .ok_or_else(|| ApiError::not_found("Subscriber not connected"))
}
