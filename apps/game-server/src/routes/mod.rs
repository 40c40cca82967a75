pub mod health;
pub mod room;

use axum::Router;
use utoipa::OpenApi;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(room::router())
        .merge(crate::gateway::server::router())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        room::get_room,
        room::list_subscribers,
        room::get_subscriber,
    ),
    components(
        schemas(
            crate::error::ApiErrorBody,
            crate::error::ApiErrorDetail,
            crate::gateway::SubscriberSummary,
            health::HealthResponse,
            room::RoomResponse,
        )
    ),
    tags(
        (name = "Health", description = "Health check"),
        (name = "Room", description = "Room membership"),
    )
)]
pub struct ApiDoc;
