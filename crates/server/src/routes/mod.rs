pub mod allocations;
pub mod import;
pub mod notifications;
pub mod people;
pub mod rooms;

use axum::{Json, Router, routing::get};
use utils::response::ApiResponse;

use crate::AppState;

async fn health() -> Json<ApiResponse<&'static str>> {
    Json(ApiResponse::success("ok"))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .merge(rooms::router())
        .merge(people::router())
        .merge(allocations::router())
        .merge(import::router())
        .merge(notifications::router())
}
