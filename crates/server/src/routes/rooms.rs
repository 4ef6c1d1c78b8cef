use axum::{
    Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::room::{CreateRoom, Room};
use services::services::allocation::{AllocationService, CreateChalet};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

pub async fn list_rooms(
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<Vec<Room>>>, ApiError> {
    let rooms = Room::find_all(&state.db().pool).await?;
    Ok(ResponseJson(ApiResponse::success(rooms)))
}

pub async fn get_room(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Room>>, ApiError> {
    let room = Room::find_by_id(&state.db().pool, id)
        .await?
        .ok_or(ApiError::NotFound("room"))?;
    Ok(ResponseJson(ApiResponse::success(room)))
}

pub async fn create_room(
    State(state): State<AppState>,
    axum::Json(payload): axum::Json<CreateRoom>,
) -> Result<ResponseJson<ApiResponse<Room>>, ApiError> {
    let room = AllocationService::create_room(&state.db().pool, payload).await?;
    Ok(ResponseJson(ApiResponse::success(room)))
}

/// Create a whole chalet: sibling rooms sharing one group label.
pub async fn create_chalet(
    State(state): State<AppState>,
    axum::Json(payload): axum::Json<CreateChalet>,
) -> Result<ResponseJson<ApiResponse<Vec<Room>>>, ApiError> {
    let rooms = AllocationService::create_chalet(&state.db().pool, payload).await?;
    Ok(ResponseJson(ApiResponse::success(rooms)))
}

/// Deleting a room cascades to its allocations, so occupancy dies with it.
pub async fn delete_room(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let deleted = Room::delete(&state.db().pool, id).await?;
    if deleted == 0 {
        return Err(ApiError::NotFound("room"));
    }
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router() -> Router<AppState> {
    Router::new().nest(
        "/rooms",
        Router::new()
            .route("/", get(list_rooms).post(create_room))
            .route("/chalet", post(create_chalet))
            .route("/{id}", get(get_room).delete(delete_room)),
    )
}
