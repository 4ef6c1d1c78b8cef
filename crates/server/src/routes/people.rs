use axum::{
    Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::get,
};
use db::models::person::{CreatePerson, Person, PersonWithRoom};
use services::services::allocation::AllocationService;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

/// People are listed with their derived room back-reference.
pub async fn list_people(
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<Vec<PersonWithRoom>>>, ApiError> {
    let people = Person::find_all_with_room(&state.db().pool).await?;
    Ok(ResponseJson(ApiResponse::success(people)))
}

pub async fn create_person(
    State(state): State<AppState>,
    axum::Json(payload): axum::Json<CreatePerson>,
) -> Result<ResponseJson<ApiResponse<Person>>, ApiError> {
    if payload.name.trim().is_empty() {
        return Err(ApiError::BadRequest("person name is required".to_string()));
    }
    if payload.email.trim().is_empty() {
        return Err(ApiError::BadRequest("person email is required".to_string()));
    }
    let person = Person::create(&state.db().pool, Uuid::new_v4(), &payload).await?;
    Ok(ResponseJson(ApiResponse::success(person)))
}

/// The person's allocation is removed through the service first so the room
/// slot is freed before the row disappears.
pub async fn delete_person(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    AllocationService::remove_for_person(&state.db().pool, id).await?;
    let deleted = Person::delete(&state.db().pool, id).await?;
    if deleted == 0 {
        return Err(ApiError::NotFound("person"));
    }
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router() -> Router<AppState> {
    Router::new().nest(
        "/people",
        Router::new()
            .route("/", get(list_people).post(create_person))
            .route("/{id}", axum::routing::delete(delete_person)),
    )
}
