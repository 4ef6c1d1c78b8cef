use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::{
    allocation::{Allocation, AllocationWithDetails},
    person::{Person, PersonWithRoom},
    room::Room,
};
use serde::{Deserialize, Serialize};
use services::services::{
    allocation::{AllocationService, BatchOutcome, OccupancyDrift, RemoveOutcome, SaveOutcome},
    sms::SmsDispatch,
};
use tracing::warn;
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

#[derive(Debug, Clone, Deserialize, TS)]
pub struct SaveAllocationRequest {
    pub person_id: Uuid,
    pub room_id: Uuid,
    pub notes: Option<String>,
    /// Send the person an SMS assignment notice after a successful save.
    #[serde(default)]
    pub notify: bool,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct BatchAllocationRequest {
    pub person_ids: Vec<Uuid>,
    pub room_id: Uuid,
    pub notes: Option<String>,
}

/// Fresh read of all three collections, returned after a batch save so the
/// caller replaces its state wholesale instead of patching it.
#[derive(Debug, Clone, Serialize, TS)]
pub struct AllocationSnapshot {
    pub rooms: Vec<Room>,
    pub people: Vec<PersonWithRoom>,
    pub allocations: Vec<AllocationWithDetails>,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct BatchAllocationResponse {
    pub outcome: BatchOutcome,
    pub snapshot: AllocationSnapshot,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct RemoveAllocationResponse {
    pub removed: bool,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct AllocationListQuery {
    pub q: Option<String>,
}

pub async fn list_allocations(
    State(state): State<AppState>,
    Query(query): Query<AllocationListQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<AllocationWithDetails>>>, ApiError> {
    let allocations = Allocation::find_all_with_details(&state.db().pool).await?;
    let filtered = match query.q.as_deref() {
        Some(q) => AllocationService::filter_allocations(&allocations, q),
        None => allocations,
    };
    Ok(ResponseJson(ApiResponse::success(filtered)))
}

pub async fn save_allocation(
    State(state): State<AppState>,
    axum::Json(payload): axum::Json<SaveAllocationRequest>,
) -> Result<ResponseJson<ApiResponse<SaveOutcome>>, ApiError> {
    let outcome = AllocationService::save(
        &state.db().pool,
        payload.person_id,
        payload.room_id,
        payload.notes,
    )
    .await?;

    if payload.notify {
        notify_assignment(&state, payload.person_id, payload.room_id).await;
    }

    Ok(ResponseJson(ApiResponse::success(outcome)))
}

/// Best-effort SMS notice; a failed or unconfigured dispatch never fails the
/// allocation that already committed.
async fn notify_assignment(state: &AppState, person_id: Uuid, room_id: Uuid) {
    let Some(client) = state.sms() else {
        warn!("sms dispatch not configured, skipping assignment notice");
        return;
    };
    let pool = &state.db().pool;
    let (person, room) = match (
        Person::find_by_id(pool, person_id).await,
        Room::find_by_id(pool, room_id).await,
    ) {
        (Ok(Some(person)), Ok(Some(room))) => (person, room),
        _ => return,
    };
    let Some(phone) = person.phone else {
        warn!(person_id = %person_id, "person has no phone number, skipping assignment notice");
        return;
    };
    let dispatch = SmsDispatch::Assignment {
        to: phone,
        name: person.name,
        room_name: room.name,
        room_type: room.room_type.to_string(),
    };
    if let Err(err) = client.send(&dispatch).await {
        warn!(error = %err, person_id = %person_id, "assignment notice failed");
    }
}

pub async fn save_batch(
    State(state): State<AppState>,
    axum::Json(payload): axum::Json<BatchAllocationRequest>,
) -> Result<ResponseJson<ApiResponse<BatchAllocationResponse>>, ApiError> {
    let pool = &state.db().pool;
    let outcome =
        AllocationService::save_batch(pool, &payload.person_ids, payload.room_id, payload.notes)
            .await?;

    let rooms = Room::find_all(pool).await?;
    let people = Person::find_all(pool).await?;
    let allocations = Allocation::find_all_with_details(pool).await?;
    let plain: Vec<Allocation> = allocations.iter().map(|a| a.allocation.clone()).collect();
    let people = people
        .into_iter()
        .map(|p| Person::with_room(p, &plain, &rooms))
        .collect();

    Ok(ResponseJson(ApiResponse::success(BatchAllocationResponse {
        outcome,
        snapshot: AllocationSnapshot {
            rooms,
            people,
            allocations,
        },
    })))
}

/// Removing an id that no longer exists is not an error; the response just
/// reports that nothing was removed.
pub async fn remove_allocation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<RemoveAllocationResponse>>, ApiError> {
    let outcome = AllocationService::remove(&state.db().pool, id).await?;
    Ok(ResponseJson(ApiResponse::success(RemoveAllocationResponse {
        removed: matches!(outcome, RemoveOutcome::Removed { .. }),
    })))
}

pub async fn audit_occupancy(
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<Vec<OccupancyDrift>>>, ApiError> {
    let drift = AllocationService::audit_occupancy(&state.db().pool).await?;
    Ok(ResponseJson(ApiResponse::success(drift)))
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct RepairResponse {
    pub repaired: u64,
}

pub async fn repair_occupancy(
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<RepairResponse>>, ApiError> {
    let repaired = AllocationService::repair_occupancy(&state.db().pool).await?;
    Ok(ResponseJson(ApiResponse::success(RepairResponse {
        repaired,
    })))
}

pub fn router() -> Router<AppState> {
    Router::new().nest(
        "/allocations",
        Router::new()
            .route("/", get(list_allocations).post(save_allocation))
            .route("/batch", post(save_batch))
            .route("/audit", get(audit_occupancy))
            .route("/audit/repair", post(repair_occupancy))
            .route("/{id}", axum::routing::delete(remove_allocation)),
    )
}
