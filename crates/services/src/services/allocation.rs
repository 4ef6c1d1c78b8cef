//! The allocation consistency core: every path that creates, moves or deletes
//! an allocation runs in one transaction together with the occupancy counter
//! write, so `rooms.occupied` always equals the allocation count for the room
//! once the transaction commits.

use db::models::{
    allocation::{Allocation, AllocationWithDetails},
    person::Person,
    room::{CreateRoom, Room, RoomType},
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{debug, info};
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AllocationError {
    #[error("{0}")]
    Validation(String),
    #[error("room '{room}' is already at capacity ({capacity})")]
    CapacityExceeded { room: String, capacity: i64 },
    #[error("room '{room}' has {available} free spots, cannot allocate {requested} people")]
    InsufficientCapacity {
        room: String,
        requested: usize,
        available: i64,
    },
    #[error("room {0} not found")]
    RoomNotFound(Uuid),
    #[error("person {0} not found")]
    PersonNotFound(Uuid),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result of a single-person save.
#[derive(Debug, Clone, Serialize, TS)]
pub struct SaveOutcome {
    pub allocation: Allocation,
    /// Set when the person was moved out of another room.
    pub moved_from: Option<Uuid>,
}

/// Result of a batch save.
#[derive(Debug, Clone, Serialize, TS)]
pub struct BatchOutcome {
    /// People newly allocated.
    pub assigned: usize,
    /// People moved into this room from another one.
    pub moved: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(rename_all = "snake_case")]
pub enum RemoveOutcome {
    Removed { room_id: Uuid },
    NotFound,
}

/// Request body for creating a chalet: a batch of sibling rooms sharing one
/// `chalet_group` label, each with its own capacity.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateChalet {
    pub chalet_group: String,
    pub building: Option<String>,
    pub rooms: Vec<ChaletUnit>,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ChaletUnit {
    pub name: String,
    pub capacity: i64,
    pub description: Option<String>,
    pub bed_type: Option<String>,
    pub bed_count: Option<i64>,
}

/// A room whose denormalized counter disagrees with the allocation count.
#[derive(Debug, Clone, Serialize, TS)]
pub struct OccupancyDrift {
    pub room_id: Uuid,
    pub room_name: String,
    pub recorded: i64,
    pub actual: i64,
}

pub struct AllocationService;

impl AllocationService {
    /// Assign one person to a room, inserting a new allocation or moving the
    /// existing one. Saving into the room the person already occupies only
    /// updates the notes.
    pub async fn save(
        pool: &SqlitePool,
        person_id: Uuid,
        room_id: Uuid,
        notes: Option<String>,
    ) -> Result<SaveOutcome, AllocationError> {
        let mut tx = pool.begin().await?;

        let room = Room::find_by_id(&mut *tx, room_id)
            .await?
            .ok_or(AllocationError::RoomNotFound(room_id))?;
        let person = Person::find_by_id(&mut *tx, person_id)
            .await?
            .ok_or(AllocationError::PersonNotFound(person_id))?;
        let existing = Allocation::find_by_person(&mut *tx, person_id).await?;

        let outcome = match existing {
            Some(current) if current.room_id == room_id => {
                let allocation =
                    Allocation::update_notes(&mut *tx, current.id, notes.as_deref()).await?;
                SaveOutcome {
                    allocation,
                    moved_from: None,
                }
            }
            Some(current) => {
                if room.occupied >= room.capacity {
                    return Err(AllocationError::CapacityExceeded {
                        room: room.name,
                        capacity: room.capacity,
                    });
                }
                let allocation =
                    Allocation::repoint(&mut *tx, current.id, room_id, notes.as_deref()).await?;
                Room::adjust_occupied(&mut *tx, current.room_id, -1).await?;
                Room::adjust_occupied(&mut *tx, room_id, 1).await?;
                SaveOutcome {
                    allocation,
                    moved_from: Some(current.room_id),
                }
            }
            None => {
                if room.occupied >= room.capacity {
                    return Err(AllocationError::CapacityExceeded {
                        room: room.name,
                        capacity: room.capacity,
                    });
                }
                let allocation = Allocation::create(
                    &mut *tx,
                    Uuid::new_v4(),
                    person_id,
                    room_id,
                    notes.as_deref(),
                    person.user_id.as_deref(),
                )
                .await?;
                Room::adjust_occupied(&mut *tx, room_id, 1).await?;
                SaveOutcome {
                    allocation,
                    moved_from: None,
                }
            }
        };

        tx.commit().await?;
        info!(
            person_id = %person_id,
            room_id = %room_id,
            moved_from = ?outcome.moved_from,
            "allocation saved"
        );
        Ok(outcome)
    }

    /// Assign several people to one room in a single transaction. The whole
    /// batch is rejected up front if it does not fit into the room's free
    /// spots; on success the room's counter receives one net write covering
    /// every new and moved allocation. Callers are expected to re-read the
    /// collections afterwards rather than patch state incrementally.
    pub async fn save_batch(
        pool: &SqlitePool,
        person_ids: &[Uuid],
        room_id: Uuid,
        notes: Option<String>,
    ) -> Result<BatchOutcome, AllocationError> {
        if person_ids.is_empty() {
            return Err(AllocationError::Validation(
                "no people selected for allocation".to_string(),
            ));
        }

        let mut tx = pool.begin().await?;

        let room = Room::find_by_id(&mut *tx, room_id)
            .await?
            .ok_or(AllocationError::RoomNotFound(room_id))?;
        let available = room.capacity - room.occupied;
        if person_ids.len() as i64 > available {
            return Err(AllocationError::InsufficientCapacity {
                room: room.name,
                requested: person_ids.len(),
                available: available.max(0),
            });
        }

        let mut assigned = 0usize;
        let mut moved = 0usize;
        for &person_id in person_ids {
            let person = Person::find_by_id(&mut *tx, person_id)
                .await?
                .ok_or(AllocationError::PersonNotFound(person_id))?;
            match Allocation::find_by_person(&mut *tx, person_id).await? {
                Some(current) if current.room_id == room_id => {
                    Allocation::update_notes(&mut *tx, current.id, notes.as_deref()).await?;
                }
                Some(current) => {
                    Allocation::repoint(&mut *tx, current.id, room_id, notes.as_deref()).await?;
                    Room::adjust_occupied(&mut *tx, current.room_id, -1).await?;
                    moved += 1;
                }
                None => {
                    Allocation::create(
                        &mut *tx,
                        Uuid::new_v4(),
                        person_id,
                        room_id,
                        notes.as_deref(),
                        person.user_id.as_deref(),
                    )
                    .await?;
                    assigned += 1;
                }
            }
        }

        Room::adjust_occupied(&mut *tx, room_id, (assigned + moved) as i64).await?;
        tx.commit().await?;
        info!(room_id = %room_id, assigned, moved, "batch allocation saved");
        Ok(BatchOutcome { assigned, moved })
    }

    /// Remove an allocation and free its room slot. An unknown id is a no-op,
    /// not an error.
    pub async fn remove(
        pool: &SqlitePool,
        allocation_id: Uuid,
    ) -> Result<RemoveOutcome, AllocationError> {
        let mut tx = pool.begin().await?;

        let Some(allocation) = Allocation::find_by_id(&mut *tx, allocation_id).await? else {
            debug!(allocation_id = %allocation_id, "remove requested for unknown allocation, ignoring");
            return Ok(RemoveOutcome::NotFound);
        };

        Allocation::delete(&mut *tx, allocation_id).await?;
        Room::adjust_occupied(&mut *tx, allocation.room_id, -1).await?;
        tx.commit().await?;
        info!(
            allocation_id = %allocation_id,
            room_id = %allocation.room_id,
            "allocation removed"
        );
        Ok(RemoveOutcome::Removed {
            room_id: allocation.room_id,
        })
    }

    /// Remove whatever allocation a person currently holds. Used before
    /// deleting the person so the room slot is freed consistently.
    pub async fn remove_for_person(
        pool: &SqlitePool,
        person_id: Uuid,
    ) -> Result<RemoveOutcome, AllocationError> {
        match Allocation::find_by_person(pool, person_id).await? {
            Some(allocation) => Self::remove(pool, allocation.id).await,
            None => Ok(RemoveOutcome::NotFound),
        }
    }

    pub async fn create_room(
        pool: &SqlitePool,
        data: CreateRoom,
    ) -> Result<Room, AllocationError> {
        validate_room(&data.name, data.capacity)?;
        let room = Room::create(pool, Uuid::new_v4(), &data).await?;
        info!(room_id = %room.id, name = %room.name, capacity = room.capacity, "room created");
        Ok(room)
    }

    /// Create a chalet as a batch of sibling rooms sharing one group label,
    /// all inserted in a single transaction.
    pub async fn create_chalet(
        pool: &SqlitePool,
        data: CreateChalet,
    ) -> Result<Vec<Room>, AllocationError> {
        let label = data.chalet_group.trim();
        if label.is_empty() {
            return Err(AllocationError::Validation(
                "chalet group label is required".to_string(),
            ));
        }
        if data.rooms.is_empty() {
            return Err(AllocationError::Validation(
                "a chalet needs at least one room".to_string(),
            ));
        }
        for unit in &data.rooms {
            validate_room(&unit.name, unit.capacity)?;
        }

        let mut tx = pool.begin().await?;
        let mut rooms = Vec::with_capacity(data.rooms.len());
        for unit in &data.rooms {
            let create = CreateRoom {
                name: unit.name.clone(),
                capacity: unit.capacity,
                room_type: Some(RoomType::Chalet),
                description: unit.description.clone(),
                building: data.building.clone(),
                floor: None,
                bed_type: unit.bed_type.clone(),
                bed_count: unit.bed_count,
                chalet_group: Some(label.to_string()),
                user_id: data.user_id.clone(),
            };
            rooms.push(Room::create(&mut *tx, Uuid::new_v4(), &create).await?);
        }
        tx.commit().await?;
        info!(chalet_group = label, rooms = rooms.len(), "chalet created");
        Ok(rooms)
    }

    /// Case-insensitive substring filter over person name/email/department
    /// and room name/building. An empty or whitespace query returns the input
    /// unchanged.
    pub fn filter_allocations(
        allocations: &[AllocationWithDetails],
        query: &str,
    ) -> Vec<AllocationWithDetails> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return allocations.to_vec();
        }
        allocations
            .iter()
            .filter(|a| {
                let fields = [
                    Some(a.person.name.as_str()),
                    Some(a.person.email.as_str()),
                    a.person.department.as_deref(),
                    Some(a.room.name.as_str()),
                    a.room.building.as_deref(),
                ];
                fields
                    .into_iter()
                    .flatten()
                    .any(|f| f.to_lowercase().contains(&query))
            })
            .cloned()
            .collect()
    }

    /// Compare every room's denormalized counter against the allocation count
    /// and report the rooms that disagree.
    pub async fn audit_occupancy(
        pool: &SqlitePool,
    ) -> Result<Vec<OccupancyDrift>, AllocationError> {
        let rows: Vec<(Uuid, String, i64, i64)> = sqlx::query_as(
            "SELECT r.id, r.name, r.occupied,
                    (SELECT COUNT(*) FROM allocations a WHERE a.room_id = r.id)
             FROM rooms r
             ORDER BY r.name ASC",
        )
        .fetch_all(pool)
        .await?;

        Ok(rows
            .into_iter()
            .filter(|(_, _, recorded, actual)| recorded != actual)
            .map(|(room_id, room_name, recorded, actual)| OccupancyDrift {
                room_id,
                room_name,
                recorded,
                actual,
            })
            .collect())
    }

    /// Rewrite every drifted counter from the allocation counts. Returns the
    /// number of rooms repaired.
    pub async fn repair_occupancy(pool: &SqlitePool) -> Result<u64, AllocationError> {
        let result = sqlx::query(
            "UPDATE rooms
             SET occupied = (SELECT COUNT(*) FROM allocations a WHERE a.room_id = rooms.id),
                 updated_at = datetime('now', 'subsec')
             WHERE occupied <> (SELECT COUNT(*) FROM allocations a WHERE a.room_id = rooms.id)",
        )
        .execute(pool)
        .await?;
        let repaired = result.rows_affected();
        if repaired > 0 {
            info!(repaired, "occupancy counters repaired");
        }
        Ok(repaired)
    }
}

fn validate_room(name: &str, capacity: i64) -> Result<(), AllocationError> {
    if name.trim().is_empty() {
        return Err(AllocationError::Validation(
            "room name is required".to_string(),
        ));
    }
    if capacity < 1 {
        return Err(AllocationError::Validation(
            "room capacity must be at least 1".to_string(),
        ));
    }
    Ok(())
}
