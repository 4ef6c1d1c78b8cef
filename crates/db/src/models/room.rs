use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

/// Kind of lodging a room belongs to. Informational only; allocation rules do
/// not depend on it.
#[derive(
    Debug, Clone, Type, Serialize, Deserialize, PartialEq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "room_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RoomType {
    #[default]
    Chalet,
    PersonalTent,
    Hotel,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Room {
    pub id: Uuid,
    pub name: String,
    /// Fixed at creation.
    pub capacity: i64,
    /// Denormalized count of allocations pointing at this room. Every
    /// allocation mutation updates it in the same transaction; invariant is
    /// `0 <= occupied <= capacity` and `occupied == COUNT(allocations)`.
    pub occupied: i64,
    pub room_type: RoomType,
    pub description: Option<String>,
    pub building: Option<String>,
    pub floor: Option<String>,
    pub bed_type: Option<String>,
    pub bed_count: Option<i64>,
    /// Grouping tag shared by sibling rooms of one physical chalet.
    pub chalet_group: Option<String>,
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateRoom {
    pub name: String,
    pub capacity: i64,
    pub room_type: Option<RoomType>,
    pub description: Option<String>,
    pub building: Option<String>,
    pub floor: Option<String>,
    pub bed_type: Option<String>,
    pub bed_count: Option<i64>,
    pub chalet_group: Option<String>,
    pub user_id: Option<String>,
}

const ROOM_COLUMNS: &str = "id, name, capacity, occupied, room_type, description, building, \
     floor, bed_type, bed_count, chalet_group, user_id, created_at, updated_at";

impl Room {
    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(&format!(
            "SELECT {ROOM_COLUMNS} FROM rooms ORDER BY name ASC"
        ))
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Self>(&format!("SELECT {ROOM_COLUMNS} FROM rooms WHERE id = $1"))
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    pub async fn create<'e, E>(executor: E, id: Uuid, data: &CreateRoom) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Self>(&format!(
            "INSERT INTO rooms (id, name, capacity, occupied, room_type, description, building, \
             floor, bed_type, bed_count, chalet_group, user_id)
             VALUES ($1, $2, $3, 0, $4, $5, $6, $7, $8, $9, $10, $11)
             RETURNING {ROOM_COLUMNS}"
        ))
        .bind(id)
        .bind(&data.name)
        .bind(data.capacity)
        .bind(data.room_type.clone().unwrap_or_default())
        .bind(&data.description)
        .bind(&data.building)
        .bind(&data.floor)
        .bind(&data.bed_type)
        .bind(data.bed_count)
        .bind(&data.chalet_group)
        .bind(&data.user_id)
        .fetch_one(executor)
        .await
    }

    /// Apply a delta to the denormalized occupancy counter, floored at zero.
    /// Only ever called inside the transaction that mutates the allocation
    /// rows the counter mirrors.
    pub async fn adjust_occupied<'e, E>(executor: E, id: Uuid, delta: i64) -> Result<(), sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query(
            "UPDATE rooms
             SET occupied = MAX(occupied + $2, 0),
                 updated_at = datetime('now', 'subsec')
             WHERE id = $1",
        )
        .bind(id)
        .bind(delta)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM rooms WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}
