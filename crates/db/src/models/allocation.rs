use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

use super::{
    person::Person,
    room::{Room, RoomType},
};

/// The authoritative join row between a person and a room. `Room.occupied`
/// and the person's room back-reference are both derived from the set of
/// these rows.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Allocation {
    pub id: Uuid,
    pub person_id: Uuid,
    pub room_id: Uuid,
    pub date_assigned: DateTime<Utc>,
    pub notes: Option<String>,
    pub user_id: Option<String>,
}

/// Allocation with both sides denormalized, as served to the list views.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct AllocationWithDetails {
    #[serde(flatten)]
    #[ts(flatten)]
    pub allocation: Allocation,
    pub person: Person,
    pub room: Room,
}

impl std::ops::Deref for AllocationWithDetails {
    type Target = Allocation;
    fn deref(&self) -> &Self::Target {
        &self.allocation
    }
}

#[derive(FromRow)]
struct AllocationDetailsRecord {
    a_id: Uuid,
    a_person_id: Uuid,
    a_room_id: Uuid,
    a_date_assigned: DateTime<Utc>,
    a_notes: Option<String>,
    a_user_id: Option<String>,
    p_id: Uuid,
    p_name: String,
    p_email: String,
    p_phone: Option<String>,
    p_department: Option<String>,
    p_home_church: Option<String>,
    p_special_needs: Option<String>,
    p_import_source: Option<String>,
    p_imported_at: Option<DateTime<Utc>>,
    p_user_id: Option<String>,
    p_created_at: DateTime<Utc>,
    r_id: Uuid,
    r_name: String,
    r_capacity: i64,
    r_occupied: i64,
    r_room_type: RoomType,
    r_description: Option<String>,
    r_building: Option<String>,
    r_floor: Option<String>,
    r_bed_type: Option<String>,
    r_bed_count: Option<i64>,
    r_chalet_group: Option<String>,
    r_user_id: Option<String>,
    r_created_at: DateTime<Utc>,
    r_updated_at: DateTime<Utc>,
}

impl From<AllocationDetailsRecord> for AllocationWithDetails {
    fn from(rec: AllocationDetailsRecord) -> Self {
        Self {
            allocation: Allocation {
                id: rec.a_id,
                person_id: rec.a_person_id,
                room_id: rec.a_room_id,
                date_assigned: rec.a_date_assigned,
                notes: rec.a_notes,
                user_id: rec.a_user_id,
            },
            person: Person {
                id: rec.p_id,
                name: rec.p_name,
                email: rec.p_email,
                phone: rec.p_phone,
                department: rec.p_department,
                home_church: rec.p_home_church,
                special_needs: rec.p_special_needs,
                import_source: rec.p_import_source,
                imported_at: rec.p_imported_at,
                user_id: rec.p_user_id,
                created_at: rec.p_created_at,
            },
            room: Room {
                id: rec.r_id,
                name: rec.r_name,
                capacity: rec.r_capacity,
                occupied: rec.r_occupied,
                room_type: rec.r_room_type,
                description: rec.r_description,
                building: rec.r_building,
                floor: rec.r_floor,
                bed_type: rec.r_bed_type,
                bed_count: rec.r_bed_count,
                chalet_group: rec.r_chalet_group,
                user_id: rec.r_user_id,
                created_at: rec.r_created_at,
                updated_at: rec.r_updated_at,
            },
        }
    }
}

const ALLOCATION_COLUMNS: &str = "id, person_id, room_id, date_assigned, notes, user_id";

impl Allocation {
    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(&format!(
            "SELECT {ALLOCATION_COLUMNS} FROM allocations ORDER BY date_assigned DESC"
        ))
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Self>(&format!(
            "SELECT {ALLOCATION_COLUMNS} FROM allocations WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    pub async fn find_by_person<'e, E>(
        executor: E,
        person_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Self>(&format!(
            "SELECT {ALLOCATION_COLUMNS} FROM allocations WHERE person_id = $1"
        ))
        .bind(person_id)
        .fetch_optional(executor)
        .await
    }

    pub async fn create<'e, E>(
        executor: E,
        id: Uuid,
        person_id: Uuid,
        room_id: Uuid,
        notes: Option<&str>,
        user_id: Option<&str>,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Self>(&format!(
            "INSERT INTO allocations (id, person_id, room_id, notes, user_id)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {ALLOCATION_COLUMNS}"
        ))
        .bind(id)
        .bind(person_id)
        .bind(room_id)
        .bind(notes)
        .bind(user_id)
        .fetch_one(executor)
        .await
    }

    /// Move an existing allocation to a different room. The assignment
    /// timestamp is refreshed; the row identity is preserved.
    pub async fn repoint<'e, E>(
        executor: E,
        id: Uuid,
        room_id: Uuid,
        notes: Option<&str>,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Self>(&format!(
            "UPDATE allocations
             SET room_id = $2, notes = $3, date_assigned = datetime('now', 'subsec')
             WHERE id = $1
             RETURNING {ALLOCATION_COLUMNS}"
        ))
        .bind(id)
        .bind(room_id)
        .bind(notes)
        .fetch_one(executor)
        .await
    }

    pub async fn update_notes<'e, E>(
        executor: E,
        id: Uuid,
        notes: Option<&str>,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Self>(&format!(
            "UPDATE allocations SET notes = $2 WHERE id = $1 RETURNING {ALLOCATION_COLUMNS}"
        ))
        .bind(id)
        .bind(notes)
        .fetch_one(executor)
        .await
    }

    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM allocations WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn count_for_room<'e, E>(executor: E, room_id: Uuid) -> Result<i64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM allocations WHERE room_id = $1")
            .bind(room_id)
            .fetch_one(executor)
            .await
    }

    /// All allocations joined with their person and room.
    pub async fn find_all_with_details(
        pool: &SqlitePool,
    ) -> Result<Vec<AllocationWithDetails>, sqlx::Error> {
        let records = sqlx::query_as::<_, AllocationDetailsRecord>(
            "SELECT
                a.id            AS a_id,
                a.person_id     AS a_person_id,
                a.room_id       AS a_room_id,
                a.date_assigned AS a_date_assigned,
                a.notes         AS a_notes,
                a.user_id       AS a_user_id,
                p.id            AS p_id,
                p.name          AS p_name,
                p.email         AS p_email,
                p.phone         AS p_phone,
                p.department    AS p_department,
                p.home_church   AS p_home_church,
                p.special_needs AS p_special_needs,
                p.import_source AS p_import_source,
                p.imported_at   AS p_imported_at,
                p.user_id       AS p_user_id,
                p.created_at    AS p_created_at,
                r.id            AS r_id,
                r.name          AS r_name,
                r.capacity      AS r_capacity,
                r.occupied      AS r_occupied,
                r.room_type     AS r_room_type,
                r.description   AS r_description,
                r.building      AS r_building,
                r.floor         AS r_floor,
                r.bed_type      AS r_bed_type,
                r.bed_count     AS r_bed_count,
                r.chalet_group  AS r_chalet_group,
                r.user_id       AS r_user_id,
                r.created_at    AS r_created_at,
                r.updated_at    AS r_updated_at
             FROM allocations a
             JOIN people p ON p.id = a.person_id
             JOIN rooms r ON r.id = a.room_id
             ORDER BY a.date_assigned DESC",
        )
        .fetch_all(pool)
        .await?;

        Ok(records.into_iter().map(Into::into).collect())
    }
}
