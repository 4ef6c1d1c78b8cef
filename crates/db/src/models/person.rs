use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

use super::{allocation::Allocation, room::Room};

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Person {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub home_church: Option<String>,
    pub special_needs: Option<String>,
    pub import_source: Option<String>,
    pub imported_at: Option<DateTime<Utc>>,
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Person plus the derived back-reference to their room, if any. The room
/// reference is never stored; it is computed from the allocation rows, so it
/// cannot go stale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct PersonWithRoom {
    #[serde(flatten)]
    #[ts(flatten)]
    pub person: Person,
    pub room_id: Option<Uuid>,
    pub room_name: Option<String>,
}

impl std::ops::Deref for PersonWithRoom {
    type Target = Person;
    fn deref(&self) -> &Self::Target {
        &self.person
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreatePerson {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub home_church: Option<String>,
    pub special_needs: Option<String>,
    pub import_source: Option<String>,
    pub user_id: Option<String>,
}

#[derive(FromRow)]
struct PersonRoomRecord {
    id: Uuid,
    name: String,
    email: String,
    phone: Option<String>,
    department: Option<String>,
    home_church: Option<String>,
    special_needs: Option<String>,
    import_source: Option<String>,
    imported_at: Option<DateTime<Utc>>,
    user_id: Option<String>,
    created_at: DateTime<Utc>,
    room_id: Option<Uuid>,
    room_name: Option<String>,
}

const PERSON_COLUMNS: &str = "id, name, email, phone, department, home_church, special_needs, \
     import_source, imported_at, user_id, created_at";

impl Person {
    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(&format!(
            "SELECT {PERSON_COLUMNS} FROM people ORDER BY name ASC"
        ))
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Self>(&format!("SELECT {PERSON_COLUMNS} FROM people WHERE id = $1"))
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    pub async fn create<'e, E>(
        executor: E,
        id: Uuid,
        data: &CreatePerson,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Self>(&format!(
            "INSERT INTO people (id, name, email, phone, department, home_church, special_needs, \
             import_source, user_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {PERSON_COLUMNS}"
        ))
        .bind(id)
        .bind(&data.name)
        .bind(&data.email)
        .bind(&data.phone)
        .bind(&data.department)
        .bind(&data.home_church)
        .bind(&data.special_needs)
        .bind(&data.import_source)
        .bind(&data.user_id)
        .fetch_one(executor)
        .await
    }

    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM people WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    /// All people with their derived room back-reference.
    pub async fn find_all_with_room(pool: &SqlitePool) -> Result<Vec<PersonWithRoom>, sqlx::Error> {
        let records = sqlx::query_as::<_, PersonRoomRecord>(
            "SELECT
                p.id, p.name, p.email, p.phone, p.department, p.home_church, p.special_needs,
                p.import_source, p.imported_at, p.user_id, p.created_at,
                a.room_id AS room_id,
                r.name    AS room_name
             FROM people p
             LEFT JOIN allocations a ON a.person_id = p.id
             LEFT JOIN rooms r ON r.id = a.room_id
             ORDER BY p.name ASC",
        )
        .fetch_all(pool)
        .await?;

        Ok(records
            .into_iter()
            .map(|rec| PersonWithRoom {
                person: Person {
                    id: rec.id,
                    name: rec.name,
                    email: rec.email,
                    phone: rec.phone,
                    department: rec.department,
                    home_church: rec.home_church,
                    special_needs: rec.special_needs,
                    import_source: rec.import_source,
                    imported_at: rec.imported_at,
                    user_id: rec.user_id,
                    created_at: rec.created_at,
                },
                room_id: rec.room_id,
                room_name: rec.room_name,
            })
            .collect())
    }

    /// Pure mapping of a person onto their room back-reference, given the
    /// current allocation and room collections. An allocation pointing at an
    /// unknown room still yields the room id with no name.
    pub fn with_room(person: Person, allocations: &[Allocation], rooms: &[Room]) -> PersonWithRoom {
        let room_id = allocations
            .iter()
            .find(|a| a.person_id == person.id)
            .map(|a| a.room_id);
        let room_name =
            room_id.and_then(|id| rooms.iter().find(|r| r.id == id).map(|r| r.name.clone()));
        PersonWithRoom {
            person,
            room_id,
            room_name,
        }
    }
}
