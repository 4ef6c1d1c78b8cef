//! Allocation core behavior against an in-memory database: capacity
//! enforcement, move semantics, batch reconciliation, removal, and the
//! occupancy invariant across operation sequences.

use db::{
    DBService,
    models::{
        allocation::Allocation,
        person::{CreatePerson, Person},
        room::{CreateRoom, Room},
    },
};
use services::services::allocation::{
    AllocationError, AllocationService, ChaletUnit, CreateChalet, RemoveOutcome,
};
use sqlx::SqlitePool;
use uuid::Uuid;

async fn test_db() -> DBService {
    DBService::new_in_memory().await.expect("in-memory db")
}

async fn seed_room(pool: &SqlitePool, name: &str, capacity: i64) -> Room {
    AllocationService::create_room(
        pool,
        CreateRoom {
            name: name.to_string(),
            capacity,
            room_type: None,
            description: None,
            building: None,
            floor: None,
            bed_type: None,
            bed_count: None,
            chalet_group: None,
            user_id: None,
        },
    )
    .await
    .expect("room created")
}

async fn seed_person(pool: &SqlitePool, name: &str) -> Person {
    Person::create(
        pool,
        Uuid::new_v4(),
        &CreatePerson {
            name: name.to_string(),
            email: format!("{}@example.org", name.to_lowercase()),
            phone: None,
            department: None,
            home_church: None,
            special_needs: None,
            import_source: None,
            user_id: None,
        },
    )
    .await
    .expect("person created")
}

async fn occupied(pool: &SqlitePool, room_id: Uuid) -> i64 {
    Room::find_by_id(pool, room_id)
        .await
        .unwrap()
        .expect("room exists")
        .occupied
}

async fn allocation_rows(pool: &SqlitePool, room_id: Uuid) -> i64 {
    Allocation::count_for_room(pool, room_id).await.unwrap()
}

/// The one recurring invariant: every room's counter equals its allocation
/// count.
async fn assert_occupancy_consistent(pool: &SqlitePool) {
    let drift = AllocationService::audit_occupancy(pool).await.unwrap();
    assert!(drift.is_empty(), "occupancy drift detected: {drift:?}");
}

#[tokio::test]
async fn single_assignment_creates_row_and_increments() {
    let db = test_db().await;
    let room = seed_room(&db.pool, "Chalet 1A", 4).await;
    let person = seed_person(&db.pool, "Ada").await;

    let outcome = AllocationService::save(&db.pool, person.id, room.id, None)
        .await
        .unwrap();
    assert_eq!(outcome.allocation.person_id, person.id);
    assert_eq!(outcome.allocation.room_id, room.id);
    assert!(outcome.moved_from.is_none());

    assert_eq!(occupied(&db.pool, room.id).await, 1);
    assert_eq!(allocation_rows(&db.pool, room.id).await, 1);

    let people = Person::find_all_with_room(&db.pool).await.unwrap();
    assert_eq!(people[0].room_id, Some(room.id));
    assert_eq!(people[0].room_name.as_deref(), Some("Chalet 1A"));
    assert_occupancy_consistent(&db.pool).await;
}

#[tokio::test]
async fn move_repoints_existing_allocation() {
    let db = test_db().await;
    let room_a = seed_room(&db.pool, "A", 2).await;
    let room_b = seed_room(&db.pool, "B", 2).await;
    let room_c = seed_room(&db.pool, "C", 2).await;
    let person = seed_person(&db.pool, "Ada").await;

    let first = AllocationService::save(&db.pool, person.id, room_a.id, None)
        .await
        .unwrap();
    let moved = AllocationService::save(&db.pool, person.id, room_b.id, None)
        .await
        .unwrap();

    // Same row, repointed; no second row anywhere.
    assert_eq!(moved.allocation.id, first.allocation.id);
    assert_eq!(moved.moved_from, Some(room_a.id));
    assert_eq!(Allocation::find_all(&db.pool).await.unwrap().len(), 1);

    assert_eq!(occupied(&db.pool, room_a.id).await, 0);
    assert_eq!(occupied(&db.pool, room_b.id).await, 1);
    assert_eq!(occupied(&db.pool, room_c.id).await, 0);
    assert_occupancy_consistent(&db.pool).await;
}

#[tokio::test]
async fn saving_into_current_room_only_updates_notes() {
    let db = test_db().await;
    let room = seed_room(&db.pool, "A", 1).await;
    let person = seed_person(&db.pool, "Ada").await;

    AllocationService::save(&db.pool, person.id, room.id, None)
        .await
        .unwrap();
    // Room is now full; re-saving the same person must still succeed.
    let outcome =
        AllocationService::save(&db.pool, person.id, room.id, Some("window bed".to_string()))
            .await
            .unwrap();
    assert_eq!(outcome.allocation.notes.as_deref(), Some("window bed"));
    assert_eq!(occupied(&db.pool, room.id).await, 1);
    assert_occupancy_consistent(&db.pool).await;
}

#[tokio::test]
async fn capacity_exceeded_blocks_before_any_write() {
    let db = test_db().await;
    let room = seed_room(&db.pool, "A", 1).await;
    let ada = seed_person(&db.pool, "Ada").await;
    let bob = seed_person(&db.pool, "Bob").await;

    AllocationService::save(&db.pool, ada.id, room.id, None)
        .await
        .unwrap();
    let err = AllocationService::save(&db.pool, bob.id, room.id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AllocationError::CapacityExceeded { .. }));

    assert_eq!(occupied(&db.pool, room.id).await, 1);
    assert_eq!(allocation_rows(&db.pool, room.id).await, 1);
    assert_occupancy_consistent(&db.pool).await;
}

#[tokio::test]
async fn batch_rejected_when_over_capacity() {
    let db = test_db().await;
    let room = seed_room(&db.pool, "A", 3).await;
    let ada = seed_person(&db.pool, "Ada").await;
    AllocationService::save(&db.pool, ada.id, room.id, None)
        .await
        .unwrap();

    let mut batch = Vec::new();
    for name in ["Bob", "Carol", "Dave"] {
        batch.push(seed_person(&db.pool, name).await.id);
    }
    // 3 requested, 2 free.
    let err = AllocationService::save_batch(&db.pool, &batch, room.id, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AllocationError::InsufficientCapacity {
            requested: 3,
            available: 2,
            ..
        }
    ));

    // Zero writes happened.
    assert_eq!(occupied(&db.pool, room.id).await, 1);
    assert_eq!(allocation_rows(&db.pool, room.id).await, 1);
    assert_occupancy_consistent(&db.pool).await;
}

#[tokio::test]
async fn batch_mixes_new_and_moved_people() {
    let db = test_db().await;
    let old_room = seed_room(&db.pool, "Old", 2).await;
    let target = seed_room(&db.pool, "Target", 3).await;
    let mover = seed_person(&db.pool, "Mover").await;
    let fresh_a = seed_person(&db.pool, "FreshA").await;
    let fresh_b = seed_person(&db.pool, "FreshB").await;

    AllocationService::save(&db.pool, mover.id, old_room.id, None)
        .await
        .unwrap();

    let outcome = AllocationService::save_batch(
        &db.pool,
        &[mover.id, fresh_a.id, fresh_b.id],
        target.id,
        None,
    )
    .await
    .unwrap();
    assert_eq!(outcome.assigned, 2);
    assert_eq!(outcome.moved, 1);

    assert_eq!(occupied(&db.pool, old_room.id).await, 0);
    assert_eq!(occupied(&db.pool, target.id).await, 3);
    assert_eq!(Allocation::find_all(&db.pool).await.unwrap().len(), 3);
    assert_occupancy_consistent(&db.pool).await;
}

#[tokio::test]
async fn batch_requires_at_least_one_person() {
    let db = test_db().await;
    let room = seed_room(&db.pool, "A", 3).await;
    let err = AllocationService::save_batch(&db.pool, &[], room.id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AllocationError::Validation(_)));
}

#[tokio::test]
async fn removal_decrements_and_clears_reference() {
    let db = test_db().await;
    let room = seed_room(&db.pool, "A", 2).await;
    let person = seed_person(&db.pool, "Ada").await;
    let saved = AllocationService::save(&db.pool, person.id, room.id, None)
        .await
        .unwrap();

    let outcome = AllocationService::remove(&db.pool, saved.allocation.id)
        .await
        .unwrap();
    assert_eq!(outcome, RemoveOutcome::Removed { room_id: room.id });

    assert_eq!(occupied(&db.pool, room.id).await, 0);
    assert_eq!(allocation_rows(&db.pool, room.id).await, 0);
    let people = Person::find_all_with_room(&db.pool).await.unwrap();
    assert_eq!(people[0].room_id, None);
    assert_eq!(people[0].room_name, None);
    assert_occupancy_consistent(&db.pool).await;
}

#[tokio::test]
async fn removing_unknown_id_is_a_noop() {
    let db = test_db().await;
    let room = seed_room(&db.pool, "A", 2).await;
    let person = seed_person(&db.pool, "Ada").await;
    AllocationService::save(&db.pool, person.id, room.id, None)
        .await
        .unwrap();

    let outcome = AllocationService::remove(&db.pool, Uuid::new_v4())
        .await
        .unwrap();
    assert_eq!(outcome, RemoveOutcome::NotFound);
    assert_eq!(occupied(&db.pool, room.id).await, 1);
    assert_eq!(allocation_rows(&db.pool, room.id).await, 1);
}

#[tokio::test]
async fn capacity_lifecycle_end_to_end() {
    let db = test_db().await;
    let room = seed_room(&db.pool, "R", 2).await;
    let a = seed_person(&db.pool, "A").await;
    let b = seed_person(&db.pool, "B").await;
    let c = seed_person(&db.pool, "C").await;

    let saved_a = AllocationService::save(&db.pool, a.id, room.id, None)
        .await
        .unwrap();
    assert_eq!(occupied(&db.pool, room.id).await, 1);

    AllocationService::save(&db.pool, b.id, room.id, None)
        .await
        .unwrap();
    assert_eq!(occupied(&db.pool, room.id).await, 2);

    let err = AllocationService::save(&db.pool, c.id, room.id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AllocationError::CapacityExceeded { .. }));
    assert_eq!(occupied(&db.pool, room.id).await, 2);

    AllocationService::remove(&db.pool, saved_a.allocation.id)
        .await
        .unwrap();
    assert_eq!(occupied(&db.pool, room.id).await, 1);
    let a_ref = Person::find_all_with_room(&db.pool)
        .await
        .unwrap()
        .into_iter()
        .find(|p| p.person.id == a.id)
        .unwrap();
    assert_eq!(a_ref.room_id, None);
    assert_occupancy_consistent(&db.pool).await;
}

#[tokio::test]
async fn unknown_room_and_person_are_reported() {
    let db = test_db().await;
    let room = seed_room(&db.pool, "A", 2).await;
    let person = seed_person(&db.pool, "Ada").await;

    let err = AllocationService::save(&db.pool, person.id, Uuid::new_v4(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AllocationError::RoomNotFound(_)));

    let err = AllocationService::save(&db.pool, Uuid::new_v4(), room.id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AllocationError::PersonNotFound(_)));
}

#[tokio::test]
async fn batch_with_unknown_person_commits_nothing() {
    let db = test_db().await;
    let room = seed_room(&db.pool, "A", 5).await;
    let ada = seed_person(&db.pool, "Ada").await;

    let err = AllocationService::save_batch(&db.pool, &[ada.id, Uuid::new_v4()], room.id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AllocationError::PersonNotFound(_)));

    // The transaction rolled back; Ada was not allocated either.
    assert_eq!(occupied(&db.pool, room.id).await, 0);
    assert_eq!(allocation_rows(&db.pool, room.id).await, 0);
    assert_occupancy_consistent(&db.pool).await;
}

#[tokio::test]
async fn create_room_validates_required_fields() {
    let db = test_db().await;
    let err = AllocationService::create_room(
        &db.pool,
        CreateRoom {
            name: "  ".to_string(),
            capacity: 4,
            room_type: None,
            description: None,
            building: None,
            floor: None,
            bed_type: None,
            bed_count: None,
            chalet_group: None,
            user_id: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AllocationError::Validation(_)));
    assert!(Room::find_all(&db.pool).await.unwrap().is_empty());
}

#[tokio::test]
async fn create_chalet_inserts_siblings_with_shared_group() {
    let db = test_db().await;
    let rooms = AllocationService::create_chalet(
        &db.pool,
        CreateChalet {
            chalet_group: "Chalet 7".to_string(),
            building: Some("North".to_string()),
            rooms: vec![
                ChaletUnit {
                    name: "7A".to_string(),
                    capacity: 2,
                    description: None,
                    bed_type: Some("bunk".to_string()),
                    bed_count: Some(2),
                },
                ChaletUnit {
                    name: "7B".to_string(),
                    capacity: 4,
                    description: None,
                    bed_type: None,
                    bed_count: None,
                },
            ],
            user_id: None,
        },
    )
    .await
    .unwrap();

    assert_eq!(rooms.len(), 2);
    for room in &rooms {
        assert_eq!(room.chalet_group.as_deref(), Some("Chalet 7"));
        assert_eq!(room.building.as_deref(), Some("North"));
        assert_eq!(room.occupied, 0);
    }
    assert_eq!(rooms[0].capacity, 2);
    assert_eq!(rooms[1].capacity, 4);
}

#[tokio::test]
async fn create_chalet_rejects_invalid_sibling_without_writes() {
    let db = test_db().await;
    let err = AllocationService::create_chalet(
        &db.pool,
        CreateChalet {
            chalet_group: "Chalet 8".to_string(),
            building: None,
            rooms: vec![
                ChaletUnit {
                    name: "8A".to_string(),
                    capacity: 2,
                    description: None,
                    bed_type: None,
                    bed_count: None,
                },
                ChaletUnit {
                    name: "8B".to_string(),
                    capacity: 0,
                    description: None,
                    bed_type: None,
                    bed_count: None,
                },
            ],
            user_id: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AllocationError::Validation(_)));
    assert!(Room::find_all(&db.pool).await.unwrap().is_empty());
}

#[tokio::test]
async fn audit_reports_and_repair_fixes_drift() {
    let db = test_db().await;
    let room = seed_room(&db.pool, "A", 4).await;
    let person = seed_person(&db.pool, "Ada").await;
    AllocationService::save(&db.pool, person.id, room.id, None)
        .await
        .unwrap();

    // Force the counter out of sync, as a crashed writer without
    // transactions would have.
    sqlx::query("UPDATE rooms SET occupied = 3 WHERE id = $1")
        .bind(room.id)
        .execute(&db.pool)
        .await
        .unwrap();

    let drift = AllocationService::audit_occupancy(&db.pool).await.unwrap();
    assert_eq!(drift.len(), 1);
    assert_eq!(drift[0].recorded, 3);
    assert_eq!(drift[0].actual, 1);

    let repaired = AllocationService::repair_occupancy(&db.pool).await.unwrap();
    assert_eq!(repaired, 1);
    assert_eq!(occupied(&db.pool, room.id).await, 1);
    assert_occupancy_consistent(&db.pool).await;
}
