// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Relationship lifecycle: connect, accept, reject, disconnect, and the
//! symmetry of the connection mirrors.

use powerplay_api::error::AppError;
use powerplay_api::models::{ConnectionStatus, Role};
use powerplay_api::services::ConnectOutcome;
use powerplay_api::AppState;

mod common;
use common::{flaky_state, seed_pair, test_state, StoreOp};

async fn mirrors(state: &AppState, patient_id: &str, therapist_id: &str) -> (bool, bool) {
    let patient = state.profiles.get_patient(patient_id).await.unwrap();
    let therapist = state.profiles.get_therapist(therapist_id).await.unwrap();
    (
        patient.is_connected_to(therapist_id),
        therapist.is_connected_to(patient_id),
    )
}

#[tokio::test]
async fn test_therapist_connect_is_accepted_and_symmetric() {
    let (state, _) = test_state();
    seed_pair(&state, "p1", "t1").await;

    let outcome = state
        .relationships
        .connect("p1", "t1", Role::Therapist)
        .await
        .unwrap();

    match outcome {
        ConnectOutcome::Created(connection) => {
            assert_eq!(connection.status, ConnectionStatus::Accepted)
        }
        other => panic!("expected a new connection, got {:?}", other),
    }
    assert_eq!(mirrors(&state, "p1", "t1").await, (true, true));
}

#[tokio::test]
async fn test_patient_connect_is_pending_without_mirrors() {
    let (state, _) = test_state();
    seed_pair(&state, "p1", "t1").await;

    let outcome = state
        .relationships
        .connect("p1", "t1", Role::Patient)
        .await
        .unwrap();

    assert_eq!(outcome.connection().status, ConnectionStatus::Pending);
    assert_eq!(mirrors(&state, "p1", "t1").await, (false, false));
}

#[tokio::test]
async fn test_connect_is_idempotent() {
    let (state, memory) = test_state();
    seed_pair(&state, "p1", "t1").await;

    state
        .relationships
        .connect("p1", "t1", Role::Therapist)
        .await
        .unwrap();
    let writes = memory.write_count();

    let again = state
        .relationships
        .connect("p1", "t1", Role::Therapist)
        .await
        .unwrap();

    assert!(matches!(again, ConnectOutcome::AlreadyExists(_)));
    assert_eq!(memory.write_count(), writes, "second connect must not write");
    assert_eq!(
        memory.count(powerplay_api::db::collections::CONNECTIONS),
        1
    );
}

#[tokio::test]
async fn test_connect_requires_both_users() {
    let (state, memory) = test_state();
    state
        .profiles
        .create_patient(common::registration("p1", "p1@example.com"))
        .await
        .unwrap();
    let writes = memory.write_count();

    let result = state
        .relationships
        .connect("p1", "ghost", Role::Therapist)
        .await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
    assert_eq!(memory.write_count(), writes);
}

#[tokio::test]
async fn test_accept_links_mirrors() {
    let (state, _) = test_state();
    seed_pair(&state, "p1", "t1").await;

    state
        .relationships
        .connect("p1", "t1", Role::Patient)
        .await
        .unwrap();
    let connection = state
        .relationships
        .accept_connection("p1", "t1")
        .await
        .unwrap();

    assert_eq!(connection.status, ConnectionStatus::Accepted);
    assert_eq!(mirrors(&state, "p1", "t1").await, (true, true));
}

#[tokio::test]
async fn test_double_accept_is_not_found() {
    let (state, _) = test_state();
    seed_pair(&state, "p1", "t1").await;

    state
        .relationships
        .connect("p1", "t1", Role::Patient)
        .await
        .unwrap();
    state
        .relationships
        .accept_connection("p1", "t1")
        .await
        .unwrap();

    let second = state.relationships.accept_connection("p1", "t1").await;
    assert!(matches!(second, Err(AppError::NotFound(_))));
    assert_eq!(mirrors(&state, "p1", "t1").await, (true, true));
}

#[tokio::test]
async fn test_accept_with_stale_mirror_is_compensated() {
    let (state, _) = test_state();
    seed_pair(&state, "p1", "t1").await;

    state
        .relationships
        .connect("p1", "t1", Role::Patient)
        .await
        .unwrap();

    // A leftover mirror entry on the therapist side.
    state
        .store
        .update_one(
            powerplay_api::db::collections::THERAPISTS,
            &powerplay_api::db::Filter::key("t1"),
            &powerplay_api::db::Update::new().add_to_set("connections", "p1"),
        )
        .await
        .unwrap();

    let result = state.relationships.accept_connection("p1", "t1").await;
    assert!(matches!(result, Err(AppError::Conflict(_))));

    // Patient mirror rolled back, connection back to pending.
    let patient = state.profiles.get_patient("p1").await.unwrap();
    assert!(!patient.is_connected_to("t1"));
    let connections = state
        .relationships
        .list_connections("p1", Role::Patient)
        .await
        .unwrap();
    assert_eq!(connections.len(), 1);
    assert_eq!(connections[0].status, ConnectionStatus::Pending);
}

#[tokio::test]
async fn test_therapist_connect_with_stale_patient_mirror_is_conflict() {
    let (state, memory) = test_state();
    seed_pair(&state, "p1", "t1").await;

    state
        .store
        .update_one(
            powerplay_api::db::collections::PATIENTS,
            &powerplay_api::db::Filter::key("p1"),
            &powerplay_api::db::Update::new().add_to_set("connections", "t1"),
        )
        .await
        .unwrap();

    let result = state
        .relationships
        .connect("p1", "t1", Role::Therapist)
        .await;

    assert!(matches!(result, Err(AppError::Conflict(_))));
    assert_eq!(memory.count(powerplay_api::db::collections::CONNECTIONS), 0);
    // Only the pre-existing entry remains; the therapist side was never touched.
    assert_eq!(mirrors(&state, "p1", "t1").await, (true, false));
}

#[tokio::test]
async fn test_therapist_connect_unwinds_mirrors_when_insert_fails() {
    let (state, flaky, memory) = flaky_state();
    seed_pair(&state, "p1", "t1").await;

    flaky.fail_once(StoreOp::Insert, powerplay_api::db::collections::CONNECTIONS);
    let result = state
        .relationships
        .connect("p1", "t1", Role::Therapist)
        .await;

    assert!(matches!(result, Err(AppError::Database(_))));
    assert_eq!(memory.count(powerplay_api::db::collections::CONNECTIONS), 0);
    assert_eq!(mirrors(&state, "p1", "t1").await, (false, false));

    // Nothing is left behind to block a later attempt.
    let outcome = state
        .relationships
        .connect("p1", "t1", Role::Therapist)
        .await
        .unwrap();
    assert!(matches!(outcome, ConnectOutcome::Created(_)));
    assert_eq!(mirrors(&state, "p1", "t1").await, (true, true));
}

#[tokio::test]
async fn test_reject_only_removes_pending() {
    let (state, _) = test_state();
    seed_pair(&state, "p1", "t1").await;
    seed_pair(&state, "p2", "t2").await;

    state
        .relationships
        .connect("p1", "t1", Role::Patient)
        .await
        .unwrap();
    state
        .relationships
        .reject_connection("p1", "t1")
        .await
        .unwrap();
    assert!(matches!(
        state.relationships.reject_connection("p1", "t1").await,
        Err(AppError::NotFound(_))
    ));

    state
        .relationships
        .connect("p2", "t2", Role::Therapist)
        .await
        .unwrap();
    assert!(matches!(
        state.relationships.reject_connection("p2", "t2").await,
        Err(AppError::NotFound(_))
    ));
    assert_eq!(mirrors(&state, "p2", "t2").await, (true, true));
}

#[tokio::test]
async fn test_disconnect_without_mirrors_is_conflict_without_writes() {
    let (state, memory) = test_state();
    seed_pair(&state, "p1", "t1").await;

    state
        .relationships
        .connect("p1", "t1", Role::Patient)
        .await
        .unwrap();
    let writes = memory.write_count();

    let result = state.relationships.disconnect("p1", "t1").await;

    assert!(matches!(result, Err(AppError::Conflict(_))));
    assert_eq!(memory.write_count(), writes);
}

#[tokio::test]
async fn test_connect_accept_disconnect_scenario() {
    let (state, memory) = test_state();
    seed_pair(&state, "p1", "t1").await;

    state
        .relationships
        .connect("p1", "t1", Role::Patient)
        .await
        .unwrap();
    state
        .relationships
        .accept_connection("p1", "t1")
        .await
        .unwrap();
    assert_eq!(mirrors(&state, "p1", "t1").await, (true, true));

    let listed = state
        .relationships
        .list_connections("t1", Role::Therapist)
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, "p1");
    assert_eq!(listed[0].firstname, "First p1");

    state.relationships.disconnect("p1", "t1").await.unwrap();

    assert_eq!(mirrors(&state, "p1", "t1").await, (false, false));
    assert_eq!(
        memory.count(powerplay_api::db::collections::CONNECTIONS),
        0
    );
    assert!(matches!(
        state.relationships.disconnect("p1", "t1").await,
        Err(AppError::Conflict(_))
    ));
}

#[tokio::test]
async fn test_toggle_mute_and_details() {
    let (state, _) = test_state();
    seed_pair(&state, "p1", "t1").await;
    state
        .relationships
        .connect("p1", "t1", Role::Therapist)
        .await
        .unwrap();

    assert!(state.relationships.toggle_mute("p1", "t1").await.unwrap());
    assert!(!state.relationships.toggle_mute("p1", "t1").await.unwrap());

    let empty = state
        .relationships
        .get_connection_details("p1", "t1")
        .await
        .unwrap();
    assert_eq!(empty.diagnosis, "");
    assert_eq!(empty.notes, "");

    let updated = state
        .relationships
        .update_connection_details(
            "p1",
            "t1",
            powerplay_api::services::ConnectionDetailsUpdate {
                diagnosis: Some("ACL tear".to_string()),
                notes: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.diagnosis, "ACL tear");
    assert_eq!(updated.notes, "");

    assert!(matches!(
        state.relationships.toggle_mute("p1", "nobody").await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_list_connections_skips_dangling_counterparts() {
    let (state, memory) = test_state();
    seed_pair(&state, "p1", "t1").await;
    state
        .profiles
        .create_therapist(common::registration("t2", "t2@example.com"))
        .await
        .unwrap();

    state
        .relationships
        .connect("p1", "t1", Role::Patient)
        .await
        .unwrap();
    state
        .relationships
        .connect("p1", "t2", Role::Patient)
        .await
        .unwrap();

    state
        .store
        .delete_one(
            powerplay_api::db::collections::THERAPISTS,
            &powerplay_api::db::Filter::key("t2"),
        )
        .await
        .unwrap();
    assert_eq!(memory.count(powerplay_api::db::collections::CONNECTIONS), 2);

    let listed = state
        .relationships
        .list_connections("p1", Role::Patient)
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, "t1");
    assert_eq!(listed[0].status, ConnectionStatus::Pending);
}
