// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore integration tests.
//!
//! These tests require the Firestore emulator to be running
//! (`FIRESTORE_EMULATOR_HOST`). Every test uses unique keys so runs do not
//! interfere with each other.

use powerplay_api::config::Config;
use powerplay_api::db::{DocumentStore, Filter, Update};
use powerplay_api::error::AppError;
use powerplay_api::models::Role;
use powerplay_api::AppState;
use serde_json::json;
use std::sync::Arc;

mod common;
use common::{test_db, unique_id};

fn doc(value: serde_json::Value) -> powerplay_api::db::Document {
    value.as_object().cloned().unwrap()
}

// ═══════════════════════════════════════════════════════════════════════════
// GATEWAY TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_insert_find_and_duplicate() {
    require_emulator!();

    let db = test_db().await;
    let key = unique_id("ex");

    db.insert_one(
        "Exercises",
        doc(json!({"_id": key, "title": "Squat", "reps": 10})),
    )
    .await
    .unwrap();

    let fetched = db.find_by_key("Exercises", &key).await.unwrap().unwrap();
    assert_eq!(fetched["title"], "Squat");
    assert_eq!(fetched["_id"], json!(key));

    let duplicate = db
        .insert_one("Exercises", doc(json!({"_id": key, "title": "Again"})))
        .await;
    assert!(matches!(duplicate, Err(AppError::Conflict(_))));

    println!("✓ Insert/find/duplicate verified: {}", key);
}

#[tokio::test]
async fn test_update_counts_and_array_semantics() {
    require_emulator!();

    let db = test_db().await;
    let key = unique_id("patient");
    db.insert_one("Patients", doc(json!({"_id": key, "username": "u"})))
        .await
        .unwrap();

    let add = Update::new().add_to_set("assigned_routines", json!({"_id": "r1"}));
    let first = db
        .update_one("Patients", &Filter::key(&key), &add)
        .await
        .unwrap();
    assert_eq!((first.matched, first.modified), (1, 1));

    let again = db
        .update_one("Patients", &Filter::key(&key), &add)
        .await
        .unwrap();
    assert_eq!((again.matched, again.modified), (1, 0));

    let holders = db
        .find_many("Patients", &Filter::array_has_ref("assigned_routines", "r1"))
        .await
        .unwrap();
    assert!(holders.iter().any(|d| d["_id"] == json!(key)));

    let pull = Update::new().pull("assigned_routines", json!({"_id": "r1"}));
    let pulled = db
        .update_one("Patients", &Filter::key(&key), &pull)
        .await
        .unwrap();
    assert_eq!(pulled.modified, 1);

    let missing = db
        .update_one("Patients", &Filter::key(unique_id("ghost")), &add)
        .await
        .unwrap();
    assert_eq!(missing.matched, 0);
}

#[tokio::test]
async fn test_concurrent_set_additions_are_all_kept() {
    require_emulator!();

    let db = test_db().await;
    let key = unique_id("patient");
    db.insert_one("Patients", doc(json!({"_id": key, "connections": []})))
        .await
        .unwrap();

    let counterparts: Vec<String> = (0..4).map(|i| format!("t{}", i)).collect();
    let results = futures_util::future::join_all(counterparts.iter().map(|id| {
        let update = Update::new().add_to_set("connections", id.as_str());
        let db = &db;
        let key = &key;
        async move { db.update_one("Patients", &Filter::key(key), &update).await }
    }))
    .await;
    for result in results {
        assert_eq!(result.unwrap().modified, 1);
    }

    let stored = db.find_by_key("Patients", &key).await.unwrap().unwrap();
    let connections = stored["connections"].as_array().unwrap();
    assert_eq!(connections.len(), counterparts.len());
    for id in &counterparts {
        assert!(connections.contains(&json!(id)));
    }
}

#[tokio::test]
async fn test_field_query_and_delete_many() {
    require_emulator!();

    let db = test_db().await;
    let owner = unique_id("owner");
    let keys: Vec<String> = (0..3).map(|i| format!("{}-{}", owner, i)).collect();
    for key in &keys {
        db.insert_one(
            "Messages",
            doc(json!({"_id": key, "sender_id": owner, "receiver_id": "x", "timestamp": "t"})),
        )
        .await
        .unwrap();
    }

    let sent = db
        .find_many("Messages", &Filter::field_eq("sender_id", owner.as_str()))
        .await
        .unwrap();
    assert_eq!(sent.len(), 3);

    let by_key = db
        .find_many("Messages", &Filter::key_in(keys.clone()))
        .await
        .unwrap();
    assert_eq!(by_key.len(), 3);

    let deleted = db
        .delete_many("Messages", &Filter::key_in(keys))
        .await
        .unwrap();
    assert_eq!(deleted, 3);
}

// ═══════════════════════════════════════════════════════════════════════════
// SERVICE TESTS ON FIRESTORE
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_relationship_lifecycle_on_firestore() {
    require_emulator!();

    let store: Arc<dyn DocumentStore> = Arc::new(test_db().await);
    let state = AppState::new(Config::default(), store);
    let patient_id = unique_id("p");
    let therapist_id = unique_id("t");

    state
        .profiles
        .create_patient(common::registration(&patient_id, "p@example.com"))
        .await
        .unwrap();
    state
        .profiles
        .create_therapist(common::registration(&therapist_id, "t@example.com"))
        .await
        .unwrap();

    state
        .relationships
        .connect(&patient_id, &therapist_id, Role::Patient)
        .await
        .unwrap();
    state
        .relationships
        .accept_connection(&patient_id, &therapist_id)
        .await
        .unwrap();

    let patient = state.profiles.get_patient(&patient_id).await.unwrap();
    let therapist = state.profiles.get_therapist(&therapist_id).await.unwrap();
    assert!(patient.is_connected_to(&therapist_id));
    assert!(therapist.is_connected_to(&patient_id));

    state
        .relationships
        .disconnect(&patient_id, &therapist_id)
        .await
        .unwrap();

    let patient = state.profiles.get_patient(&patient_id).await.unwrap();
    assert!(patient.connections.is_empty());

    println!("✓ Relationship lifecycle verified on Firestore");
}
