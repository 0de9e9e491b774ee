// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use async_trait::async_trait;
use powerplay_api::config::Config;
use powerplay_api::db::{Document, DocumentStore, Filter, FirestoreDb, InMemoryDb, Update, UpdateOutcome};
use powerplay_api::error::AppError;
use powerplay_api::models::{ExerciseDraft, Registration};
use powerplay_api::routes::create_router;
use powerplay_api::AppState;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Unique suffix for test isolation against a shared emulator.
#[allow(dead_code)]
pub fn unique_id(prefix: &str) -> String {
    format!("{}-{}", prefix, uuid::Uuid::new_v4())
}

/// Shared state on a fresh in-memory store. The store is returned too so
/// tests can inspect write counts.
#[allow(dead_code)]
pub fn test_state() -> (Arc<AppState>, Arc<InMemoryDb>) {
    let memory = Arc::new(InMemoryDb::new());
    let store: Arc<dyn DocumentStore> = memory.clone();
    let state = Arc::new(AppState::new(Config::default(), store));
    (state, memory)
}

/// Store operations that [`FlakyStore`] can be told to fail.
#[allow(dead_code)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Insert,
    Update,
    Delete,
    DeleteMany,
}

/// In-memory store that fails the next matching write once.
#[allow(dead_code)]
pub struct FlakyStore {
    inner: Arc<InMemoryDb>,
    armed: Mutex<Option<(StoreOp, &'static str)>>,
}

#[allow(dead_code)]
impl FlakyStore {
    pub fn new(inner: Arc<InMemoryDb>) -> Self {
        Self {
            inner,
            armed: Mutex::new(None),
        }
    }

    /// Fail the next `op` against `collection`.
    pub fn fail_once(&self, op: StoreOp, collection: &'static str) {
        *self.armed.lock().unwrap() = Some((op, collection));
    }

    fn trip(&self, op: StoreOp, collection: &str) -> Result<(), AppError> {
        let mut armed = self.armed.lock().unwrap();
        if matches!(*armed, Some((o, c)) if o == op && c == collection) {
            *armed = None;
            return Err(AppError::Database("transient".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn find_by_key(&self, collection: &str, key: &str) -> Result<Option<Document>, AppError> {
        self.inner.find_by_key(collection, key).await
    }

    async fn find_many(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>, AppError> {
        self.inner.find_many(collection, filter).await
    }

    async fn insert_one(&self, collection: &str, doc: Document) -> Result<String, AppError> {
        self.trip(StoreOp::Insert, collection)?;
        self.inner.insert_one(collection, doc).await
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> Result<UpdateOutcome, AppError> {
        self.trip(StoreOp::Update, collection)?;
        self.inner.update_one(collection, filter, update).await
    }

    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<u64, AppError> {
        self.trip(StoreOp::Delete, collection)?;
        self.inner.delete_one(collection, filter).await
    }

    async fn delete_many(&self, collection: &str, filter: &Filter) -> Result<u64, AppError> {
        self.trip(StoreOp::DeleteMany, collection)?;
        self.inner.delete_many(collection, filter).await
    }
}

/// Shared state on a store whose writes can be made to fail.
#[allow(dead_code)]
pub fn flaky_state() -> (Arc<AppState>, Arc<FlakyStore>, Arc<InMemoryDb>) {
    let memory = Arc::new(InMemoryDb::new());
    let flaky = Arc::new(FlakyStore::new(memory.clone()));
    let store: Arc<dyn DocumentStore> = flaky.clone();
    let state = Arc::new(AppState::new(Config::default(), store));
    (state, flaky, memory)
}

/// Create a test app on an in-memory store.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (Router, Arc<AppState>) {
    let (state, _) = test_state();
    (create_router(state.clone()), state)
}

#[allow(dead_code)]
pub fn registration(id: &str, email: &str) -> Registration {
    Registration {
        id: id.to_string(),
        username: id.to_string(),
        firstname: format!("First {}", id),
        lastname: format!("Last {}", id),
        email: email.to_string(),
    }
}

/// Register a patient and a therapist.
#[allow(dead_code)]
pub async fn seed_pair(state: &AppState, patient_id: &str, therapist_id: &str) {
    state
        .profiles
        .create_patient(registration(patient_id, &format!("{}@example.com", patient_id)))
        .await
        .unwrap();
    state
        .profiles
        .create_therapist(registration(
            therapist_id,
            &format!("{}@example.com", therapist_id),
        ))
        .await
        .unwrap();
}

#[allow(dead_code)]
pub async fn seed_exercise(state: &AppState, title: &str) -> String {
    state
        .exercises
        .create_exercises(vec![ExerciseDraft {
            title: title.to_string(),
            category: "Knee".to_string(),
            subcategory: "Strength".to_string(),
            reps: 10,
            ..Default::default()
        }])
        .await
        .unwrap()
        .remove(0)
}

/// Send a request through the router and decode the JSON response.
#[allow(dead_code)]
pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, json)
}
