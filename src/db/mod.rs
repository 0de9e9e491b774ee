//! Database layer: the storage gateway and its backends.

pub mod document;
pub mod firestore;
pub mod memory;

pub use document::{Document, Filter, Update, UpdateOutcome};
pub use firestore::FirestoreDb;
pub use memory::InMemoryDb;

use crate::error::AppError;
use async_trait::async_trait;
use document::from_document;
use serde::de::DeserializeOwned;

/// Collection names as constants.
pub mod collections {
    pub const PATIENTS: &str = "Patients";
    pub const THERAPISTS: &str = "Therapists";
    pub const EXERCISES: &str = "Exercises";
    pub const ROUTINES: &str = "Routines";
    pub const CONNECTIONS: &str = "Connections";
    pub const MESSAGES: &str = "Messages";
    /// Completion logs (keyed by user id)
    pub const PATIENT_HISTORY: &str = "PatientHistory";
}

/// Operations the services issue against the document store.
///
/// Every write touches a single document atomically. Nothing spans
/// documents; callers compose multi-document changes themselves.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch one document by key.
    async fn find_by_key(&self, collection: &str, key: &str)
        -> Result<Option<Document>, AppError>;

    /// Fetch every document matching the filter.
    async fn find_many(&self, collection: &str, filter: &Filter)
        -> Result<Vec<Document>, AppError>;

    /// Insert a new document, generating a key when `_id` is absent.
    ///
    /// Fails with `Conflict` if the key is already taken.
    async fn insert_one(&self, collection: &str, doc: Document) -> Result<String, AppError>;

    /// Apply an update to the first document matching the filter.
    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> Result<UpdateOutcome, AppError>;

    /// Delete the first document matching the filter. Returns the count deleted.
    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<u64, AppError>;

    /// Delete every document matching the filter. Returns the count deleted.
    async fn delete_many(&self, collection: &str, filter: &Filter) -> Result<u64, AppError>;
}

/// Typed reads on top of the raw document operations.
impl dyn DocumentStore {
    /// Fetch one record by key.
    pub async fn get<T: DeserializeOwned>(
        &self,
        collection: &str,
        key: &str,
    ) -> Result<Option<T>, AppError> {
        self.find_by_key(collection, key)
            .await?
            .map(from_document)
            .transpose()
    }

    /// Fetch every record matching the filter. Any malformed document fails
    /// the whole read.
    pub async fn get_many<T: DeserializeOwned>(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Vec<T>, AppError> {
        self.find_many(collection, filter)
            .await?
            .into_iter()
            .map(from_document)
            .collect()
    }
}

/// Generate a fresh document key.
pub fn new_key() -> String {
    uuid::Uuid::new_v4().to_string()
}
