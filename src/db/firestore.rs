// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore-backed document store.
//!
//! Documents are stored under their `_id` as the Firestore document ID.
//! Filters pinned to keys become direct lookups, pure field equalities
//! become native queries, and anything else is evaluated in process over
//! the collection.

use super::document::{document_key, Document, Filter, Update, UpdateOutcome, KEY_FIELD};
use super::{new_key, DocumentStore};
use crate::error::AppError;
use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use serde_json::Value;

const MAX_CONCURRENT_DB_OPS: usize = 50;
// Firestore limits batch/transaction writes to 500 operations.
// We use a safe limit of 400 to allow headroom.
const BATCH_SIZE: usize = 400;
// Commits that lose a race on the same document are retried this many times.
const MAX_UPDATE_ATTEMPTS: usize = 5;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: firestore::FirestoreDb,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // The emulator rejects real credentials, so skip the default token source.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self { client })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self { client })
    }

    // ─── Reads ───────────────────────────────────────────────────

    /// Fetch documents by key, keeping the order of `keys` and skipping misses.
    async fn fetch_keys(
        &self,
        collection: &str,
        keys: &[String],
    ) -> Result<Vec<Document>, AppError> {
        let client = &self.client;

        let docs = stream::iter(keys.iter().cloned())
            .map(|key| async move {
                client
                    .fluent()
                    .select()
                    .by_id_in(collection)
                    .obj::<Document>()
                    .one(&key)
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))
            })
            .buffered(MAX_CONCURRENT_DB_OPS)
            .collect::<Vec<Result<Option<Document>, AppError>>>()
            .await
            .into_iter()
            .collect::<Result<Vec<Option<Document>>, AppError>>()?;

        Ok(docs.into_iter().flatten().collect())
    }

    /// Query a collection with a conjunction of string equalities.
    async fn query_equalities(
        &self,
        collection: &str,
        pairs: Vec<(String, String)>,
    ) -> Result<Vec<Document>, AppError> {
        self.client
            .fluent()
            .select()
            .from(collection)
            .filter(move |q| {
                q.for_all(
                    pairs
                        .iter()
                        .map(|(field, value)| q.field(field.as_str()).eq(value.clone())),
                )
            })
            .obj::<Document>()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Read a whole collection.
    async fn scan(&self, collection: &str) -> Result<Vec<Document>, AppError> {
        self.client
            .fluent()
            .select()
            .from(collection)
            .obj::<Document>()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Resolve a filter to the documents it matches.
    async fn resolve(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>, AppError> {
        let candidates = if let Some(keys) = filter.pinned_keys() {
            self.fetch_keys(collection, &keys).await?
        } else {
            match filter.field_equalities() {
                Some(pairs) if !pairs.is_empty() => {
                    self.query_equalities(collection, pairs).await?
                }
                // TODO: push ArrayHasRef down as an array_contains query once
                // reference stubs are stored as plain id arrays.
                _ => self.scan(collection).await?,
            }
        };

        Ok(candidates
            .into_iter()
            .filter(|doc| filter.matches(doc))
            .collect())
    }

    // ─── Writes ──────────────────────────────────────────────────

    /// Write a whole document under its key inside a transaction.
    async fn write_document(
        &self,
        collection: &str,
        key: &str,
        doc: &Document,
    ) -> Result<(), AppError> {
        let mut transaction = self
            .client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        self.client
            .fluent()
            .update()
            .in_col(collection)
            .document_id(key)
            .object(doc)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add write to transaction: {}", e))
            })?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        Ok(())
    }

    /// Read, modify and write one document in a single transaction.
    ///
    /// Returns `None` when the commit failed and the update may be retried.
    async fn update_in_transaction(
        &self,
        collection: &str,
        key: &str,
        filter: &Filter,
        update: &Update,
    ) -> Result<Option<UpdateOutcome>, AppError> {
        let mut transaction = self
            .client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        // Reads through this handle are part of the transaction, so a
        // concurrent write to the document fails our commit.
        let reader = self.client.clone_with_consistency_selector(
            firestore::FirestoreConsistencySelector::Transaction(
                transaction.transaction_id().clone(),
            ),
        );
        let current = match reader
            .fluent()
            .select()
            .by_id_in(collection)
            .obj::<Document>()
            .one(key)
            .await
        {
            Ok(current) => current,
            Err(e) => {
                if let Err(rollback) = transaction.rollback().await {
                    tracing::warn!(collection, key, error = %rollback, "Rollback failed");
                }
                return Err(AppError::Database(e.to_string()));
            }
        };

        let mut doc = match current {
            Some(doc) if filter.matches(&doc) => doc,
            _ => {
                transaction.rollback().await.map_err(|e| {
                    AppError::Database(format!("Transaction rollback failed: {}", e))
                })?;
                return Ok(Some(UpdateOutcome::NO_MATCH));
            }
        };

        if !update.apply(&mut doc) {
            transaction.rollback().await.map_err(|e| {
                AppError::Database(format!("Transaction rollback failed: {}", e))
            })?;
            return Ok(Some(UpdateOutcome::matched(false)));
        }

        self.client
            .fluent()
            .update()
            .in_col(collection)
            .document_id(key)
            .object(&doc)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add write to transaction: {}", e))
            })?;

        match transaction.commit().await {
            Ok(_) => Ok(Some(UpdateOutcome::matched(true))),
            Err(e) => {
                tracing::warn!(collection, key, error = %e, "Update commit failed");
                Ok(None)
            }
        }
    }

    /// Batch delete documents by key using transactions.
    async fn batch_delete(&self, collection: &str, keys: &[String]) -> Result<(), AppError> {
        for chunk in keys.chunks(BATCH_SIZE) {
            let mut transaction = self
                .client
                .begin_transaction()
                .await
                .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

            for key in chunk {
                self.client
                    .fluent()
                    .delete()
                    .from(collection)
                    .document_id(key)
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::Database(format!(
                            "Failed to add deletion to transaction for {}: {}",
                            collection, e
                        ))
                    })?;
            }

            transaction.commit().await.map_err(|e| {
                AppError::Database(format!("Failed to commit batch deletion: {}", e))
            })?;
        }

        Ok(())
    }
}

#[async_trait]
impl DocumentStore for FirestoreDb {
    async fn find_by_key(
        &self,
        collection: &str,
        key: &str,
    ) -> Result<Option<Document>, AppError> {
        self.client
            .fluent()
            .select()
            .by_id_in(collection)
            .obj::<Document>()
            .one(key)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn find_many(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Vec<Document>, AppError> {
        self.resolve(collection, filter).await
    }

    async fn insert_one(&self, collection: &str, mut doc: Document) -> Result<String, AppError> {
        let key = match document_key(&doc) {
            Some(key) => key.to_string(),
            None => {
                let key = new_key();
                doc.insert(KEY_FIELD.to_string(), Value::String(key.clone()));
                key
            }
        };

        if self.find_by_key(collection, &key).await?.is_some() {
            return Err(AppError::Conflict(format!(
                "Document {} already exists in {}",
                key, collection
            )));
        }

        self.write_document(collection, &key, &doc).await?;
        tracing::debug!(collection, key = %key, "Inserted document");

        Ok(key)
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> Result<UpdateOutcome, AppError> {
        // Locate the target; the transaction re-reads and re-checks it.
        let Some(key) = self
            .resolve(collection, filter)
            .await?
            .first()
            .and_then(document_key)
            .map(str::to_string)
        else {
            return Ok(UpdateOutcome::NO_MATCH);
        };

        for attempt in 1..=MAX_UPDATE_ATTEMPTS {
            if let Some(outcome) = self
                .update_in_transaction(collection, &key, filter, update)
                .await?
            {
                return Ok(outcome);
            }
            tracing::debug!(collection, key = %key, attempt, "Retrying contended update");
        }

        Err(AppError::Database(format!(
            "Update of {} in {} did not commit after {} attempts",
            key, collection, MAX_UPDATE_ATTEMPTS
        )))
    }

    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<u64, AppError> {
        let Some(key) = self
            .resolve(collection, filter)
            .await?
            .first()
            .and_then(document_key)
            .map(str::to_string)
        else {
            return Ok(0);
        };

        self.client
            .fluent()
            .delete()
            .from(collection)
            .document_id(&key)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(1)
    }

    async fn delete_many(&self, collection: &str, filter: &Filter) -> Result<u64, AppError> {
        let keys: Vec<String> = self
            .resolve(collection, filter)
            .await?
            .iter()
            .filter_map(document_key)
            .map(str::to_string)
            .collect();

        self.batch_delete(collection, &keys).await?;
        tracing::debug!(collection, count = keys.len(), "Deleted documents");

        Ok(keys.len() as u64)
    }
}
