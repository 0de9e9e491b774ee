// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process document store.
//!
//! Used by the test suite and by `STORAGE_BACKEND=memory` local runs.
//! Each collection sits behind its own map shard, so single-document
//! operations are atomic with respect to each other.

use super::document::{document_key, Document, Filter, Update, UpdateOutcome, KEY_FIELD};
use super::{new_key, DocumentStore};
use crate::error::AppError;
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// In-memory document store keyed by collection, then document key.
#[derive(Default)]
pub struct InMemoryDb {
    collections: DashMap<String, BTreeMap<String, Document>>,
    /// Number of write operations that changed stored state.
    writes: AtomicU64,
}

impl InMemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection.
    pub fn count(&self, collection: &str) -> usize {
        self.collections
            .get(collection)
            .map(|docs| docs.len())
            .unwrap_or(0)
    }

    /// Number of writes that changed stored state since creation.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl DocumentStore for InMemoryDb {
    async fn find_by_key(
        &self,
        collection: &str,
        key: &str,
    ) -> Result<Option<Document>, AppError> {
        Ok(self
            .collections
            .get(collection)
            .and_then(|docs| docs.get(key).cloned()))
    }

    async fn find_many(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Vec<Document>, AppError> {
        let Some(docs) = self.collections.get(collection) else {
            return Ok(Vec::new());
        };

        if let Some(keys) = filter.pinned_keys() {
            return Ok(keys
                .iter()
                .filter_map(|key| docs.get(key))
                .filter(|doc| filter.matches(doc))
                .cloned()
                .collect());
        }

        Ok(docs
            .values()
            .filter(|doc| filter.matches(doc))
            .cloned()
            .collect())
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

        let mut docs = self.collections.entry(collection.to_string()).or_default();
        if docs.contains_key(&key) {
            return Err(AppError::Conflict(format!(
                "Document {} already exists in {}",
                key, collection
            )));
        }
        docs.insert(key.clone(), doc);
        drop(docs);

        self.record_write();
        Ok(key)
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> Result<UpdateOutcome, AppError> {
        let Some(mut docs) = self.collections.get_mut(collection) else {
            return Ok(UpdateOutcome::NO_MATCH);
        };

        let Some(doc) = docs.values_mut().find(|doc| filter.matches(doc)) else {
            return Ok(UpdateOutcome::NO_MATCH);
        };

        let modified = update.apply(doc);
        drop(docs);

        if modified {
            self.record_write();
        }
        Ok(UpdateOutcome::matched(modified))
    }

    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<u64, AppError> {
        let Some(mut docs) = self.collections.get_mut(collection) else {
            return Ok(0);
        };

        let key = docs
            .iter()
            .find(|(_, doc)| filter.matches(doc))
            .map(|(key, _)| key.clone());

        match key {
            Some(key) => {
                docs.remove(&key);
                drop(docs);
                self.record_write();
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_many(&self, collection: &str, filter: &Filter) -> Result<u64, AppError> {
        let Some(mut docs) = self.collections.get_mut(collection) else {
            return Ok(0);
        };

        let before = docs.len();
        docs.retain(|_, doc| !filter.matches(doc));
        let deleted = (before - docs.len()) as u64;
        drop(docs);

        if deleted > 0 {
            self.record_write();
        }
        Ok(deleted)
    }
}
