// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-user completion log.

use crate::db::document::to_document;
use crate::db::{collections, DocumentStore, Filter, Update};
use crate::error::{AppError, Result};
use crate::models::{validate_id, CompletionKind, CompletionLog};
use crate::time_utils::now_rfc3339;
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

/// A completion to record.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CompletionRecord {
    pub kind: CompletionKind,
    #[validate(length(min = 1, max = 128))]
    pub item_id: String,
    /// Exercise title or routine name
    #[validate(length(min = 1, max = 200))]
    pub label: String,
    /// RFC 3339 timestamp; defaults to now
    #[serde(default)]
    pub date: Option<String>,
}

#[derive(Clone)]
pub struct CompletionService {
    store: Arc<dyn DocumentStore>,
}

impl CompletionService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Create the user's log if it does not exist yet.
    ///
    /// Two concurrent first completions may both see no log; the loser's
    /// insert fails with `Conflict`, which is fine since the log now exists.
    async fn ensure_log(&self, user_id: &str) -> Result<()> {
        if self
            .store
            .find_by_key(collections::PATIENT_HISTORY, user_id)
            .await?
            .is_some()
        {
            return Ok(());
        }

        match self
            .store
            .insert_one(
                collections::PATIENT_HISTORY,
                to_document(&CompletionLog::empty(user_id))?,
            )
            .await
        {
            Ok(_) => {
                tracing::debug!(user_id, "Completion log created");
                Ok(())
            }
            Err(AppError::Conflict(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Add a completion entry. Returns whether the log changed; recording
    /// an identical entry twice is a no-op.
    pub async fn record_completion(&self, user_id: &str, record: CompletionRecord) -> Result<bool> {
        validate_id("user", user_id)?;
        record.validate()?;

        self.ensure_log(user_id).await?;

        let date = record.date.unwrap_or_else(now_rfc3339);
        let entry = CompletionLog::entry(record.kind, &record.item_id, &record.label, &date);

        let outcome = self
            .store
            .update_one(
                collections::PATIENT_HISTORY,
                &Filter::key(user_id),
                &Update::new().add_to_set(record.kind.field(), entry),
            )
            .await?;

        if outcome.matched == 0 {
            return Err(AppError::NotFound(format!(
                "Completion log for {} disappeared",
                user_id
            )));
        }

        let recorded = outcome.modified == 1;
        tracing::info!(
            user_id,
            kind = record.kind.field(),
            item_id = %record.item_id,
            recorded,
            "Completion recorded"
        );
        Ok(recorded)
    }

    /// The user's log, or an empty one if nothing was recorded yet.
    pub async fn get_history(&self, user_id: &str) -> Result<CompletionLog> {
        validate_id("user", user_id)?;

        Ok(self
            .store
            .get::<CompletionLog>(collections::PATIENT_HISTORY, user_id)
            .await?
            .unwrap_or_else(|| CompletionLog::empty(user_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryDb;

    fn record(date: &str) -> CompletionRecord {
        CompletionRecord {
            kind: CompletionKind::Routine,
            item_id: "r1".to_string(),
            label: "Knee rehab".to_string(),
            date: Some(date.to_string()),
        }
    }

    #[tokio::test]
    async fn test_identical_record_is_noop() {
        let service = CompletionService::new(Arc::new(InMemoryDb::new()));

        assert!(service
            .record_completion("u1", record("2026-01-01T00:00:00Z"))
            .await
            .unwrap());
        assert!(!service
            .record_completion("u1", record("2026-01-01T00:00:00Z"))
            .await
            .unwrap());
        assert!(service
            .record_completion("u1", record("2026-01-02T00:00:00Z"))
            .await
            .unwrap());

        let log = service.get_history("u1").await.unwrap();
        assert_eq!(log.completed_routines.len(), 2);
        assert!(log.completed_exercises.is_empty());
    }

    #[tokio::test]
    async fn test_history_for_unknown_user_is_empty() {
        let service = CompletionService::new(Arc::new(InMemoryDb::new()));
        let log = service.get_history("nobody").await.unwrap();
        assert_eq!(log, CompletionLog::empty("nobody"));
    }
}
