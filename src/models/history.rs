//! Completion history stored in the `PatientHistory` collection.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// What kind of item was completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionKind {
    Exercise,
    Routine,
}

impl CompletionKind {
    /// Array field in the log that holds entries of this kind.
    pub fn field(&self) -> &'static str {
        match self {
            CompletionKind::Exercise => "completed_exercises",
            CompletionKind::Routine => "completed_routines",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CompletedExercise {
    pub id: String,
    pub title: String,
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CompletedRoutine {
    pub id: String,
    pub name: String,
    pub date: String,
}

/// Per-user completion log. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CompletionLog {
    /// User ID (also used as document ID)
    #[serde(rename = "_id")]
    pub user_id: String,
    #[serde(default)]
    pub completed_exercises: Vec<CompletedExercise>,
    #[serde(default)]
    pub completed_routines: Vec<CompletedRoutine>,
}

impl CompletionLog {
    pub fn empty(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            completed_exercises: Vec::new(),
            completed_routines: Vec::new(),
        }
    }

    /// The log entry for a completion, as stored.
    pub fn entry(kind: CompletionKind, item_id: &str, label: &str, date: &str) -> serde_json::Value {
        match kind {
            CompletionKind::Exercise => serde_json::json!({
                "id": item_id,
                "title": label,
                "date": date,
            }),
            CompletionKind::Routine => serde_json::json!({
                "id": item_id,
                "name": label,
                "date": date,
            }),
        }
    }
}
