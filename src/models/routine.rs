// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Routines and the reference stubs that link documents together.

use super::exercise::{Exercise, ExerciseDraft};
use serde::{Deserialize, Serialize};
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Minimal `{_id}` pointer to another document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Reference {
    #[serde(rename = "_id")]
    pub id: String,
}

impl Reference {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// The stub as a JSON value, for set-add/pull updates.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({ "_id": self.id })
    }
}

/// A reference as accepted from callers: a bare ID or a `{_id}` stub.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ReferenceInput {
    Id(String),
    Stub(Reference),
}

impl From<ReferenceInput> for Reference {
    fn from(input: ReferenceInput) -> Self {
        match input {
            ReferenceInput::Id(id) => Reference { id },
            ReferenceInput::Stub(stub) => stub,
        }
    }
}

/// Routine document. Holds exercise references, never exercise content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Routine {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub exercises: Vec<Reference>,
}

impl Routine {
    /// IDs of the referenced exercises, in routine order.
    pub fn exercise_ids(&self) -> Vec<String> {
        self.exercises.iter().map(|r| r.id.clone()).collect()
    }
}

/// Routine with its exercise references resolved to full documents.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ExpandedRoutine {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub image_url: Option<String>,
    pub exercises: Vec<Exercise>,
}

/// Routine as submitted for creation.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RoutineDraft {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[serde(default)]
    #[validate(url)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub exercises: Vec<ReferenceInput>,
}

/// One exercise entry in a routine update.
///
/// Entries with a non-empty `_id` point at an existing exercise; the rest
/// describe a new exercise to create.
#[derive(Debug, Clone, Deserialize)]
pub struct RoutineExerciseEntry {
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    #[serde(flatten)]
    pub draft: ExerciseDraft,
}

impl RoutineExerciseEntry {
    /// The referenced exercise ID, if this entry names one.
    pub fn existing_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }
}

/// Partial routine update. The routine ID is not part of the patch.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct RoutinePatch {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(url)]
    pub image_url: Option<String>,
    pub exercises: Option<Vec<RoutineExerciseEntry>>,
}
