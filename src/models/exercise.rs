// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Exercise library entries stored in the `Exercises` collection.

use crate::db::Update;
use serde::{Deserialize, Serialize};
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Exercise document. Routines only ever reference these by ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Exercise {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub reps: u32,
    /// Hold time per rep (seconds)
    #[serde(default)]
    pub hold: u32,
    #[serde(default)]
    pub sets: u32,
    /// Sessions per day
    #[serde(default)]
    pub frequency: u32,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub subcategory: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
}

/// Exercise content without an ID, as submitted for creation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct ExerciseDraft {
    #[serde(default)]
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 5000))]
    pub description: String,
    #[serde(default)]
    pub reps: u32,
    #[serde(default)]
    pub hold: u32,
    #[serde(default)]
    pub sets: u32,
    #[serde(default)]
    pub frequency: u32,
    #[serde(default)]
    #[validate(length(max = 100))]
    pub category: String,
    #[serde(default)]
    #[validate(length(max = 100))]
    pub subcategory: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(url)]
    pub thumbnail_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(url)]
    pub video_url: Option<String>,
}

impl Exercise {
    pub fn from_draft(id: String, draft: ExerciseDraft) -> Self {
        Self {
            id,
            title: draft.title,
            description: draft.description,
            reps: draft.reps,
            hold: draft.hold,
            sets: draft.sets,
            frequency: draft.frequency,
            category: draft.category,
            subcategory: draft.subcategory,
            thumbnail_url: draft.thumbnail_url,
            video_url: draft.video_url,
        }
    }
}

/// Partial exercise update. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ExercisePatch {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    pub reps: Option<u32>,
    pub hold: Option<u32>,
    pub sets: Option<u32>,
    pub frequency: Option<u32>,
    #[validate(length(max = 100))]
    pub category: Option<String>,
    #[validate(length(max = 100))]
    pub subcategory: Option<String>,
    #[validate(url)]
    pub thumbnail_url: Option<String>,
    #[validate(url)]
    pub video_url: Option<String>,
}

impl ExercisePatch {
    /// Translate the supplied fields into a `set` update.
    pub fn to_update(&self) -> Update {
        let mut update = Update::new();
        if let Some(title) = &self.title {
            update = update.set("title", title.as_str());
        }
        if let Some(description) = &self.description {
            update = update.set("description", description.as_str());
        }
        for (field, value) in [
            ("reps", self.reps),
            ("hold", self.hold),
            ("sets", self.sets),
            ("frequency", self.frequency),
        ] {
            if let Some(value) = value {
                update = update.set(field, value);
            }
        }
        if let Some(category) = &self.category {
            update = update.set("category", category.as_str());
        }
        if let Some(subcategory) = &self.subcategory {
            update = update.set("subcategory", subcategory.as_str());
        }
        if let Some(url) = &self.thumbnail_url {
            update = update.set("thumbnail_url", url.as_str());
        }
        if let Some(url) = &self.video_url {
            update = update.set("video_url", url.as_str());
        }
        update
    }
}
