// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Exercise library and the explore view.

use crate::db::document::to_document;
use crate::db::{collections, new_key, DocumentStore, Filter};
use crate::error::{AppError, Result};
use crate::models::{validate_id, Exercise, ExerciseDraft, ExercisePatch};
use serde::Serialize;
use std::sync::Arc;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Exercises of one subcategory in the explore view.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ExploreSubcategory {
    pub subtitle: String,
    pub exercises: Vec<Exercise>,
}

/// One category in the explore view.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ExploreCategory {
    pub title: String,
    pub subcategory: Vec<ExploreSubcategory>,
}

/// Group exercises by category, then subcategory, keeping first-seen order.
pub fn group_for_explore(exercises: Vec<Exercise>) -> Vec<ExploreCategory> {
    let mut categories: Vec<ExploreCategory> = Vec::new();

    for exercise in exercises {
        let category = match categories
            .iter()
            .position(|c| c.title == exercise.category)
        {
            Some(i) => &mut categories[i],
            None => {
                categories.push(ExploreCategory {
                    title: exercise.category.clone(),
                    subcategory: Vec::new(),
                });
                let last = categories.len() - 1;
                &mut categories[last]
            }
        };

        match category
            .subcategory
            .iter_mut()
            .find(|s| s.subtitle == exercise.subcategory)
        {
            Some(sub) => sub.exercises.push(exercise),
            None => category.subcategory.push(ExploreSubcategory {
                subtitle: exercise.subcategory.clone(),
                exercises: vec![exercise],
            }),
        }
    }

    categories
}

#[derive(Clone)]
pub struct ExerciseService {
    store: Arc<dyn DocumentStore>,
}

impl ExerciseService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Insert exercises and return their generated ids, in input order.
    ///
    /// All drafts are validated before the first insert. If an insert
    /// fails, the exercises already inserted by this call are removed.
    pub async fn create_exercises(&self, drafts: Vec<ExerciseDraft>) -> Result<Vec<String>> {
        if drafts.is_empty() {
            return Err(AppError::BadRequest("No exercises supplied".to_string()));
        }
        for draft in &drafts {
            draft.validate()?;
        }

        let mut ids = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let exercise = Exercise::from_draft(new_key(), draft);
            let inserted = match to_document(&exercise) {
                Ok(doc) => self.store.insert_one(collections::EXERCISES, doc).await,
                Err(e) => Err(e),
            };

            match inserted {
                Ok(id) => ids.push(id),
                Err(e) => {
                    if !ids.is_empty() {
                        if let Err(undo) = self
                            .store
                            .delete_many(collections::EXERCISES, &Filter::key_in(ids.clone()))
                            .await
                        {
                            tracing::error!(
                                exercise_ids = ?ids,
                                error = %undo,
                                "Failed to remove partially created exercises"
                            );
                        }
                    }
                    return Err(e);
                }
            }
        }

        tracing::info!(count = ids.len(), "Exercises created");
        Ok(ids)
    }

    pub async fn get_exercise(&self, exercise_id: &str) -> Result<Exercise> {
        validate_id("exercise", exercise_id)?;

        self.store
            .get::<Exercise>(collections::EXERCISES, exercise_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Exercise {} not found", exercise_id)))
    }

    /// Apply a patch. Returns the updated exercise.
    pub async fn update_exercise(&self, exercise_id: &str, patch: ExercisePatch) -> Result<Exercise> {
        validate_id("exercise", exercise_id)?;
        patch.validate()?;

        let update = patch.to_update();
        if !update.is_empty() {
            let outcome = self
                .store
                .update_one(collections::EXERCISES, &Filter::key(exercise_id), &update)
                .await?;
            if outcome.matched == 0 {
                return Err(AppError::NotFound(format!(
                    "Exercise {} not found",
                    exercise_id
                )));
            }
            tracing::debug!(exercise_id, modified = outcome.modified, "Exercise updated");
        }

        self.get_exercise(exercise_id).await
    }

    pub async fn explore_collection(&self) -> Result<Vec<ExploreCategory>> {
        let exercises = self
            .store
            .get_many::<Exercise>(collections::EXERCISES, &Filter::All(Vec::new()))
            .await?;
        Ok(group_for_explore(exercises))
    }
}
