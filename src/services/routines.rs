// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Routine reference graph.
//!
//! Routines hold ordered `{_id}` stubs into `Exercises`; patients and
//! therapists hold stubs into `Routines`. This service keeps those
//! references consistent on create, assign, update and cascade delete.

use crate::db::document::{document_key, to_document};
use crate::db::{collections, new_key, DocumentStore, Filter, Update};
use crate::error::{AppError, Result};
use crate::models::{
    validate_id, Exercise, ExpandedRoutine, Patient, Reference, Routine, RoutineDraft,
    RoutinePatch, Therapist,
};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Result of adding a routine reference to a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOutcome {
    Assigned,
    AlreadyAssigned,
}

/// Result of [`RoutineService::update_routine`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RoutineUpdate {
    pub matched: u64,
    pub modified: u64,
    /// Exercises inserted for entries that had no `_id`
    pub created_exercise_ids: Vec<String>,
}

/// What a cascade delete touched.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DeleteReport {
    pub patients_updated: u64,
    pub favorites_cleared: u64,
    pub exercises_deleted: u64,
}

#[derive(Clone)]
pub struct RoutineService {
    store: Arc<dyn DocumentStore>,
}

impl RoutineService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    async fn require_routine(&self, routine_id: &str) -> Result<Routine> {
        self.store
            .get::<Routine>(collections::ROUTINES, routine_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Routine {} not found", routine_id)))
    }

    async fn require_patient(&self, patient_id: &str) -> Result<Patient> {
        self.store
            .get::<Patient>(collections::PATIENTS, patient_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Patient {} not found", patient_id)))
    }

    async fn require_therapist(&self, therapist_id: &str) -> Result<Therapist> {
        self.store
            .get::<Therapist>(collections::THERAPISTS, therapist_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Therapist {} not found", therapist_id)))
    }

    /// Fail with `NotFound` naming the first id that has no exercise.
    async fn require_exercises(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let found: HashSet<String> = self
            .store
            .find_many(collections::EXERCISES, &Filter::key_in(ids.iter().cloned()))
            .await?
            .iter()
            .filter_map(|doc| document_key(doc).map(str::to_string))
            .collect();

        match ids.iter().find(|id| !found.contains(*id)) {
            Some(missing) => Err(AppError::NotFound(format!(
                "Exercise {} not found",
                missing
            ))),
            None => Ok(()),
        }
    }

    /// Insert a routine. Exercise references may be plain ids or stubs.
    pub async fn create_routine(&self, draft: RoutineDraft) -> Result<Routine> {
        draft.validate()?;

        let exercises: Vec<Reference> = draft.exercises.into_iter().map(Reference::from).collect();
        for reference in &exercises {
            validate_id("exercise", &reference.id)?;
        }

        let ids: Vec<String> = exercises.iter().map(|r| r.id.clone()).collect();
        self.require_exercises(&ids).await?;

        let routine = Routine {
            id: new_key(),
            name: draft.name,
            image_url: draft.image_url,
            exercises,
        };
        self.store
            .insert_one(collections::ROUTINES, to_document(&routine)?)
            .await?;

        tracing::info!(
            routine_id = %routine.id,
            exercises = routine.exercises.len(),
            "Routine created"
        );
        Ok(routine)
    }

    /// Resolve exercise references for many routines with one batched
    /// lookup. Reference order is preserved; dangling references are dropped.
    async fn expand_all(&self, routines: Vec<Routine>) -> Result<Vec<ExpandedRoutine>> {
        let ids: HashSet<String> = routines
            .iter()
            .flat_map(|r| r.exercises.iter().map(|e| e.id.clone()))
            .collect();

        let exercises: HashMap<String, Exercise> = if ids.is_empty() {
            HashMap::new()
        } else {
            self.store
                .get_many::<Exercise>(collections::EXERCISES, &Filter::key_in(ids))
                .await?
                .into_iter()
                .map(|e| (e.id.clone(), e))
                .collect()
        };

        Ok(routines
            .into_iter()
            .map(|routine| {
                let resolved = routine
                    .exercises
                    .iter()
                    .filter_map(|reference| {
                        let exercise = exercises.get(&reference.id).cloned();
                        if exercise.is_none() {
                            tracing::warn!(
                                routine_id = %routine.id,
                                exercise_id = %reference.id,
                                "Dropping dangling exercise reference"
                            );
                        }
                        exercise
                    })
                    .collect();

                ExpandedRoutine {
                    id: routine.id,
                    name: routine.name,
                    image_url: routine.image_url,
                    exercises: resolved,
                }
            })
            .collect())
    }

    pub async fn get_routine_expanded(&self, routine_id: &str) -> Result<ExpandedRoutine> {
        validate_id("routine", routine_id)?;

        let routine = self.require_routine(routine_id).await?;
        let mut expanded = self.expand_all(vec![routine]).await?;
        expanded
            .pop()
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("routine expansion lost a routine")))
    }

    /// Fetch routines by id in the given order, skipping missing ones.
    async fn routines_in_order(&self, owner_id: &str, ids: Vec<String>) -> Result<Vec<Routine>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut by_id: HashMap<String, Routine> = self
            .store
            .get_many::<Routine>(collections::ROUTINES, &Filter::key_in(ids.iter().cloned()))
            .await?
            .into_iter()
            .map(|r| (r.id.clone(), r))
            .collect();

        Ok(ids
            .into_iter()
            .filter_map(|id| {
                let routine = by_id.remove(&id);
                if routine.is_none() {
                    tracing::debug!(owner_id, routine_id = %id, "Skipping reference to missing routine");
                }
                routine
            })
            .collect())
    }

    pub async fn get_custom_routines(&self, therapist_id: &str) -> Result<Vec<ExpandedRoutine>> {
        validate_id("therapist", therapist_id)?;

        let therapist = self.require_therapist(therapist_id).await?;
        let ids = therapist.custom_routines.into_iter().map(|r| r.id).collect();
        let routines = self.routines_in_order(therapist_id, ids).await?;
        self.expand_all(routines).await
    }

    pub async fn get_assigned_routines(&self, patient_id: &str) -> Result<Vec<ExpandedRoutine>> {
        validate_id("patient", patient_id)?;

        let patient = self.require_patient(patient_id).await?;
        let ids = patient.assigned_routines.into_iter().map(|r| r.id).collect();
        let routines = self.routines_in_order(patient_id, ids).await?;
        self.expand_all(routines).await
    }

    /// Favorited routines. Favorites that name exercises are left out.
    pub async fn get_favorite_routines(&self, therapist_id: &str) -> Result<Vec<ExpandedRoutine>> {
        validate_id("therapist", therapist_id)?;

        let therapist = self.require_therapist(therapist_id).await?;
        let routines = self
            .routines_in_order(therapist_id, therapist.favorites)
            .await?;
        self.expand_all(routines).await
    }

    pub async fn assign_routine_to_patient(
        &self,
        patient_id: &str,
        routine_id: &str,
    ) -> Result<AssignOutcome> {
        validate_id("patient", patient_id)?;
        validate_id("routine", routine_id)?;

        let patient = self.require_patient(patient_id).await?;
        self.require_routine(routine_id).await?;

        if patient.has_routine(routine_id) {
            return Ok(AssignOutcome::AlreadyAssigned);
        }

        self.add_reference(
            collections::PATIENTS,
            patient_id,
            "assigned_routines",
            routine_id,
        )
        .await
    }

    /// Therapist-side assignment: record a routine as authored by them.
    pub async fn add_custom_routine(
        &self,
        therapist_id: &str,
        routine_id: &str,
    ) -> Result<AssignOutcome> {
        validate_id("therapist", therapist_id)?;
        validate_id("routine", routine_id)?;

        let therapist = self.require_therapist(therapist_id).await?;
        self.require_routine(routine_id).await?;

        if therapist.owns_routine(routine_id) {
            return Ok(AssignOutcome::AlreadyAssigned);
        }

        self.add_reference(
            collections::THERAPISTS,
            therapist_id,
            "custom_routines",
            routine_id,
        )
        .await
    }

    async fn add_reference(
        &self,
        collection: &'static str,
        owner_id: &str,
        field: &'static str,
        routine_id: &str,
    ) -> Result<AssignOutcome> {
        let outcome = self
            .store
            .update_one(
                collection,
                &Filter::key(owner_id),
                &Update::new().add_to_set(field, Reference::new(routine_id).to_value()),
            )
            .await?;

        if outcome.matched == 0 {
            return Err(AppError::NotFound(format!(
                "{} {} not found",
                collection, owner_id
            )));
        }
        if outcome.modified == 0 {
            // Another request got there between our read and the write.
            return Ok(AssignOutcome::AlreadyAssigned);
        }

        tracing::info!(collection, owner_id, field, routine_id, "Routine reference added");
        Ok(AssignOutcome::Assigned)
    }

    pub async fn unassign_routine_from_patient(
        &self,
        patient_id: &str,
        routine_id: &str,
    ) -> Result<()> {
        validate_id("patient", patient_id)?;
        validate_id("routine", routine_id)?;

        let outcome = self
            .store
            .update_one(
                collections::PATIENTS,
                &Filter::key(patient_id),
                &Update::new().pull("assigned_routines", Reference::new(routine_id).to_value()),
            )
            .await?;

        if outcome.matched == 0 {
            return Err(AppError::NotFound(format!(
                "Patient {} not found",
                patient_id
            )));
        }
        if outcome.modified == 0 {
            return Err(AppError::NotFound(format!(
                "Routine {} is not assigned to patient {}",
                routine_id, patient_id
            )));
        }

        tracing::info!(patient_id, routine_id, "Routine unassigned");
        Ok(())
    }

    /// Patch a routine, creating exercises for entries without an `_id`.
    ///
    /// Every referenced existing exercise is checked before anything is
    /// written, so a bad reference leaves both the routine and the exercise
    /// library untouched.
    pub async fn update_routine(&self, routine_id: &str, patch: RoutinePatch) -> Result<RoutineUpdate> {
        validate_id("routine", routine_id)?;
        patch.validate()?;

        self.require_routine(routine_id).await?;

        let mut created: Vec<String> = Vec::new();
        let mut update = Update::new();
        if let Some(name) = &patch.name {
            update = update.set("name", name.as_str());
        }
        if let Some(image_url) = &patch.image_url {
            update = update.set("image_url", image_url.as_str());
        }

        if let Some(entries) = patch.exercises {
            let existing: Vec<String> = entries
                .iter()
                .filter_map(|e| e.existing_id().map(str::to_string))
                .collect();
            for id in &existing {
                validate_id("exercise", id)?;
            }
            for entry in entries.iter().filter(|e| e.existing_id().is_none()) {
                entry.draft.validate()?;
            }
            self.require_exercises(&existing).await?;

            let mut references = Vec::with_capacity(entries.len());
            for entry in entries {
                let id = match entry.existing_id() {
                    Some(id) => id.to_string(),
                    None => {
                        let exercise = Exercise::from_draft(new_key(), entry.draft);
                        let inserted = match to_document(&exercise) {
                            Ok(doc) => self.store.insert_one(collections::EXERCISES, doc).await,
                            Err(e) => Err(e),
                        };
                        match inserted {
                            Ok(id) => {
                                created.push(id.clone());
                                id
                            }
                            Err(e) => {
                                self.discard_exercises(routine_id, &created).await;
                                return Err(e);
                            }
                        }
                    }
                };
                references.push(Reference::new(id).to_value());
            }
            update = update.set("exercises", references);
        }

        if update.is_empty() {
            return Ok(RoutineUpdate {
                matched: 1,
                modified: 0,
                created_exercise_ids: created,
            });
        }

        let outcome = match self
            .store
            .update_one(collections::ROUTINES, &Filter::key(routine_id), &update)
            .await
        {
            Ok(outcome) if outcome.matched == 0 => {
                self.discard_exercises(routine_id, &created).await;
                return Err(AppError::NotFound(format!(
                    "Routine {} not found",
                    routine_id
                )));
            }
            Ok(outcome) => outcome,
            Err(e) => {
                self.discard_exercises(routine_id, &created).await;
                return Err(e);
            }
        };

        tracing::info!(
            routine_id,
            modified = outcome.modified,
            created_exercises = created.len(),
            "Routine updated"
        );

        Ok(RoutineUpdate {
            matched: outcome.matched,
            modified: outcome.modified,
            created_exercise_ids: created,
        })
    }

    /// Compensation for exercises inserted by a failed routine update.
    async fn discard_exercises(&self, routine_id: &str, ids: &[String]) {
        if ids.is_empty() {
            return;
        }
        if let Err(e) = self
            .store
            .delete_many(collections::EXERCISES, &Filter::key_in(ids.iter().cloned()))
            .await
        {
            tracing::error!(
                routine_id,
                exercise_ids = ?ids,
                error = %e,
                "Failed to remove exercises created by an aborted routine update"
            );
        }
    }

    /// Delete a therapist's routine and every reference to it.
    ///
    /// The cascade runs forward only. The owner's stub is removed last, so
    /// a call that fails part way can be repeated: the repeat still passes
    /// the ownership check and skips whatever was already removed.
    pub async fn delete_custom_routine(
        &self,
        therapist_id: &str,
        routine_id: &str,
    ) -> Result<DeleteReport> {
        validate_id("therapist", therapist_id)?;
        validate_id("routine", routine_id)?;

        let therapist = self.require_therapist(therapist_id).await?;
        if !therapist.owns_routine(routine_id) {
            return Err(AppError::NotFound(format!(
                "Therapist {} has no routine {}",
                therapist_id, routine_id
            )));
        }
        // Absent when an earlier attempt got as far as deleting the document.
        let routine = self
            .store
            .get::<Routine>(collections::ROUTINES, routine_id)
            .await?;
        let stub = Reference::new(routine_id).to_value();

        // Patients holding the routine.
        let holders = self
            .store
            .find_many(
                collections::PATIENTS,
                &Filter::array_has_ref("assigned_routines", routine_id),
            )
            .await?;
        let mut patients_updated = 0;
        for holder in &holders {
            let Some(patient_id) = document_key(holder) else {
                continue;
            };
            let outcome = self
                .store
                .update_one(
                    collections::PATIENTS,
                    &Filter::key(patient_id),
                    &Update::new().pull("assigned_routines", stub.clone()),
                )
                .await?;
            if outcome.matched == 0 {
                tracing::warn!(patient_id, routine_id, "Patient vanished during routine delete");
            }
            patients_updated += outcome.modified;
        }

        let remaining = self
            .store
            .find_many(
                collections::PATIENTS,
                &Filter::array_has_ref("assigned_routines", routine_id),
            )
            .await?;
        if !remaining.is_empty() {
            return Err(AppError::Conflict(format!(
                "Routine {} is still assigned to {} patient(s)",
                routine_id,
                remaining.len()
            )));
        }

        // Favorites may point at the routine from any therapist.
        let favoriting = self
            .store
            .find_many(
                collections::THERAPISTS,
                &Filter::array_has_ref("favorites", routine_id),
            )
            .await?;
        let mut favorites_cleared = 0;
        for doc in &favoriting {
            let Some(owner_id) = document_key(doc) else {
                continue;
            };
            favorites_cleared += self
                .store
                .update_one(
                    collections::THERAPISTS,
                    &Filter::key(owner_id),
                    &Update::new().pull("favorites", stub.clone()),
                )
                .await?
                .modified;
        }

        let mut exercises_deleted = 0;
        if let Some(routine) = &routine {
            let orphaned = self.orphaned_exercises(routine).await?;
            if !orphaned.is_empty() {
                exercises_deleted = self
                    .store
                    .delete_many(collections::EXERCISES, &Filter::key_in(orphaned))
                    .await?;
            }

            let deleted = self
                .store
                .delete_one(collections::ROUTINES, &Filter::key(routine_id))
                .await?;
            if deleted != 1 {
                return Err(AppError::Conflict(format!(
                    "Routine {} was deleted concurrently",
                    routine_id
                )));
            }
        } else {
            tracing::warn!(
                therapist_id,
                routine_id,
                "Routine document already gone, clearing leftover stub"
            );
        }

        let outcome = self
            .store
            .update_one(
                collections::THERAPISTS,
                &Filter::key(therapist_id),
                &Update::new().pull("custom_routines", stub),
            )
            .await?;
        if outcome.modified != 1 {
            return Err(AppError::Conflict(format!(
                "Routine {} was removed from therapist {} concurrently",
                routine_id, therapist_id
            )));
        }

        tracing::info!(
            therapist_id,
            routine_id,
            patients_updated,
            favorites_cleared,
            exercises_deleted,
            "Routine deleted"
        );

        Ok(DeleteReport {
            patients_updated,
            favorites_cleared,
            exercises_deleted,
        })
    }

    /// Exercises of `routine` that no other routine references.
    async fn orphaned_exercises(&self, routine: &Routine) -> Result<Vec<String>> {
        let mut orphaned = Vec::new();
        let mut seen = HashSet::new();

        for exercise_id in routine.exercise_ids() {
            if !seen.insert(exercise_id.clone()) {
                continue;
            }
            let shared = self
                .store
                .find_many(
                    collections::ROUTINES,
                    &Filter::array_has_ref("exercises", exercise_id.as_str()),
                )
                .await?
                .iter()
                .any(|doc| document_key(doc) != Some(routine.id.as_str()));

            if shared {
                tracing::debug!(
                    routine_id = %routine.id,
                    exercise_id = %exercise_id,
                    "Keeping exercise shared with another routine"
                );
            } else {
                orphaned.push(exercise_id);
            }
        }

        Ok(orphaned)
    }

    /// Flip whether `target_id` is in the therapist's favorites. Returns
    /// the new state.
    pub async fn toggle_favorite(&self, owner_id: &str, target_id: &str) -> Result<bool> {
        validate_id("therapist", owner_id)?;
        validate_id("favorite", target_id)?;

        let therapist = self.require_therapist(owner_id).await?;
        let favorited = !therapist.has_favorite(target_id);
        self.set_favorite(owner_id, target_id, favorited).await?;

        tracing::debug!(owner_id, target_id, favorited, "Favorite toggled");
        Ok(favorited)
    }

    /// Add `target_id` to the therapist's favorites. Fails with
    /// `BadRequest` if it is already there.
    pub async fn add_favorite(&self, owner_id: &str, target_id: &str) -> Result<()> {
        validate_id("therapist", owner_id)?;
        validate_id("favorite", target_id)?;

        if !self.set_favorite(owner_id, target_id, true).await? {
            return Err(AppError::BadRequest(format!(
                "{} is already in the favorites of therapist {}",
                target_id, owner_id
            )));
        }
        tracing::debug!(owner_id, target_id, "Favorite added");
        Ok(())
    }

    /// Remove `target_id` from the therapist's favorites. Fails with
    /// `BadRequest` if it is not there.
    pub async fn remove_favorite(&self, owner_id: &str, target_id: &str) -> Result<()> {
        validate_id("therapist", owner_id)?;
        validate_id("favorite", target_id)?;

        if !self.set_favorite(owner_id, target_id, false).await? {
            return Err(AppError::BadRequest(format!(
                "{} is not in the favorites of therapist {}",
                target_id, owner_id
            )));
        }
        tracing::debug!(owner_id, target_id, "Favorite removed");
        Ok(())
    }

    /// Returns whether the favorites set changed.
    async fn set_favorite(&self, owner_id: &str, target_id: &str, favorited: bool) -> Result<bool> {
        let update = if favorited {
            Update::new().add_to_set("favorites", target_id)
        } else {
            Update::new().pull("favorites", target_id)
        };

        let outcome = self
            .store
            .update_one(collections::THERAPISTS, &Filter::key(owner_id), &update)
            .await?;
        if outcome.matched == 0 {
            return Err(AppError::NotFound(format!(
                "Therapist {} not found",
                owner_id
            )));
        }
        Ok(outcome.modified == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryDb;
    use crate::models::{ExerciseDraft, ReferenceInput};
    use serde_json::json;

    async fn seed_exercise(store: &Arc<dyn DocumentStore>, title: &str) -> String {
        let exercise = Exercise::from_draft(
            new_key(),
            ExerciseDraft {
                title: title.to_string(),
                ..Default::default()
            },
        );
        store
            .insert_one(collections::EXERCISES, to_document(&exercise).unwrap())
            .await
            .unwrap()
    }

    fn service() -> (Arc<dyn DocumentStore>, RoutineService) {
        let store: Arc<dyn DocumentStore> = Arc::new(InMemoryDb::new());
        (store.clone(), RoutineService::new(store))
    }

    #[tokio::test]
    async fn test_create_routine_rejects_unknown_exercise() {
        let (_, routines) = service();

        let result = routines
            .create_routine(RoutineDraft {
                name: "Hips".to_string(),
                image_url: None,
                exercises: vec![ReferenceInput::Id("nope".to_string())],
            })
            .await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_expansion_preserves_reference_order() {
        let (store, routines) = service();
        let a = seed_exercise(&store, "A").await;
        let b = seed_exercise(&store, "B").await;
        let c = seed_exercise(&store, "C").await;

        let routine = routines
            .create_routine(RoutineDraft {
                name: "Order".to_string(),
                image_url: None,
                exercises: vec![
                    ReferenceInput::Id(c.clone()),
                    ReferenceInput::Stub(Reference::new(a.clone())),
                    ReferenceInput::Id(b.clone()),
                ],
            })
            .await
            .unwrap();

        let expanded = routines.get_routine_expanded(&routine.id).await.unwrap();
        let titles: Vec<&str> = expanded.exercises.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["C", "A", "B"]);
    }

    #[tokio::test]
    async fn test_toggle_favorite_missing_owner() {
        let (_, routines) = service();
        assert!(matches!(
            routines.toggle_favorite("ghost", "r1").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_routine_with_no_changes_is_not_a_write() {
        let (store, routines) = service();
        store
            .insert_one(
                collections::ROUTINES,
                json!({"_id": "r1", "name": "Keep", "exercises": []})
                    .as_object()
                    .unwrap()
                    .clone(),
            )
            .await
            .unwrap();

        let result = routines
            .update_routine("r1", RoutinePatch::default())
            .await
            .unwrap();
        assert_eq!(result.modified, 0);
        assert!(result.created_exercise_ids.is_empty());
    }
}
