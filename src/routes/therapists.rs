// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Therapist routes: profile, exercise authoring, custom routines,
//! favorites and per-connection notes.

use super::patients::{AssignResponse, EmailQuery, ProfileUpdateResponse};
use crate::error::Result;
use crate::models::{
    Exercise, ExerciseDraft, ExercisePatch, ExpandedRoutine, ProfileUpdate, Registration,
    RoutinePatch, Therapist,
};
use crate::services::{ConnectionDetails, ConnectionDetailsUpdate, DeleteReport, RoutineUpdate};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/therapist/create_therapist", post(create_therapist))
        .route("/therapist/get_therapist/{therapist_id}", get(get_therapist))
        .route(
            "/therapist/get_therapist_by_email",
            get(get_therapist_by_email),
        )
        .route(
            "/therapist/update_therapist/{therapist_id}",
            put(update_therapist),
        )
        .route("/therapist/create_exercise", post(create_exercise))
        .route(
            "/therapist/update_exercise/{exercise_id}",
            put(update_exercise),
        )
        .route(
            "/therapist/get_custom_routines/{therapist_id}",
            get(get_custom_routines),
        )
        .route(
            "/therapist/add_custom_routines/{therapist_id}/{routine_id}",
            put(add_custom_routine),
        )
        .route(
            "/therapist/delete_custom_routine/{therapist_id}/{routine_id}",
            delete(delete_custom_routine),
        )
        .route("/therapist/update_routine/{routine_id}", put(update_routine))
        .route(
            "/therapist/toggle_favorite/{therapist_id}/{target_id}",
            put(toggle_favorite),
        )
        .route(
            "/therapist/add_favorite/{therapist_id}/{target_id}",
            post(add_favorite),
        )
        .route(
            "/therapist/remove_favorite/{therapist_id}/{target_id}",
            delete(remove_favorite),
        )
        .route(
            "/therapist/get_favorite_routines/{therapist_id}",
            get(get_favorite_routines),
        )
        .route(
            "/therapist/connection_details/{patient_id}/{therapist_id}",
            get(get_connection_details).put(update_connection_details),
        )
}

/// A single exercise or a batch.
#[derive(Deserialize)]
#[serde(untagged)]
enum ExerciseBatch {
    Many(Vec<ExerciseDraft>),
    One(Box<ExerciseDraft>),
}

impl ExerciseBatch {
    fn into_drafts(self) -> Vec<ExerciseDraft> {
        match self {
            ExerciseBatch::Many(drafts) => drafts,
            ExerciseBatch::One(draft) => vec![*draft],
        }
    }
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CreatedExercisesResponse {
    pub ids: Vec<String>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct FavoriteResponse {
    pub favorited: bool,
}

async fn create_therapist(
    State(state): State<Arc<AppState>>,
    Json(registration): Json<Registration>,
) -> Result<(StatusCode, Json<Therapist>)> {
    let therapist = state.profiles.create_therapist(registration).await?;
    Ok((StatusCode::CREATED, Json(therapist)))
}

async fn get_therapist(
    State(state): State<Arc<AppState>>,
    Path(therapist_id): Path<String>,
) -> Result<Json<Therapist>> {
    Ok(Json(state.profiles.get_therapist(&therapist_id).await?))
}

async fn get_therapist_by_email(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EmailQuery>,
) -> Result<Json<Therapist>> {
    Ok(Json(
        state.profiles.find_therapist_by_email(&query.email).await?,
    ))
}

async fn update_therapist(
    State(state): State<Arc<AppState>>,
    Path(therapist_id): Path<String>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<ProfileUpdateResponse>> {
    let modified = state
        .profiles
        .update_therapist(&therapist_id, update)
        .await?;
    Ok(Json(ProfileUpdateResponse { modified }))
}

async fn create_exercise(
    State(state): State<Arc<AppState>>,
    Json(batch): Json<ExerciseBatch>,
) -> Result<(StatusCode, Json<CreatedExercisesResponse>)> {
    let ids = state.exercises.create_exercises(batch.into_drafts()).await?;
    Ok((StatusCode::CREATED, Json(CreatedExercisesResponse { ids })))
}

async fn update_exercise(
    State(state): State<Arc<AppState>>,
    Path(exercise_id): Path<String>,
    Json(patch): Json<ExercisePatch>,
) -> Result<Json<Exercise>> {
    Ok(Json(
        state.exercises.update_exercise(&exercise_id, patch).await?,
    ))
}

async fn get_custom_routines(
    State(state): State<Arc<AppState>>,
    Path(therapist_id): Path<String>,
) -> Result<Json<Vec<ExpandedRoutine>>> {
    Ok(Json(state.routines.get_custom_routines(&therapist_id).await?))
}

async fn add_custom_routine(
    State(state): State<Arc<AppState>>,
    Path((therapist_id, routine_id)): Path<(String, String)>,
) -> Result<Json<AssignResponse>> {
    let outcome = state
        .routines
        .add_custom_routine(&therapist_id, &routine_id)
        .await?;
    Ok(Json(outcome.into()))
}

async fn delete_custom_routine(
    State(state): State<Arc<AppState>>,
    Path((therapist_id, routine_id)): Path<(String, String)>,
) -> Result<Json<DeleteReport>> {
    Ok(Json(
        state
            .routines
            .delete_custom_routine(&therapist_id, &routine_id)
            .await?,
    ))
}

async fn update_routine(
    State(state): State<Arc<AppState>>,
    Path(routine_id): Path<String>,
    Json(patch): Json<RoutinePatch>,
) -> Result<Json<RoutineUpdate>> {
    Ok(Json(state.routines.update_routine(&routine_id, patch).await?))
}

async fn toggle_favorite(
    State(state): State<Arc<AppState>>,
    Path((therapist_id, target_id)): Path<(String, String)>,
) -> Result<Json<FavoriteResponse>> {
    let favorited = state
        .routines
        .toggle_favorite(&therapist_id, &target_id)
        .await?;
    Ok(Json(FavoriteResponse { favorited }))
}

async fn add_favorite(
    State(state): State<Arc<AppState>>,
    Path((therapist_id, target_id)): Path<(String, String)>,
) -> Result<Json<FavoriteResponse>> {
    state
        .routines
        .add_favorite(&therapist_id, &target_id)
        .await?;
    Ok(Json(FavoriteResponse { favorited: true }))
}

async fn remove_favorite(
    State(state): State<Arc<AppState>>,
    Path((therapist_id, target_id)): Path<(String, String)>,
) -> Result<Json<FavoriteResponse>> {
    state
        .routines
        .remove_favorite(&therapist_id, &target_id)
        .await?;
    Ok(Json(FavoriteResponse { favorited: false }))
}

async fn get_favorite_routines(
    State(state): State<Arc<AppState>>,
    Path(therapist_id): Path<String>,
) -> Result<Json<Vec<ExpandedRoutine>>> {
    Ok(Json(
        state.routines.get_favorite_routines(&therapist_id).await?,
    ))
}

async fn get_connection_details(
    State(state): State<Arc<AppState>>,
    Path((patient_id, therapist_id)): Path<(String, String)>,
) -> Result<Json<ConnectionDetails>> {
    Ok(Json(
        state
            .relationships
            .get_connection_details(&patient_id, &therapist_id)
            .await?,
    ))
}

async fn update_connection_details(
    State(state): State<Arc<AppState>>,
    Path((patient_id, therapist_id)): Path<(String, String)>,
    Json(details): Json<ConnectionDetailsUpdate>,
) -> Result<Json<ConnectionDetails>> {
    Ok(Json(
        state
            .relationships
            .update_connection_details(&patient_id, &therapist_id, details)
            .await?,
    ))
}
