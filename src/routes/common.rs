// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Routes shared by both roles: the exercise library and routines.

use crate::error::Result;
use crate::models::{Exercise, ExpandedRoutine, Routine, RoutineDraft};
use crate::services::ExploreCategory;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/get_explore_collection", get(get_explore_collection))
        .route("/get_exercise/{exercise_id}", get(get_exercise))
        .route("/create_routine", post(create_routine))
        .route("/get_routine/{routine_id}", get(get_routine))
}

async fn get_explore_collection(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ExploreCategory>>> {
    Ok(Json(state.exercises.explore_collection().await?))
}

async fn get_exercise(
    State(state): State<Arc<AppState>>,
    Path(exercise_id): Path<String>,
) -> Result<Json<Exercise>> {
    Ok(Json(state.exercises.get_exercise(&exercise_id).await?))
}

async fn create_routine(
    State(state): State<Arc<AppState>>,
    Json(draft): Json<RoutineDraft>,
) -> Result<(StatusCode, Json<Routine>)> {
    let routine = state.routines.create_routine(draft).await?;
    Ok((StatusCode::CREATED, Json(routine)))
}

async fn get_routine(
    State(state): State<Arc<AppState>>,
    Path(routine_id): Path<String>,
) -> Result<Json<ExpandedRoutine>> {
    Ok(Json(state.routines.get_routine_expanded(&routine_id).await?))
}
