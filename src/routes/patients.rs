// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Patient routes: profile, assigned routines and completion history.

use super::StatusResponse;
use crate::error::Result;
use crate::models::{CompletionLog, ExpandedRoutine, Patient, ProfileUpdate, Registration};
use crate::services::{AssignOutcome, CompletionRecord};
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
        .route("/patient/create_patient", post(create_patient))
        .route("/patient/get_patient/{patient_id}", get(get_patient))
        .route("/patient/get_patient_by_email", get(get_patient_by_email))
        .route("/patient/update_patient/{patient_id}", put(update_patient))
        .route(
            "/patient/get_assigned_routines/{patient_id}",
            get(get_assigned_routines),
        )
        .route(
            "/patient/assign_routine/{patient_id}/{routine_id}",
            put(assign_routine),
        )
        .route(
            "/patient/unassign_routine/{patient_id}/{routine_id}",
            delete(unassign_routine),
        )
        .route(
            "/patient/record_completion/{user_id}",
            post(record_completion),
        )
        .route("/patient/history/{user_id}", get(get_history))
}

/// `?email=` lookup, shared with the therapist routes.
#[derive(Deserialize)]
pub(crate) struct EmailQuery {
    pub email: String,
}

/// Whether a profile write changed anything.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ProfileUpdateResponse {
    pub modified: bool,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AssignResponse {
    /// `assigned` or `already_assigned`
    pub status: String,
}

impl From<AssignOutcome> for AssignResponse {
    fn from(outcome: AssignOutcome) -> Self {
        let status = match outcome {
            AssignOutcome::Assigned => "assigned",
            AssignOutcome::AlreadyAssigned => "already_assigned",
        };
        Self {
            status: status.to_string(),
        }
    }
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CompletionResponse {
    pub recorded: bool,
}

async fn create_patient(
    State(state): State<Arc<AppState>>,
    Json(registration): Json<Registration>,
) -> Result<(StatusCode, Json<Patient>)> {
    let patient = state.profiles.create_patient(registration).await?;
    Ok((StatusCode::CREATED, Json(patient)))
}

async fn get_patient(
    State(state): State<Arc<AppState>>,
    Path(patient_id): Path<String>,
) -> Result<Json<Patient>> {
    Ok(Json(state.profiles.get_patient(&patient_id).await?))
}

async fn get_patient_by_email(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EmailQuery>,
) -> Result<Json<Patient>> {
    Ok(Json(state.profiles.find_patient_by_email(&query.email).await?))
}

async fn update_patient(
    State(state): State<Arc<AppState>>,
    Path(patient_id): Path<String>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<ProfileUpdateResponse>> {
    let modified = state.profiles.update_patient(&patient_id, update).await?;
    Ok(Json(ProfileUpdateResponse { modified }))
}

async fn get_assigned_routines(
    State(state): State<Arc<AppState>>,
    Path(patient_id): Path<String>,
) -> Result<Json<Vec<ExpandedRoutine>>> {
    Ok(Json(state.routines.get_assigned_routines(&patient_id).await?))
}

async fn assign_routine(
    State(state): State<Arc<AppState>>,
    Path((patient_id, routine_id)): Path<(String, String)>,
) -> Result<Json<AssignResponse>> {
    let outcome = state
        .routines
        .assign_routine_to_patient(&patient_id, &routine_id)
        .await?;
    Ok(Json(outcome.into()))
}

async fn unassign_routine(
    State(state): State<Arc<AppState>>,
    Path((patient_id, routine_id)): Path<(String, String)>,
) -> Result<Json<StatusResponse>> {
    state
        .routines
        .unassign_routine_from_patient(&patient_id, &routine_id)
        .await?;
    Ok(StatusResponse::ok("Routine unassigned"))
}

async fn record_completion(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Json(record): Json<CompletionRecord>,
) -> Result<Json<CompletionResponse>> {
    let recorded = state.completions.record_completion(&user_id, record).await?;
    Ok(Json(CompletionResponse { recorded }))
}

async fn get_history(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<CompletionLog>> {
    Ok(Json(state.completions.get_history(&user_id).await?))
}
