// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Connection lifecycle routes.

use super::StatusResponse;
use crate::error::{AppError, Result};
use crate::models::{Connection, Role};
use crate::services::{ConnectOutcome, ConnectionSummary};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/connections/connect", post(connect))
        .route(
            "/connections/accept/{patient_id}/{therapist_id}",
            put(accept),
        )
        .route(
            "/connections/reject/{patient_id}/{therapist_id}",
            delete(reject),
        )
        .route(
            "/connections/disconnect/{patient_id}/{therapist_id}",
            delete(disconnect),
        )
        .route(
            "/connections/toggle_mute/{patient_id}/{therapist_id}",
            put(toggle_mute),
        )
        .route("/connections/list/{role}/{user_id}", get(list))
}

#[derive(Deserialize, Validate)]
struct ConnectRequest {
    #[validate(length(min = 1, max = 128))]
    patient_id: String,
    #[validate(length(min = 1, max = 128))]
    therapist_id: String,
    /// Who is asking; a therapist's request is accepted immediately.
    requester: Role,
}

#[derive(Serialize)]
pub struct ConnectResponse {
    /// False when the pair was already connected or pending
    pub created: bool,
    pub connection: Connection,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct MuteResponse {
    pub is_muted: bool,
}

async fn connect(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ConnectRequest>,
) -> Result<(StatusCode, Json<ConnectResponse>)> {
    request.validate()?;

    let outcome = state
        .relationships
        .connect(&request.patient_id, &request.therapist_id, request.requester)
        .await?;

    let (status, created) = match &outcome {
        ConnectOutcome::Created(_) => (StatusCode::CREATED, true),
        ConnectOutcome::AlreadyExists(_) => (StatusCode::OK, false),
    };
    Ok((
        status,
        Json(ConnectResponse {
            created,
            connection: outcome.connection().clone(),
        }),
    ))
}

async fn accept(
    State(state): State<Arc<AppState>>,
    Path((patient_id, therapist_id)): Path<(String, String)>,
) -> Result<Json<Connection>> {
    Ok(Json(
        state
            .relationships
            .accept_connection(&patient_id, &therapist_id)
            .await?,
    ))
}

async fn reject(
    State(state): State<Arc<AppState>>,
    Path((patient_id, therapist_id)): Path<(String, String)>,
) -> Result<Json<StatusResponse>> {
    state
        .relationships
        .reject_connection(&patient_id, &therapist_id)
        .await?;
    Ok(StatusResponse::ok("Connection request rejected"))
}

async fn disconnect(
    State(state): State<Arc<AppState>>,
    Path((patient_id, therapist_id)): Path<(String, String)>,
) -> Result<Json<StatusResponse>> {
    state
        .relationships
        .disconnect(&patient_id, &therapist_id)
        .await?;
    Ok(StatusResponse::ok("Connection removed"))
}

async fn toggle_mute(
    State(state): State<Arc<AppState>>,
    Path((patient_id, therapist_id)): Path<(String, String)>,
) -> Result<Json<MuteResponse>> {
    let is_muted = state
        .relationships
        .toggle_mute(&patient_id, &therapist_id)
        .await?;
    Ok(Json(MuteResponse { is_muted }))
}

async fn list(
    State(state): State<Arc<AppState>>,
    Path((role, user_id)): Path<(String, String)>,
) -> Result<Json<Vec<ConnectionSummary>>> {
    let role: Role = role.parse().map_err(AppError::BadRequest)?;
    Ok(Json(
        state.relationships.list_connections(&user_id, role).await?,
    ))
}
