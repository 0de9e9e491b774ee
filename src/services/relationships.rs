// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Patient/therapist relationship management.
//!
//! The `Connections` document is authoritative for status; the
//! `connections` arrays on both profiles mirror accepted relationships.
//! Every operation that touches more than one document runs as a
//! [`Saga`]: each applied step records its inverse, and a failure in a
//! later step unwinds the earlier ones.

use crate::db::document::to_document;
use crate::db::{collections, DocumentStore, Filter, Update};
use crate::error::{AppError, Result};
use crate::models::{validate_id, Connection, ConnectionStatus, Patient, Role, Therapist};
use crate::time_utils::now_rfc3339;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Result of a connect request.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectOutcome {
    /// A new connection was recorded.
    Created(Connection),
    /// The pair was already connected (or a request was already pending).
    AlreadyExists(Connection),
}

impl ConnectOutcome {
    pub fn connection(&self) -> &Connection {
        match self {
            ConnectOutcome::Created(c) | ConnectOutcome::AlreadyExists(c) => c,
        }
    }
}

/// Diagnosis and notes attached to a connection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ConnectionDetails {
    pub diagnosis: String,
    pub notes: String,
}

/// Partial update of connection details. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ConnectionDetailsUpdate {
    #[validate(length(max = 2000))]
    pub diagnosis: Option<String>,
    #[validate(length(max = 10000))]
    pub notes: Option<String>,
}

/// A connection as seen from one side, with the counterpart's profile.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ConnectionSummary {
    #[serde(rename = "_id")]
    pub id: String,
    pub firstname: String,
    pub lastname: String,
    #[serde(rename = "imageUrl")]
    pub image_url: Option<String>,
    #[serde(rename = "expoPushToken")]
    pub expo_push_token: Option<String>,
    pub status: ConnectionStatus,
    pub is_muted: bool,
}

/// Profile fields needed for a connection summary. Shared by both roles.
#[derive(Deserialize)]
struct CounterpartProfile {
    #[serde(rename = "_id")]
    id: String,
    #[serde(default)]
    firstname: String,
    #[serde(default)]
    lastname: String,
    #[serde(default, rename = "imageUrl")]
    image_url: Option<String>,
    #[serde(default, rename = "expoPushToken")]
    expo_push_token: Option<String>,
}

// ─── Saga plumbing ───────────────────────────────────────────────

/// One side of the connection mirror: `owner`'s `connections` array in
/// `collection` holding `counterpart`.
#[derive(Debug, Clone)]
struct MirrorEntry {
    collection: &'static str,
    owner: String,
    counterpart: String,
}

impl MirrorEntry {
    fn on_patient(patient_id: &str, therapist_id: &str) -> Self {
        Self {
            collection: collections::PATIENTS,
            owner: patient_id.to_string(),
            counterpart: therapist_id.to_string(),
        }
    }

    fn on_therapist(patient_id: &str, therapist_id: &str) -> Self {
        Self {
            collection: collections::THERAPISTS,
            owner: therapist_id.to_string(),
            counterpart: patient_id.to_string(),
        }
    }

    /// Add the entry. Returns whether the array changed.
    async fn add(&self, store: &dyn DocumentStore) -> Result<bool> {
        let update = Update::new().add_to_set("connections", self.counterpart.as_str());
        self.apply(store, &update).await
    }

    /// Remove the entry. Returns whether the array changed.
    async fn remove(&self, store: &dyn DocumentStore) -> Result<bool> {
        let update = Update::new().pull("connections", self.counterpart.as_str());
        self.apply(store, &update).await
    }

    async fn apply(&self, store: &dyn DocumentStore, update: &Update) -> Result<bool> {
        let outcome = store
            .update_one(self.collection, &Filter::key(&self.owner), update)
            .await?;
        if outcome.matched == 0 {
            return Err(AppError::NotFound(format!(
                "{} {} not found",
                self.collection, self.owner
            )));
        }
        Ok(outcome.modified == 1)
    }
}

/// Inverse of an applied step.
#[derive(Debug)]
enum Undo {
    RemoveMirror(MirrorEntry),
    RestoreMirror(MirrorEntry),
    RestoreStatus {
        key: String,
        status: ConnectionStatus,
    },
}

/// Multi-document operation with compensation on failure.
struct Saga<'a> {
    store: &'a dyn DocumentStore,
    operation: &'static str,
    applied: Vec<Undo>,
}

impl<'a> Saga<'a> {
    fn new(store: &'a dyn DocumentStore, operation: &'static str) -> Self {
        Self {
            store,
            operation,
            applied: Vec::new(),
        }
    }

    fn record(&mut self, undo: Undo) {
        self.applied.push(undo);
    }

    /// Undo every applied step, newest first, then hand back `err`.
    ///
    /// Compensation is itself best-effort: a failed undo is logged and the
    /// remaining undos still run.
    async fn abort(self, err: AppError) -> AppError {
        if !self.applied.is_empty() {
            tracing::warn!(
                operation = self.operation,
                steps = self.applied.len(),
                error = %err,
                "Compensating partially applied operation"
            );
        }

        for undo in self.applied.into_iter().rev() {
            let result = match &undo {
                Undo::RemoveMirror(entry) => entry.remove(self.store).await.map(|_| ()),
                Undo::RestoreMirror(entry) => entry.add(self.store).await.map(|_| ()),
                Undo::RestoreStatus { key, status } => self
                    .store
                    .update_one(
                        collections::CONNECTIONS,
                        &Filter::key(key),
                        &Update::new().set("status", status.as_str()),
                    )
                    .await
                    .map(|_| ()),
            };

            if let Err(e) = result {
                tracing::error!(
                    operation = self.operation,
                    undo = ?undo,
                    error = %e,
                    "Compensation step failed; relationship mirrors may be inconsistent"
                );
            }
        }

        err
    }
}

// ─── Manager ─────────────────────────────────────────────────────

/// Maintains connections and their mirrors.
#[derive(Clone)]
pub struct RelationshipManager {
    store: Arc<dyn DocumentStore>,
}

impl RelationshipManager {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
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

    async fn require_connection(&self, patient_id: &str, therapist_id: &str) -> Result<Connection> {
        self.store
            .get::<Connection>(
                collections::CONNECTIONS,
                &Connection::key(patient_id, therapist_id),
            )
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "No connection between patient {} and therapist {}",
                    patient_id, therapist_id
                ))
            })
    }

    /// Add both mirror entries, recording each in the saga.
    async fn link_mirrors(
        &self,
        saga: &mut Saga<'_>,
        patient_id: &str,
        therapist_id: &str,
    ) -> Result<()> {
        let on_patient = MirrorEntry::on_patient(patient_id, therapist_id);
        if !on_patient.add(self.store.as_ref()).await? {
            return Err(AppError::Conflict(format!(
                "Patient {} already lists therapist {}",
                patient_id, therapist_id
            )));
        }
        saga.record(Undo::RemoveMirror(on_patient));

        let on_therapist = MirrorEntry::on_therapist(patient_id, therapist_id);
        if !on_therapist.add(self.store.as_ref()).await? {
            return Err(AppError::Conflict(format!(
                "Therapist {} already lists patient {}",
                therapist_id, patient_id
            )));
        }
        saga.record(Undo::RemoveMirror(on_therapist));

        Ok(())
    }

    /// Request (patient) or establish (therapist) a connection.
    pub async fn connect(
        &self,
        patient_id: &str,
        therapist_id: &str,
        requester: Role,
    ) -> Result<ConnectOutcome> {
        validate_id("patient", patient_id)?;
        validate_id("therapist", therapist_id)?;

        self.require_patient(patient_id).await?;
        self.require_therapist(therapist_id).await?;

        let key = Connection::key(patient_id, therapist_id);
        if let Some(existing) = self
            .store
            .get::<Connection>(collections::CONNECTIONS, &key)
            .await?
        {
            tracing::debug!(
                patient_id,
                therapist_id,
                status = existing.status.as_str(),
                "Connection already exists"
            );
            return Ok(ConnectOutcome::AlreadyExists(existing));
        }

        let status = match requester {
            Role::Therapist => ConnectionStatus::Accepted,
            Role::Patient => ConnectionStatus::Pending,
        };
        let connection = Connection::new(patient_id, therapist_id, status, now_rfc3339());

        let mut saga = Saga::new(self.store.as_ref(), "connect");
        if status == ConnectionStatus::Accepted {
            if let Err(e) = self.link_mirrors(&mut saga, patient_id, therapist_id).await {
                return Err(saga.abort(e).await);
            }
        }

        let doc = to_document(&connection)?;
        if let Err(e) = self.store.insert_one(collections::CONNECTIONS, doc).await {
            return Err(saga.abort(e).await);
        }

        tracing::info!(
            patient_id,
            therapist_id,
            requester = %requester,
            status = status.as_str(),
            "Connection created"
        );

        Ok(ConnectOutcome::Created(connection))
    }

    /// Accept a pending connection and link both mirrors.
    pub async fn accept_connection(
        &self,
        patient_id: &str,
        therapist_id: &str,
    ) -> Result<Connection> {
        validate_id("patient", patient_id)?;
        validate_id("therapist", therapist_id)?;

        let key = Connection::key(patient_id, therapist_id);
        let outcome = self
            .store
            .update_one(
                collections::CONNECTIONS,
                &Filter::key(&key).and(Filter::field_eq(
                    "status",
                    ConnectionStatus::Pending.as_str(),
                )),
                &Update::new().set("status", ConnectionStatus::Accepted.as_str()),
            )
            .await?;

        if outcome.matched == 0 {
            return Err(AppError::NotFound(format!(
                "No pending connection between patient {} and therapist {}",
                patient_id, therapist_id
            )));
        }

        let mut saga = Saga::new(self.store.as_ref(), "accept_connection");
        saga.record(Undo::RestoreStatus {
            key,
            status: ConnectionStatus::Pending,
        });

        if let Err(e) = self.link_mirrors(&mut saga, patient_id, therapist_id).await {
            return Err(saga.abort(e).await);
        }

        tracing::info!(patient_id, therapist_id, "Connection accepted");

        self.require_connection(patient_id, therapist_id).await
    }

    /// Delete a pending connection request. Mirrors are not involved.
    pub async fn reject_connection(&self, patient_id: &str, therapist_id: &str) -> Result<()> {
        validate_id("patient", patient_id)?;
        validate_id("therapist", therapist_id)?;

        let deleted = self
            .store
            .delete_one(
                collections::CONNECTIONS,
                &Filter::key(Connection::key(patient_id, therapist_id)).and(Filter::field_eq(
                    "status",
                    ConnectionStatus::Pending.as_str(),
                )),
            )
            .await?;

        if deleted == 0 {
            return Err(AppError::NotFound(format!(
                "No pending connection between patient {} and therapist {}",
                patient_id, therapist_id
            )));
        }

        tracing::info!(patient_id, therapist_id, "Connection request rejected");
        Ok(())
    }

    /// Remove an accepted connection: both mirrors, then the record.
    pub async fn disconnect(&self, patient_id: &str, therapist_id: &str) -> Result<()> {
        validate_id("patient", patient_id)?;
        validate_id("therapist", therapist_id)?;

        let patient = self.require_patient(patient_id).await?;
        let therapist = self.require_therapist(therapist_id).await?;

        if !patient.is_connected_to(therapist_id) || !therapist.is_connected_to(patient_id) {
            return Err(AppError::Conflict(format!(
                "Connection between patient {} and therapist {} does not exist",
                patient_id, therapist_id
            )));
        }

        let mut saga = Saga::new(self.store.as_ref(), "disconnect");

        for entry in [
            MirrorEntry::on_patient(patient_id, therapist_id),
            MirrorEntry::on_therapist(patient_id, therapist_id),
        ] {
            match entry.remove(self.store.as_ref()).await {
                Ok(true) => saga.record(Undo::RestoreMirror(entry)),
                Ok(false) => {
                    let err = AppError::Conflict(format!(
                        "{} {} no longer lists {}",
                        entry.collection, entry.owner, entry.counterpart
                    ));
                    return Err(saga.abort(err).await);
                }
                Err(e) => return Err(saga.abort(e).await),
            }
        }

        let deleted = match self
            .store
            .delete_one(
                collections::CONNECTIONS,
                &Filter::key(Connection::key(patient_id, therapist_id)),
            )
            .await
        {
            Ok(deleted) => deleted,
            Err(e) => return Err(saga.abort(e).await),
        };

        if deleted == 0 {
            // Mirrors said connected but there is no record: leave the
            // mirrors cleared and report the inconsistency.
            tracing::warn!(
                patient_id,
                therapist_id,
                "Mirrors cleared but no connection record existed"
            );
            return Err(AppError::NotFound(format!(
                "No connection record between patient {} and therapist {}",
                patient_id, therapist_id
            )));
        }

        tracing::info!(patient_id, therapist_id, "Connection removed");
        Ok(())
    }

    /// Flip the mute flag. Returns the new value.
    pub async fn toggle_mute(&self, patient_id: &str, therapist_id: &str) -> Result<bool> {
        validate_id("patient", patient_id)?;
        validate_id("therapist", therapist_id)?;

        let connection = self.require_connection(patient_id, therapist_id).await?;
        let muted = !connection.is_muted;

        let outcome = self
            .store
            .update_one(
                collections::CONNECTIONS,
                &Filter::key(&connection.id),
                &Update::new().set("is_muted", muted),
            )
            .await?;
        if outcome.matched == 0 {
            return Err(AppError::NotFound(format!(
                "No connection between patient {} and therapist {}",
                patient_id, therapist_id
            )));
        }

        tracing::debug!(patient_id, therapist_id, muted, "Connection mute toggled");
        Ok(muted)
    }

    pub async fn get_connection_details(
        &self,
        patient_id: &str,
        therapist_id: &str,
    ) -> Result<ConnectionDetails> {
        validate_id("patient", patient_id)?;
        validate_id("therapist", therapist_id)?;

        let connection = self.require_connection(patient_id, therapist_id).await?;
        Ok(ConnectionDetails {
            diagnosis: connection.diagnosis.unwrap_or_default(),
            notes: connection.notes.unwrap_or_default(),
        })
    }

    /// Set diagnosis and/or notes. Returns the resulting details.
    pub async fn update_connection_details(
        &self,
        patient_id: &str,
        therapist_id: &str,
        details: ConnectionDetailsUpdate,
    ) -> Result<ConnectionDetails> {
        validate_id("patient", patient_id)?;
        validate_id("therapist", therapist_id)?;
        details.validate()?;

        let connection = self.require_connection(patient_id, therapist_id).await?;

        let mut update = Update::new();
        if let Some(diagnosis) = &details.diagnosis {
            update = update.set("diagnosis", diagnosis.as_str());
        }
        if let Some(notes) = &details.notes {
            update = update.set("notes", notes.as_str());
        }

        let outcome = self
            .store
            .update_one(collections::CONNECTIONS, &Filter::key(&connection.id), &update)
            .await?;
        if outcome.matched == 0 {
            return Err(AppError::NotFound(format!(
                "No connection between patient {} and therapist {}",
                patient_id, therapist_id
            )));
        }

        Ok(ConnectionDetails {
            diagnosis: details
                .diagnosis
                .or(connection.diagnosis)
                .unwrap_or_default(),
            notes: details.notes.or(connection.notes).unwrap_or_default(),
        })
    }

    /// All connections of a user, pending and accepted, with counterpart
    /// profiles resolved in one batched lookup.
    ///
    /// Malformed connection records and connections whose counterpart no
    /// longer exists are skipped.
    pub async fn list_connections(
        &self,
        user_id: &str,
        role: Role,
    ) -> Result<Vec<ConnectionSummary>> {
        validate_id("user", user_id)?;

        let (own_field, counterpart_collection) = match role {
            Role::Patient => ("patient_id", collections::THERAPISTS),
            Role::Therapist => ("therapist_id", collections::PATIENTS),
        };

        let docs = self
            .store
            .find_many(collections::CONNECTIONS, &Filter::field_eq(own_field, user_id))
            .await?;

        let mut connections = Vec::with_capacity(docs.len());
        for doc in docs {
            match serde_json::from_value::<Connection>(serde_json::Value::Object(doc)) {
                Ok(connection) => connections.push(connection),
                Err(e) => {
                    tracing::warn!(user_id, error = %e, "Skipping malformed connection record")
                }
            }
        }

        if connections.is_empty() {
            return Ok(Vec::new());
        }

        let counterpart_ids: Vec<String> = connections
            .iter()
            .map(|c| c.counterpart(role).to_string())
            .collect();

        let mut profiles: HashMap<String, CounterpartProfile> = HashMap::new();
        for doc in self
            .store
            .find_many(counterpart_collection, &Filter::key_in(counterpart_ids))
            .await?
        {
            match serde_json::from_value::<CounterpartProfile>(serde_json::Value::Object(doc)) {
                Ok(profile) => {
                    profiles.insert(profile.id.clone(), profile);
                }
                Err(e) => tracing::warn!(user_id, error = %e, "Skipping malformed profile"),
            }
        }

        let summaries = connections
            .into_iter()
            .filter_map(|connection| {
                let counterpart = connection.counterpart(role);
                let Some(profile) = profiles.get(counterpart) else {
                    tracing::warn!(
                        user_id,
                        counterpart,
                        "Skipping connection to missing profile"
                    );
                    return None;
                };
                Some(ConnectionSummary {
                    id: profile.id.clone(),
                    firstname: profile.firstname.clone(),
                    lastname: profile.lastname.clone(),
                    image_url: profile.image_url.clone(),
                    expo_push_token: profile.expo_push_token.clone(),
                    status: connection.status,
                    is_muted: connection.is_muted,
                })
            })
            .collect();

        Ok(summaries)
    }
}
