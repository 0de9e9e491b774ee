// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Patient profile stored in the `Patients` collection.

use super::routine::Reference;
use super::Registration;
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Patient document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Patient {
    /// Sign-in provider ID (also used as document ID)
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub firstname: String,
    #[serde(default)]
    pub lastname: String,
    #[serde(default)]
    pub email: String,
    /// Therapists with an accepted connection (mirror of `Connections`)
    #[serde(default)]
    pub connections: Vec<String>,
    /// Routines assigned by therapists
    #[serde(default)]
    pub assigned_routines: Vec<Reference>,
    #[serde(default, rename = "imageUrl", skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Consecutive days with a completed routine
    #[serde(default)]
    pub streak: u32,
    #[serde(
        default,
        rename = "expoPushToken",
        skip_serializing_if = "Option::is_none"
    )]
    pub expo_push_token: Option<String>,
}

impl Patient {
    /// Build a fresh patient with empty relationship sets.
    pub fn register(registration: Registration) -> Self {
        Self {
            id: registration.id,
            username: registration.username,
            firstname: registration.firstname,
            lastname: registration.lastname,
            email: registration.email,
            connections: Vec::new(),
            assigned_routines: Vec::new(),
            image_url: None,
            streak: 0,
            expo_push_token: None,
        }
    }

    pub fn is_connected_to(&self, therapist_id: &str) -> bool {
        self.connections.iter().any(|id| id == therapist_id)
    }

    pub fn has_routine(&self, routine_id: &str) -> bool {
        self.assigned_routines.iter().any(|r| r.id == routine_id)
    }
}
