//! Therapist profile stored in the `Therapists` collection.

use super::routine::Reference;
use super::Registration;
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Therapist document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Therapist {
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
    /// Patients with an accepted connection (mirror of `Connections`)
    #[serde(default)]
    pub connections: Vec<String>,
    /// Routines authored by this therapist
    #[serde(default)]
    pub custom_routines: Vec<Reference>,
    /// Favorited exercise or routine IDs
    #[serde(default)]
    pub favorites: Vec<String>,
    #[serde(default, rename = "imageUrl", skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(
        default,
        rename = "expoPushToken",
        skip_serializing_if = "Option::is_none"
    )]
    pub expo_push_token: Option<String>,
}

impl Therapist {
    /// Build a fresh therapist with empty relationship sets.
    pub fn register(registration: Registration) -> Self {
        Self {
            id: registration.id,
            username: registration.username,
            firstname: registration.firstname,
            lastname: registration.lastname,
            email: registration.email,
            connections: Vec::new(),
            custom_routines: Vec::new(),
            favorites: Vec::new(),
            image_url: None,
            expo_push_token: None,
        }
    }

    pub fn is_connected_to(&self, patient_id: &str) -> bool {
        self.connections.iter().any(|id| id == patient_id)
    }

    pub fn owns_routine(&self, routine_id: &str) -> bool {
        self.custom_routines.iter().any(|r| r.id == routine_id)
    }

    pub fn has_favorite(&self, target_id: &str) -> bool {
        self.favorites.iter().any(|id| id == target_id)
    }
}
