//! Patient and therapist profiles.

use crate::db::document::to_document;
use crate::db::{collections, DocumentStore, Filter, Update};
use crate::error::{AppError, Result};
use crate::models::{validate_id, Patient, ProfileUpdate, Registration, Therapist};
use std::sync::Arc;
use validator::Validate;

#[derive(Clone)]
pub struct ProfileService {
    store: Arc<dyn DocumentStore>,
}

impl ProfileService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn create_patient(&self, registration: Registration) -> Result<Patient> {
        registration.validate()?;
        validate_id("patient", &registration.id)?;

        let patient = Patient::register(registration);
        self.store
            .insert_one(collections::PATIENTS, to_document(&patient)?)
            .await?;

        tracing::info!(patient_id = %patient.id, "Patient registered");
        Ok(patient)
    }

    pub async fn create_therapist(&self, registration: Registration) -> Result<Therapist> {
        registration.validate()?;
        validate_id("therapist", &registration.id)?;

        let therapist = Therapist::register(registration);
        self.store
            .insert_one(collections::THERAPISTS, to_document(&therapist)?)
            .await?;

        tracing::info!(therapist_id = %therapist.id, "Therapist registered");
        Ok(therapist)
    }

    pub async fn get_patient(&self, patient_id: &str) -> Result<Patient> {
        validate_id("patient", patient_id)?;
        self.store
            .get::<Patient>(collections::PATIENTS, patient_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Patient {} not found", patient_id)))
    }

    pub async fn get_therapist(&self, therapist_id: &str) -> Result<Therapist> {
        validate_id("therapist", therapist_id)?;
        self.store
            .get::<Therapist>(collections::THERAPISTS, therapist_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Therapist {} not found", therapist_id)))
    }

    pub async fn find_patient_by_email(&self, email: &str) -> Result<Patient> {
        self.store
            .get_many::<Patient>(collections::PATIENTS, &Filter::field_eq("email", email))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound(format!("No patient with email {}", email)))
    }

    pub async fn find_therapist_by_email(&self, email: &str) -> Result<Therapist> {
        self.store
            .get_many::<Therapist>(collections::THERAPISTS, &Filter::field_eq("email", email))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound(format!("No therapist with email {}", email)))
    }

    pub async fn update_patient(&self, patient_id: &str, update: ProfileUpdate) -> Result<bool> {
        validate_id("patient", patient_id)?;
        self.apply_update(collections::PATIENTS, patient_id, update)
            .await
    }

    pub async fn update_therapist(&self, therapist_id: &str, update: ProfileUpdate) -> Result<bool> {
        validate_id("therapist", therapist_id)?;
        self.apply_update(collections::THERAPISTS, therapist_id, update)
            .await
    }

    async fn apply_update(
        &self,
        collection: &'static str,
        id: &str,
        profile: ProfileUpdate,
    ) -> Result<bool> {
        profile.validate()?;

        let mut update = Update::new();
        if let Some(username) = profile.username {
            update = update.set("username", username);
        }
        if let Some(image_url) = profile.image_url {
            update = update.set("imageUrl", image_url);
        }
        if let Some(token) = profile.expo_push_token {
            update = update.set("expoPushToken", token);
        }

        if update.is_empty() {
            // Still report a missing profile.
            if self.store.find_by_key(collection, id).await?.is_none() {
                return Err(AppError::NotFound(format!("{} {} not found", collection, id)));
            }
            return Ok(false);
        }

        let outcome = self
            .store
            .update_one(collection, &Filter::key(id), &update)
            .await?;
        if outcome.matched == 0 {
            return Err(AppError::NotFound(format!("{} {} not found", collection, id)));
        }

        tracing::debug!(collection, id, modified = outcome.modified, "Profile updated");
        Ok(outcome.modified == 1)
    }
}
