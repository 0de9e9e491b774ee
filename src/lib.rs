// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! PowerPlay: backend for a physical-therapy app
//!
//! This crate provides the JSON API that connects patients with
//! therapists, lets therapists build exercise routines and assign them,
//! and records what patients complete.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::DocumentStore;
use services::{
    CompletionService, ExerciseService, MessageService, ProfileService, RelationshipManager,
    RoutineService,
};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn DocumentStore>,
    pub relationships: RelationshipManager,
    pub routines: RoutineService,
    pub exercises: ExerciseService,
    pub completions: CompletionService,
    pub profiles: ProfileService,
    pub messages: MessageService,
}

impl AppState {
    /// Build every service on top of one store handle.
    pub fn new(config: Config, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            config,
            relationships: RelationshipManager::new(store.clone()),
            routines: RoutineService::new(store.clone()),
            exercises: ExerciseService::new(store.clone()),
            completions: CompletionService::new(store.clone()),
            profiles: ProfileService::new(store.clone()),
            messages: MessageService::new(store.clone()),
            store,
        }
    }
}
