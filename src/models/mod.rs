// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod connection;
pub mod exercise;
pub mod history;
pub mod message;
pub mod patient;
pub mod profile;
pub mod routine;
pub mod therapist;

pub use connection::{Connection, ConnectionStatus, Role};
pub use exercise::{Exercise, ExerciseDraft, ExercisePatch};
pub use history::{CompletedExercise, CompletedRoutine, CompletionKind, CompletionLog};
pub use message::{Message, MessageDraft};
pub use patient::Patient;
pub use profile::{ProfileUpdate, Registration};
pub use routine::{ExpandedRoutine, Reference, ReferenceInput, Routine, RoutineDraft, RoutinePatch};
pub use therapist::Therapist;

use crate::error::AppError;

/// Longest identifier accepted from callers.
pub const MAX_ID_LEN: usize = 128;

/// Check that a caller-supplied identifier can be used as a document key.
///
/// Keys must be non-empty, at most [`MAX_ID_LEN`] bytes and free of `/`.
pub fn validate_id(kind: &str, id: &str) -> Result<(), AppError> {
    if id.trim().is_empty() {
        return Err(AppError::BadRequest(format!("{} id must not be empty", kind)));
    }
    if id.len() > MAX_ID_LEN {
        return Err(AppError::BadRequest(format!(
            "{} id exceeds {} characters",
            kind, MAX_ID_LEN
        )));
    }
    if id.contains('/') {
        return Err(AppError::BadRequest(format!(
            "{} id must not contain '/'",
            kind
        )));
    }
    Ok(())
}
