// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod completion;
pub mod exercises;
pub mod messages;
pub mod profiles;
pub mod relationships;
pub mod routines;

pub use completion::{CompletionRecord, CompletionService};
pub use exercises::{ExerciseService, ExploreCategory, ExploreSubcategory};
pub use messages::MessageService;
pub use profiles::ProfileService;
pub use relationships::{
    ConnectOutcome, ConnectionDetails, ConnectionDetailsUpdate, ConnectionSummary,
    RelationshipManager,
};
pub use routines::{AssignOutcome, DeleteReport, RoutineService, RoutineUpdate};
