// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Patient/therapist connection records.
//!
//! The `Connections` collection is the source of truth for relationship
//! status. The `connections` arrays on patients and therapists mirror the
//! accepted ones.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Relationship status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum ConnectionStatus {
    Pending,
    Accepted,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Pending => "pending",
            ConnectionStatus::Accepted => "accepted",
        }
    }
}

/// Which side of a relationship a user is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Patient,
    Therapist,
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "patient" => Ok(Role::Patient),
            "therapist" => Ok(Role::Therapist),
            other => Err(format!("Unknown role '{}'", other)),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Patient => write!(f, "patient"),
            Role::Therapist => write!(f, "therapist"),
        }
    }
}

/// Connection document, one per (patient, therapist) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    /// Composite key, see [`Connection::key`]
    #[serde(rename = "_id")]
    pub id: String,
    pub patient_id: String,
    pub therapist_id: String,
    pub status: ConnectionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnosis: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub is_muted: bool,
    /// When the connection was requested (ISO 8601)
    #[serde(default)]
    pub created_at: String,
}

impl Connection {
    /// Document key for a pair.
    ///
    /// Both halves are percent-encoded so the `:` separator cannot occur
    /// inside either one.
    pub fn key(patient_id: &str, therapist_id: &str) -> String {
        format!(
            "{}:{}",
            urlencoding::encode(patient_id),
            urlencoding::encode(therapist_id)
        )
    }

    pub fn new(
        patient_id: &str,
        therapist_id: &str,
        status: ConnectionStatus,
        created_at: String,
    ) -> Self {
        Self {
            id: Self::key(patient_id, therapist_id),
            patient_id: patient_id.to_string(),
            therapist_id: therapist_id.to_string(),
            status,
            diagnosis: None,
            notes: None,
            is_muted: false,
            created_at,
        }
    }

    /// The other party's ID from the point of view of `role`.
    pub fn counterpart(&self, role: Role) -> &str {
        match role {
            Role::Patient => &self.therapist_id,
            Role::Therapist => &self.patient_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_unambiguous() {
        assert_ne!(Connection::key("a:b", "c"), Connection::key("a", "b:c"));
        assert_ne!(Connection::key("a_b", "c"), Connection::key("a", "b_c"));
        assert_eq!(Connection::key("p1", "t1"), "p1:t1");
    }

    #[test]
    fn test_status_wire_format() {
        assert_eq!(
            serde_json::to_value(ConnectionStatus::Pending).unwrap(),
            serde_json::json!("pending")
        );
        assert_eq!(ConnectionStatus::Accepted.as_str(), "accepted");
    }

    #[test]
    fn test_counterpart() {
        let c = Connection::new("p1", "t1", ConnectionStatus::Pending, String::new());
        assert_eq!(c.counterpart(Role::Patient), "t1");
        assert_eq!(c.counterpart(Role::Therapist), "p1");
    }
}
