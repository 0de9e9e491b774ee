//! Direct messages between users.

use serde::{Deserialize, Serialize};
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Message document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Message {
    #[serde(rename = "_id")]
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    /// Free-form message type (e.g. "text", "routine")
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub read: bool,
    /// Send time (UTC, RFC3339)
    pub timestamp: String,
    #[serde(default)]
    pub body: String,
}

/// Message as submitted by the sender.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct MessageDraft {
    #[validate(length(min = 1, max = 128))]
    pub sender_id: String,
    #[validate(length(min = 1, max = 128))]
    pub receiver_id: String,
    #[serde(rename = "type", default = "default_kind")]
    #[validate(length(min = 1, max = 32))]
    pub kind: String,
    #[validate(length(min = 1, max = 4000))]
    pub body: String,
}

fn default_kind() -> String {
    "text".to_string()
}
