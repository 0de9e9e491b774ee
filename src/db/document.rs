// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Document, filter and update primitives shared by every store backend.
//!
//! A document is a JSON object whose `_id` field holds its key. Filters and
//! updates follow document-store conventions (`$set`, `$addToSet`, `$pull`)
//! and are evaluated in process, so all backends agree on the exact
//! matched/modified counts.

use crate::error::AppError;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

/// Name of the key field carried inside every document.
pub const KEY_FIELD: &str = "_id";

/// A stored document.
pub type Document = Map<String, Value>;

/// Read the key of a document, if it has one.
pub fn document_key(doc: &Document) -> Option<&str> {
    doc.get(KEY_FIELD).and_then(Value::as_str)
}

/// Serialize a typed record into a document.
pub fn to_document<T: Serialize>(value: &T) -> Result<Document, AppError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(AppError::Internal(anyhow::anyhow!(
            "record did not serialize to an object: {}",
            other
        ))),
        Err(e) => Err(AppError::Internal(e.into())),
    }
}

/// Deserialize a document into a typed record.
///
/// Malformed documents surface as storage failures: the record came from
/// the store, not from the caller.
pub fn from_document<T: DeserializeOwned>(doc: Document) -> Result<T, AppError> {
    let key = document_key(&doc).unwrap_or("<no key>").to_string();
    serde_json::from_value(Value::Object(doc))
        .map_err(|e| AppError::Database(format!("Malformed document {}: {}", key, e)))
}

/// Selects the documents an operation applies to.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Exact key match.
    Key(String),
    /// Key is any of the given keys.
    KeyIn(Vec<String>),
    /// A string field equals the given value.
    FieldEq { field: String, value: String },
    /// An array field holds the id, either as a plain string or as a
    /// `{_id}` reference stub.
    ArrayHasRef { field: String, id: String },
    /// Every sub-filter matches.
    All(Vec<Filter>),
}

impl Filter {
    pub fn key(key: impl Into<String>) -> Self {
        Filter::Key(key.into())
    }

    pub fn key_in<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Filter::KeyIn(keys.into_iter().map(Into::into).collect())
    }

    pub fn field_eq(field: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::FieldEq {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn array_has_ref(field: impl Into<String>, id: impl Into<String>) -> Self {
        Filter::ArrayHasRef {
            field: field.into(),
            id: id.into(),
        }
    }

    /// Conjunction with another filter.
    pub fn and(self, other: Filter) -> Self {
        match self {
            Filter::All(mut filters) => {
                filters.push(other);
                Filter::All(filters)
            }
            first => Filter::All(vec![first, other]),
        }
    }

    /// Evaluate the filter against a document.
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Filter::Key(key) => document_key(doc) == Some(key.as_str()),
            Filter::KeyIn(keys) => document_key(doc)
                .map(|k| keys.iter().any(|key| key == k))
                .unwrap_or(false),
            Filter::FieldEq { field, value } => {
                doc.get(field).and_then(Value::as_str) == Some(value.as_str())
            }
            Filter::ArrayHasRef { field, id } => doc
                .get(field)
                .and_then(Value::as_array)
                .map(|items| items.iter().any(|item| ref_id(item) == Some(id.as_str())))
                .unwrap_or(false),
            Filter::All(filters) => filters.iter().all(|f| f.matches(doc)),
        }
    }

    /// Keys this filter is restricted to, if it pins the key at all.
    ///
    /// Backends use this to turn a query into direct key lookups.
    pub fn pinned_keys(&self) -> Option<Vec<String>> {
        match self {
            Filter::Key(key) => Some(vec![key.clone()]),
            Filter::KeyIn(keys) => Some(keys.clone()),
            Filter::All(filters) => filters.iter().find_map(Filter::pinned_keys),
            _ => None,
        }
    }

    /// Field equalities, if the filter is made only of them.
    pub fn field_equalities(&self) -> Option<Vec<(String, String)>> {
        match self {
            Filter::FieldEq { field, value } => Some(vec![(field.clone(), value.clone())]),
            Filter::All(filters) => {
                let mut pairs = Vec::new();
                for filter in filters {
                    pairs.extend(filter.field_equalities()?);
                }
                Some(pairs)
            }
            _ => None,
        }
    }
}

/// Identifier carried by an array element: the string itself or a stub's `_id`.
pub fn ref_id(item: &Value) -> Option<&str> {
    match item {
        Value::String(s) => Some(s),
        Value::Object(map) => map.get(KEY_FIELD).and_then(Value::as_str),
        _ => None,
    }
}

/// Field modifications applied to a single document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    set: Vec<(String, Value)>,
    add_to_set: Vec<(String, Value)>,
    pull: Vec<(String, Value)>,
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite a field. Setting the key field is ignored.
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set.push((field.into(), value.into()));
        self
    }

    /// Append to an array field unless an equal element is present.
    pub fn add_to_set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.add_to_set.push((field.into(), value.into()));
        self
    }

    /// Remove matching elements from an array field.
    ///
    /// A stub value (`{_id: ..}`) removes every element referencing that id.
    pub fn pull(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.pull.push((field.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.add_to_set.is_empty() && self.pull.is_empty()
    }

    /// Apply to a document in place. Returns `true` if anything changed.
    pub fn apply(&self, doc: &mut Document) -> bool {
        let mut modified = false;

        for (field, value) in &self.set {
            if field == KEY_FIELD {
                continue;
            }
            if doc.get(field) != Some(value) {
                doc.insert(field.clone(), value.clone());
                modified = true;
            }
        }

        for (field, value) in &self.add_to_set {
            let entry = doc
                .entry(field.clone())
                .or_insert_with(|| Value::Array(Vec::new()));
            if !entry.is_array() {
                *entry = Value::Array(Vec::new());
            }
            if let Value::Array(items) = entry {
                if !items.contains(value) {
                    items.push(value.clone());
                    modified = true;
                }
            }
        }

        for (field, value) in &self.pull {
            if let Some(Value::Array(items)) = doc.get_mut(field) {
                let before = items.len();
                match value {
                    Value::Object(stub) if stub.contains_key(KEY_FIELD) => {
                        let id = stub.get(KEY_FIELD).and_then(Value::as_str);
                        items.retain(|item| item != value && (id.is_none() || ref_id(item) != id));
                    }
                    _ => items.retain(|item| item != value),
                }
                if items.len() != before {
                    modified = true;
                }
            }
        }

        modified
    }
}

/// Counts reported by a single-document update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub matched: u64,
    pub modified: u64,
}

impl UpdateOutcome {
    pub const NO_MATCH: UpdateOutcome = UpdateOutcome {
        matched: 0,
        modified: 0,
    };

    pub fn matched(modified: bool) -> Self {
        UpdateOutcome {
            matched: 1,
            modified: u64::from(modified),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_add_to_set_is_idempotent() {
        let mut d = doc(json!({"_id": "p1", "connections": []}));
        let update = Update::new().add_to_set("connections", "t1");

        assert!(update.apply(&mut d));
        assert!(!update.apply(&mut d));
        assert_eq!(d["connections"], json!(["t1"]));
    }

    #[test]
    fn test_add_to_set_creates_missing_array() {
        let mut d = doc(json!({"_id": "t1"}));
        assert!(Update::new().add_to_set("favorites", "e1").apply(&mut d));
        assert_eq!(d["favorites"], json!(["e1"]));
    }

    #[test]
    fn test_pull_stub_matches_by_id() {
        let mut d = doc(json!({
            "_id": "p1",
            "assigned_routines": [{"_id": "r1", "legacy": true}, {"_id": "r2"}]
        }));

        assert!(Update::new()
            .pull("assigned_routines", json!({"_id": "r1"}))
            .apply(&mut d));
        assert_eq!(d["assigned_routines"], json!([{"_id": "r2"}]));
    }

    #[test]
    fn test_pull_missing_element_is_not_a_modification() {
        let mut d = doc(json!({"_id": "p1", "connections": ["t2"]}));
        assert!(!Update::new().pull("connections", "t1").apply(&mut d));
    }

    #[test]
    fn test_set_never_overwrites_key() {
        let mut d = doc(json!({"_id": "r1", "name": "Old"}));
        let modified = Update::new()
            .set(KEY_FIELD, "r2")
            .set("name", "New")
            .apply(&mut d);

        assert!(modified);
        assert_eq!(d["_id"], json!("r1"));
        assert_eq!(d["name"], json!("New"));
    }

    #[test]
    fn test_set_same_value_is_not_a_modification() {
        let mut d = doc(json!({"_id": "c1", "status": "accepted"}));
        assert!(!Update::new().set("status", "accepted").apply(&mut d));
    }

    #[test]
    fn test_filter_matching() {
        let d = doc(json!({
            "_id": "p1",
            "status": "pending",
            "assigned_routines": [{"_id": "r1"}],
            "favorites": ["x"]
        }));

        assert!(Filter::key("p1").matches(&d));
        assert!(Filter::key_in(["a", "p1"]).matches(&d));
        assert!(Filter::field_eq("status", "pending").matches(&d));
        assert!(!Filter::field_eq("status", "accepted").matches(&d));
        assert!(Filter::array_has_ref("assigned_routines", "r1").matches(&d));
        assert!(Filter::array_has_ref("favorites", "x").matches(&d));
        assert!(!Filter::array_has_ref("favorites", "r1").matches(&d));
        assert!(Filter::key("p1")
            .and(Filter::field_eq("status", "pending"))
            .matches(&d));
    }

    #[test]
    fn test_pinned_keys_and_equalities() {
        let f = Filter::key("c1").and(Filter::field_eq("status", "pending"));
        assert_eq!(f.pinned_keys(), Some(vec!["c1".to_string()]));
        assert_eq!(f.field_equalities(), None);

        let f = Filter::field_eq("sender_id", "a").and(Filter::field_eq("receiver_id", "b"));
        assert_eq!(f.pinned_keys(), None);
        assert_eq!(
            f.field_equalities(),
            Some(vec![
                ("sender_id".to_string(), "a".to_string()),
                ("receiver_id".to_string(), "b".to_string())
            ])
        );
    }
}
