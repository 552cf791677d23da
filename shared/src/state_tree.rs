//! The authoritative, path-addressable world document.
//!
//! Every mutation made through [`StateTree::set`], [`StateTree::insert`] or
//! [`StateTree::delete`] is recorded as a [`Change`] in an outbox. The owner
//! drains the outbox with [`StateTree::drain_changes`] and fans the events
//! out to local listeners and remote clients.

use crate::error::StateError;
use crate::path;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Set,
    Add,
    Remove,
}

/// A single change event, as delivered to subscribers and sent over the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    pub path: String,
    pub operation: Operation,
    pub value: Option<Value>,
}

impl Change {
    pub fn set(path: impl Into<String>, value: Value) -> Self {
        Change {
            path: path.into(),
            operation: Operation::Set,
            value: Some(value),
        }
    }

    pub fn add(path: impl Into<String>, value: Value) -> Self {
        Change {
            path: path.into(),
            operation: Operation::Add,
            value: Some(value),
        }
    }

    pub fn remove(path: impl Into<String>) -> Self {
        Change {
            path: path.into(),
            operation: Operation::Remove,
            value: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StateTree {
    root: BTreeMap<String, Value>,
    changes: Vec<Change>,
}

impl StateTree {
    /// Creates a tree from a root record.
    pub fn new(root: Value) -> Result<Self, StateError> {
        match root {
            Value::Record(root) => Ok(StateTree {
                root,
                changes: Vec::new(),
            }),
            _ => Err(StateError::NotARecord(String::new())),
        }
    }

    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut parts = path::segments(path);
        let mut current = self.root.get(parts.next()?)?;
        for part in parts {
            current = current.get(part)?;
        }
        Some(current)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    fn require(&self, path: &str) -> Result<&Value, StateError> {
        self.get(path)
            .ok_or_else(|| StateError::MissingPath(path.to_owned()))
    }

    pub fn number(&self, path: &str) -> Result<f64, StateError> {
        let value = self.require(path)?;
        value.as_f64().ok_or_else(|| mismatch(path, "number", value))
    }

    pub fn flag(&self, path: &str) -> Result<bool, StateError> {
        let value = self.require(path)?;
        value.as_bool().ok_or_else(|| mismatch(path, "boolean", value))
    }

    pub fn text(&self, path: &str) -> Result<&str, StateError> {
        let value = self.require(path)?;
        value.as_str().ok_or_else(|| mismatch(path, "string", value))
    }

    /// Ids of the members of a collection, in key order.
    pub fn keys(&self, collection: &str) -> Result<Vec<String>, StateError> {
        let value = self.require(collection)?;
        value
            .as_record()
            .map(|members| members.keys().cloned().collect())
            .ok_or_else(|| StateError::NotARecord(collection.to_owned()))
    }

    /// A copy of the current members of a collection.
    pub fn members(&self, collection: &str) -> Result<Vec<(String, Value)>, StateError> {
        let value = self.require(collection)?;
        value
            .as_record()
            .map(|members| {
                members
                    .iter()
                    .map(|(id, member)| (id.clone(), member.clone()))
                    .collect()
            })
            .ok_or_else(|| StateError::NotARecord(collection.to_owned()))
    }

    /// A full copy of the document, as sent to newly joined clients.
    pub fn snapshot(&self) -> Value {
        Value::Record(self.root.clone())
    }

    /// Assigns a leaf or subtree. Returns `false` and records nothing when
    /// the stored value is already equal.
    pub fn set(&mut self, path: &str, value: impl Into<Value>) -> Result<bool, StateError> {
        let value = value.into();
        let (parent, key) = self.parent_mut(path)?;
        if parent.get(key) == Some(&value) {
            return Ok(false);
        }
        parent.insert(key.to_owned(), value.clone());
        self.changes.push(Change::set(path, value));
        Ok(true)
    }

    /// Adds (or replaces) a member of a collection.
    pub fn insert(&mut self, collection: &str, id: &str, record: Value) -> Result<(), StateError> {
        if id.is_empty() || id.contains('/') {
            return Err(StateError::InvalidPath(format!("{}/{}", collection, id)));
        }
        let members = self.record_mut(collection)?;
        members.insert(id.to_owned(), record.clone());
        self.changes
            .push(Change::add(path::join(&[collection, id]), record));
        Ok(())
    }

    /// Removes a member of a collection, returning it if it existed.
    pub fn delete(&mut self, collection: &str, id: &str) -> Result<Option<Value>, StateError> {
        let members = self.record_mut(collection)?;
        let removed = members.remove(id);
        if removed.is_some() {
            self.changes.push(Change::remove(path::join(&[collection, id])));
        }
        Ok(removed)
    }

    /// Replays a change produced by another tree without recording it.
    pub fn apply_change(&mut self, change: &Change) -> Result<(), StateError> {
        match (change.operation, &change.value) {
            (Operation::Set, Some(value)) | (Operation::Add, Some(value)) => {
                let (parent, key) = self.parent_mut(&change.path)?;
                parent.insert(key.to_owned(), value.clone());
            }
            (Operation::Remove, _) => {
                let (parent, key) = self.parent_mut(&change.path)?;
                parent.remove(key);
            }
            (_, None) => return Err(StateError::MissingPath(change.path.clone())),
        }
        Ok(())
    }

    /// Takes every change recorded since the last drain, oldest first.
    pub fn drain_changes(&mut self) -> Vec<Change> {
        std::mem::take(&mut self.changes)
    }

    pub fn pending_changes(&self) -> usize {
        self.changes.len()
    }

    fn record_mut(&mut self, path: &str) -> Result<&mut BTreeMap<String, Value>, StateError> {
        let mut current = &mut self.root;
        let mut walked = Vec::new();
        for part in path::segments(path) {
            walked.push(part);
            current = match current.get_mut(part) {
                Some(Value::Record(inner)) => inner,
                Some(_) => return Err(StateError::NotARecord(walked.join("/"))),
                None => return Err(StateError::MissingPath(walked.join("/"))),
            };
        }
        Ok(current)
    }

    fn parent_mut<'p>(
        &mut self,
        path: &'p str,
    ) -> Result<(&mut BTreeMap<String, Value>, &'p str), StateError> {
        let (parent, key) =
            path::split_last(path).ok_or_else(|| StateError::InvalidPath(path.to_owned()))?;
        let record = self.record_mut(parent)?;
        Ok((record, key))
    }
}

fn mismatch(path: &str, expected: &'static str, found: &Value) -> StateError {
    StateError::TypeMismatch {
        path: path.to_owned(),
        expected,
        found: found.kind(),
    }
}
