//! Field reference resolution
//!
//! A field reference is either a dotted document path (`user.profile.age`,
//! `addresses.0.city`) or one of the physical columns `_key`, `_created`,
//! `_updated` and `_data`. A bare `data` also addresses the whole document.
//! Any other `_`-prefixed name is an ordinary document field.

use std::borrow::Cow;
use std::fmt;

use serde_json::Value;

use crate::errors::{OakError, OakResult};

/// Row metadata columns addressable without traversing the document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Key,
    Created,
    Updated,
    Data,
}

impl Column {
    pub fn from_reference(reference: &str) -> Option<Self> {
        match reference {
            "_key" => Some(Column::Key),
            "_created" => Some(Column::Created),
            "_updated" => Some(Column::Updated),
            "_data" | "data" => Some(Column::Data),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Column::Key => "_key",
            Column::Created => "_created",
            Column::Updated => "_updated",
            Column::Data => "_data",
        }
    }
}

/// A parsed field reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldRef {
    Document(Vec<String>),
    Physical(Column),
}

impl FieldRef {
    /// Parses a reference. Empty references and empty path segments are
    /// malformed.
    pub fn parse(reference: &str) -> OakResult<Self> {
        if let Some(column) = Column::from_reference(reference) {
            return Ok(FieldRef::Physical(column));
        }
        if reference.is_empty() {
            return Err(OakError::malformed(reference, "empty field reference"));
        }

        let segments: Vec<String> = reference.split('.').map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return Err(OakError::malformed(reference, "empty path segment"));
        }
        Ok(FieldRef::Document(segments))
    }

    pub fn is_physical(&self) -> bool {
        matches!(self, FieldRef::Physical(_))
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldRef::Document(segments) => write!(f, "{}", segments.join(".")),
            FieldRef::Physical(column) => write!(f, "{}", column.name()),
        }
    }
}

/// A primary row as seen by predicates: key, document and rendered timestamps
#[derive(Debug, Clone, Copy)]
pub struct RowView<'a> {
    pub key: &'a str,
    pub value: &'a Value,
    pub created: &'a str,
    pub updated: &'a str,
}

/// Walks `segments` from `root`. Integer segments index into sequences.
pub fn lookup<'v>(root: &'v Value, segments: &[String]) -> Option<&'v Value> {
    segments.iter().try_fold(root, |node, segment| match node {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Resolves a reference against a row. `None` means the field is absent.
pub fn resolve<'a>(field: &FieldRef, row: &RowView<'a>) -> Option<Cow<'a, Value>> {
    match field {
        FieldRef::Document(segments) => lookup(row.value, segments).map(Cow::Borrowed),
        FieldRef::Physical(Column::Key) => Some(Cow::Owned(Value::String(row.key.to_string()))),
        FieldRef::Physical(Column::Created) => {
            Some(Cow::Owned(Value::String(row.created.to_string())))
        }
        FieldRef::Physical(Column::Updated) => {
            Some(Cow::Owned(Value::String(row.updated.to_string())))
        }
        FieldRef::Physical(Column::Data) => Some(Cow::Borrowed(row.value)),
    }
}
