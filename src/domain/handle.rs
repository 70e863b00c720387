//! Named series handles.
//!
//! A handle names one column of the table by `(group, field)`. Identity is
//! the pair alone: two independently built handles with the same pair refer
//! to the same column, whatever their `first_value`.

use crate::domain::value::Value;
use std::fmt;
use std::hash::{Hash, Hasher};

pub const TIME_GROUP: &str = "index";
pub const TIME_FIELD: &str = "date";

/// The `(group, field)` pair identifying a column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColumnKey {
    pub group: String,
    pub field: String,
}

impl ColumnKey {
    pub fn new(group: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            field: field.into(),
        }
    }

    /// Flat column label, `group.field`.
    pub fn name(&self) -> String {
        format!("{}.{}", self.group, self.field)
    }

    pub fn is_time(&self) -> bool {
        self.group == TIME_GROUP && self.field == TIME_FIELD
    }
}

impl fmt::Display for ColumnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.group, self.field)
    }
}

#[derive(Debug, Clone)]
pub struct SeriesHandle {
    key: ColumnKey,
    first_value: Option<Value>,
}

impl SeriesHandle {
    pub fn new(group: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            key: ColumnKey::new(group, field),
            first_value: None,
        }
    }

    /// Handle with a value at the virtual step before step 0.
    pub fn with_first_value(
        group: impl Into<String>,
        field: impl Into<String>,
        first_value: impl Into<Value>,
    ) -> Self {
        Self {
            key: ColumnKey::new(group, field),
            first_value: Some(first_value.into()),
        }
    }

    /// The shared timestamp index.
    pub fn time() -> Self {
        Self::new(TIME_GROUP, TIME_FIELD)
    }

    pub fn key(&self) -> &ColumnKey {
        &self.key
    }

    pub fn group(&self) -> &str {
        &self.key.group
    }

    pub fn field(&self) -> &str {
        &self.key.field
    }

    pub fn first_value(&self) -> Option<Value> {
        self.first_value
    }

    pub fn name(&self) -> String {
        self.key.name()
    }
}

impl PartialEq for SeriesHandle {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for SeriesHandle {}

impl Hash for SeriesHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Display for SeriesHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.key.fmt(f)
    }
}
