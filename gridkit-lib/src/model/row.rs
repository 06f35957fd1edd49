//! Row capability contract

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

use super::Value;
use crate::error::FieldError;

/// Stable identity of a row across re-fetches.
///
/// Selection, expansion and edit state are all keyed by `RowId`, never by
/// position, so they survive paging, re-sorting and render-mode switches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowId(String);

impl RowId {
    /// Creates an id from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RowId {
    fn from(v: &str) -> Self {
        Self(v.to_string())
    }
}

impl From<String> for RowId {
    fn from(v: String) -> Self {
        Self(v)
    }
}

impl From<i64> for RowId {
    fn from(v: i64) -> Self {
        Self(v.to_string())
    }
}

impl From<Uuid> for RowId {
    fn from(v: Uuid) -> Self {
        Self(v.to_string())
    }
}

/// Read access to a row's identity and fields.
///
/// This is the object-safe half of the row contract; cell render overrides
/// receive rows as `&dyn RowData`.
pub trait RowData {
    /// Stable identity of this row.
    fn id(&self) -> RowId;

    /// Value of a field by name. Unknown fields read as [`Value::Null`].
    fn field(&self, name: &str) -> Value;
}

/// Capability contract for items shown in a grid.
///
/// Anything with a stable identity and field access by name can be a row.
/// Column, filter and sort logic depend only on this trait.
///
/// # Example
///
/// ```
/// use gridkit_lib::model::{Row, RowData, RowId, Value};
///
/// #[derive(Clone)]
/// struct Foo {
///     id: i64,
///     name: String,
///     count: i64,
/// }
///
/// impl RowData for Foo {
///     fn id(&self) -> RowId { self.id.into() }
///     fn field(&self, name: &str) -> Value {
///         match name {
///             "Name" => self.name.clone().into(),
///             "Count" => self.count.into(),
///             _ => Value::Null,
///         }
///     }
/// }
///
/// impl Row for Foo {}
/// ```
pub trait Row: RowData + Clone + Send + Sync + 'static {
    /// Writes a field. Rows that cannot be edited keep the default, which
    /// reports the field as read-only.
    fn set_field(&mut self, name: &str, value: Value) -> Result<(), FieldError> {
        let _ = value;
        Err(FieldError::read_only(name))
    }
}

/// A row that can sit in a tree.
pub trait TreeRow: Row {
    /// Whether the row may have children (they can still load as empty).
    fn has_children(&self) -> bool;

    /// Children already carried by the row, if any.
    ///
    /// `None` means the children must be fetched on first expansion.
    fn children(&self) -> Option<Vec<Self>> {
        None
    }
}
