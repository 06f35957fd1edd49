//! Dynamic row record

use std::collections::HashMap;

use chrono::DateTime;
use chrono::Utc;
use rust_decimal::Decimal;

use super::Row;
use super::RowData;
use super::RowId;
use super::TreeRow;
use super::Value;
use crate::error::FieldError;

/// A dynamic row with an identity and a field map.
///
/// `Record` is the ready-made [`Row`] implementation for data whose shape is
/// only known at runtime (JSON files, generic providers).
///
/// # Example
///
/// ```
/// use gridkit_lib::model::Record;
///
/// let record = Record::new("1")
///     .set("Name", "Zhang San")
///     .set("Count", 70i64);
///
/// assert_eq!(record.get_string("Name").unwrap(), Some("Zhang San"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    id: RowId,
    fields: HashMap<String, Value>,
    has_children: bool,
    children: Option<Vec<Record>>,
}

impl Record {
    /// Creates a new empty record.
    pub fn new(id: impl Into<RowId>) -> Self {
        Self {
            id: id.into(),
            fields: HashMap::new(),
            has_children: false,
            children: None,
        }
    }

    // =========================================================================
    // Raw field access
    // =========================================================================

    /// Returns a reference to the field value, if it exists.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Returns `true` if the record contains the given field.
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Returns a reference to all fields.
    pub fn fields(&self) -> &HashMap<String, Value> {
        &self.fields
    }

    // =========================================================================
    // Setters
    // =========================================================================

    /// Sets a field value (builder pattern).
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Inserts a field value.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    /// Removes a field and returns its value.
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.remove(field)
    }

    /// Marks the record as a tree node whose children load lazily.
    pub fn with_lazy_children(mut self) -> Self {
        self.has_children = true;
        self
    }

    /// Attaches already materialized children.
    pub fn with_children(mut self, children: Vec<Record>) -> Self {
        self.has_children = true;
        self.children = Some(children);
        self
    }

    // =========================================================================
    // Typed getters
    //
    // Return Err if field is missing or wrong type.
    // Return Ok(None) only if the field exists and is Value::Null.
    // =========================================================================

    /// Gets a string field value.
    pub fn get_string(&self, field: &str) -> Result<Option<&str>, FieldError> {
        match self.fields.get(field) {
            None => Err(FieldError::missing(field)),
            Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(FieldError::type_mismatch(field, "string", other.type_name())),
        }
    }

    /// Gets a boolean field value.
    pub fn get_bool(&self, field: &str) -> Result<Option<bool>, FieldError> {
        match self.fields.get(field) {
            None => Err(FieldError::missing(field)),
            Some(Value::Null) => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(FieldError::type_mismatch(field, "bool", other.type_name())),
        }
    }

    /// Gets an i64 field value.
    pub fn get_long(&self, field: &str) -> Result<Option<i64>, FieldError> {
        match self.fields.get(field) {
            None => Err(FieldError::missing(field)),
            Some(Value::Null) => Ok(None),
            Some(Value::Long(n)) => Ok(Some(*n)),
            Some(Value::Int(n)) => Ok(Some(i64::from(*n))), // Allow widening
            Some(other) => Err(FieldError::type_mismatch(field, "long", other.type_name())),
        }
    }

    /// Gets a Decimal field value.
    pub fn get_decimal(&self, field: &str) -> Result<Option<Decimal>, FieldError> {
        match self.fields.get(field) {
            None => Err(FieldError::missing(field)),
            Some(Value::Null) => Ok(None),
            Some(Value::Decimal(d)) => Ok(Some(*d)),
            Some(other) => Err(FieldError::type_mismatch(field, "decimal", other.type_name())),
        }
    }

    /// Gets a DateTime field value.
    pub fn get_datetime(&self, field: &str) -> Result<Option<DateTime<Utc>>, FieldError> {
        match self.fields.get(field) {
            None => Err(FieldError::missing(field)),
            Some(Value::Null) => Ok(None),
            Some(Value::DateTime(dt)) => Ok(Some(*dt)),
            Some(other) => Err(FieldError::type_mismatch(field, "datetime", other.type_name())),
        }
    }

    /// Builds a record from a JSON object, taking the identity from `id_field`.
    ///
    /// Nested `children` arrays become materialized children.
    pub fn from_json(json: &serde_json::Value, id_field: &str) -> Option<Record> {
        let object = json.as_object()?;
        let id = match object.get(id_field)? {
            serde_json::Value::String(s) => RowId::new(s.clone()),
            other => RowId::new(other.to_string()),
        };
        let mut record = Record::new(id);
        for (key, value) in object {
            if key == "children" {
                if let Some(items) = value.as_array() {
                    let children = items
                        .iter()
                        .filter_map(|child| Record::from_json(child, id_field))
                        .collect();
                    record = record.with_children(children);
                }
                continue;
            }
            if key == "hasChildren" {
                record.has_children = value.as_bool().unwrap_or(false);
                continue;
            }
            record.insert(key.clone(), Value::from_json(value));
        }
        Some(record)
    }
}

impl RowData for Record {
    fn id(&self) -> RowId {
        self.id.clone()
    }

    fn field(&self, name: &str) -> Value {
        self.fields.get(name).cloned().unwrap_or_default()
    }
}

impl Row for Record {
    fn set_field(&mut self, name: &str, value: Value) -> Result<(), FieldError> {
        self.fields.insert(name.to_string(), value);
        Ok(())
    }
}

impl TreeRow for Record {
    fn has_children(&self) -> bool {
        self.has_children
    }

    fn children(&self) -> Option<Vec<Self>> {
        self.children.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_getters() {
        let record = Record::new("1")
            .set("Name", "Foo")
            .set("Count", 3i32)
            .set("Missing", Value::Null);
        assert_eq!(record.get_string("Name").unwrap(), Some("Foo"));
        assert_eq!(record.get_long("Count").unwrap(), Some(3));
        assert_eq!(record.get_string("Missing").unwrap(), None);
        assert!(matches!(
            record.get_string("Nope"),
            Err(FieldError::Missing { .. })
        ));
        assert!(matches!(
            record.get_bool("Name"),
            Err(FieldError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_field_reads_null_for_unknown() {
        let record = Record::new("1");
        assert_eq!(record.field("Anything"), Value::Null);
    }

    #[test]
    fn test_from_json_with_children() {
        let json = serde_json::json!({
            "Id": 1,
            "Name": "root",
            "children": [{"Id": 2, "Name": "child"}]
        });
        let record = Record::from_json(&json, "Id").unwrap();
        assert_eq!(record.id(), RowId::from("1"));
        assert!(record.has_children());
        let children = record.children().unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].field("Name"), Value::from("child"));
        assert!(!record.contains("children"));
    }
}
