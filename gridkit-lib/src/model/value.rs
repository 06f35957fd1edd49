//! Value enum for dynamic field values

use std::cmp::Ordering;
use std::fmt;

use chrono::DateTime;
use chrono::NaiveDate;
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::prelude::ToPrimitive;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

use super::DataKind;

/// A dynamic value that can hold any cell type.
///
/// Rows expose their fields as `Value`s so that filtering, searching and
/// sorting only depend on the row capability contract, never on a concrete
/// row type.
///
/// # Type Mapping
///
/// | Column kind | Rust Variant |
/// |-------------|--------------|
/// | (empty) | `Null` |
/// | Boolean | `Bool` |
/// | Integer | `Int`, `Long` |
/// | Decimal | `Float`, `Decimal` |
/// | Text, Enumeration | `String` |
/// | Guid | `Guid` |
/// | DateTime | `DateTime` |
///
/// Deserialization is untagged, so JSON strings always come back as
/// `String`. Use [`Value::coerce`] to convert them to the column's kind.
///
/// # Example
///
/// ```
/// use gridkit_lib::model::Value;
///
/// let name = Value::from("Zhang San");
/// let count = Value::from(70i64);
/// let active = Value::from(true);
/// let empty = Value::Null;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    /// Null/empty value.
    #[default]
    Null,
    /// Boolean value.
    Bool(bool),
    /// 32-bit integer.
    Int(i32),
    /// 64-bit integer.
    Long(i64),
    /// 64-bit floating point.
    Float(f64),
    /// String value.
    String(String),
    /// Arbitrary precision decimal.
    Decimal(Decimal),
    /// GUID/UUID value.
    Guid(Uuid),
    /// Date and time in UTC.
    DateTime(DateTime<Utc>),
}

impl Value {
    /// Returns `true` if this is a null value.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns `true` for the numeric variants.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Value::Int(_) | Value::Long(_) | Value::Float(_) | Value::Decimal(_)
        )
    }

    /// Returns the type name of this value.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Long(_) => "long",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Decimal(_) => "decimal",
            Value::Guid(_) => "guid",
            Value::DateTime(_) => "datetime",
        }
    }

    /// Returns the string slice if this is a `String`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Int(n) => Some(Decimal::from(*n)),
            Value::Long(n) => Some(Decimal::from(*n)),
            Value::Decimal(d) => Some(*d),
            Value::Float(f) => Decimal::from_f64(*f),
            _ => None,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(f64::from(*n)),
            Value::Long(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            Value::Decimal(d) => d.to_f64(),
            _ => None,
        }
    }

    /// Compares two values.
    ///
    /// Numeric variants compare by numeric value regardless of width, text
    /// compares case-insensitively (ties broken ordinally) and `Null` sorts
    /// before everything else. Values of unrelated kinds are not comparable.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            (Value::Null, _) => Some(Ordering::Less),
            (_, Value::Null) => Some(Ordering::Greater),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::String(a), Value::String(b)) => Some(
                a.to_lowercase()
                    .cmp(&b.to_lowercase())
                    .then_with(|| a.cmp(b)),
            ),
            (Value::Guid(a), Value::Guid(b)) => Some(a.cmp(b)),
            (Value::DateTime(a), Value::DateTime(b)) => Some(a.cmp(b)),
            (Value::Float(_), _) | (_, Value::Float(_)) => {
                self.as_f64()?.partial_cmp(&other.as_f64()?)
            }
            _ => Some(self.as_decimal()?.cmp(&other.as_decimal()?)),
        }
    }

    /// Equality used by filters: numeric by value, text case-insensitive.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::String(a), Value::String(b)) => a.to_lowercase() == b.to_lowercase(),
            _ => self.compare(other) == Some(Ordering::Equal),
        }
    }

    /// Converts this value to the representation expected by a column kind.
    ///
    /// Strings are parsed (`"70"` becomes `Long(70)` for an integer column).
    /// Returns `None` when the value cannot represent the kind. `Null` is
    /// accepted by every kind.
    pub fn coerce(&self, kind: DataKind) -> Option<Value> {
        if self.is_null() {
            return Some(Value::Null);
        }
        match kind {
            DataKind::Text | DataKind::Enumeration => match self {
                Value::String(_) => Some(self.clone()),
                other => Some(Value::String(other.to_string())),
            },
            DataKind::Integer => match self {
                Value::Int(_) | Value::Long(_) => Some(self.clone()),
                Value::String(s) => s.trim().parse::<i64>().ok().map(Value::Long),
                _ => None,
            },
            DataKind::Decimal => match self {
                Value::String(s) => s.trim().parse::<Decimal>().ok().map(Value::Decimal),
                v if v.is_numeric() => Some(v.clone()),
                _ => None,
            },
            DataKind::Boolean => match self {
                Value::Bool(_) => Some(self.clone()),
                Value::String(s) => s.trim().to_lowercase().parse::<bool>().ok().map(Value::Bool),
                _ => None,
            },
            DataKind::Guid => match self {
                Value::Guid(_) => Some(self.clone()),
                Value::String(s) => Uuid::parse_str(s.trim()).ok().map(Value::Guid),
                _ => None,
            },
            DataKind::DateTime => match self {
                Value::DateTime(_) => Some(self.clone()),
                Value::String(s) => parse_datetime(s.trim()).map(Value::DateTime),
                _ => None,
            },
        }
    }

    /// Converts a JSON value without going through the untagged
    /// deserializer.
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Long(i),
                None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
            },
            serde_json::Value::String(s) => Value::String(s.clone()),
            other => Value::String(other.to_string()),
        }
    }
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Long(n) => write!(f, "{n}"),
            Value::Float(n) => write!(f, "{n}"),
            Value::String(s) => f.write_str(s),
            Value::Decimal(d) => write!(f, "{d}"),
            Value::Guid(g) => write!(f, "{g}"),
            Value::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

// =============================================================================
// From implementations
// =============================================================================

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Decimal(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Value::Guid(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::DateTime(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_compare_across_widths() {
        assert_eq!(Value::Int(70).compare(&Value::Long(70)), Some(Ordering::Equal));
        assert_eq!(Value::Long(69).compare(&Value::Int(70)), Some(Ordering::Less));
        assert_eq!(
            Value::Float(70.5).compare(&Value::Long(70)),
            Some(Ordering::Greater)
        );
        assert_eq!(
            Value::Decimal(Decimal::new(1005, 1)).compare(&Value::Int(100)),
            Some(Ordering::Greater)
        );
    }

    #[test]
    fn test_null_sorts_first() {
        assert_eq!(Value::Null.compare(&Value::Int(0)), Some(Ordering::Less));
        assert_eq!(Value::from("a").compare(&Value::Null), Some(Ordering::Greater));
    }

    #[test]
    fn test_text_compare_ignores_case() {
        assert_eq!(
            Value::from("apple").compare(&Value::from("Banana")),
            Some(Ordering::Less)
        );
        assert!(Value::from("ZhangSan").loose_eq(&Value::from("zhangsan")));
    }

    #[test]
    fn test_unrelated_kinds_not_comparable() {
        assert_eq!(Value::from("1").compare(&Value::Int(1)), None);
        assert_eq!(Value::Bool(true).compare(&Value::Int(1)), None);
    }

    #[test]
    fn test_coerce_strings() {
        assert_eq!(Value::from(" 70 ").coerce(DataKind::Integer), Some(Value::Long(70)));
        assert_eq!(Value::from("abc").coerce(DataKind::Integer), None);
        assert_eq!(Value::from("TRUE").coerce(DataKind::Boolean), Some(Value::Bool(true)));
        assert_eq!(Value::Long(3).coerce(DataKind::Text), Some(Value::from("3")));
        assert!(matches!(
            Value::from("2024-05-01").coerce(DataKind::DateTime),
            Some(Value::DateTime(_))
        ));
        assert_eq!(Value::Null.coerce(DataKind::Guid), Some(Value::Null));
    }

    #[test]
    fn test_from_json() {
        let json = serde_json::json!({"n": 3, "f": 1.5, "s": "x", "b": false});
        assert_eq!(Value::from_json(&json["n"]), Value::Long(3));
        assert_eq!(Value::from_json(&json["f"]), Value::Float(1.5));
        assert_eq!(Value::from_json(&json["s"]), Value::from("x"));
        assert_eq!(Value::from_json(&json["b"]), Value::Bool(false));
        assert_eq!(Value::from_json(&json["missing"]), Value::Null);
    }
}
