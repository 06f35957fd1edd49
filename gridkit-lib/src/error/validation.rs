//! Validation error types

use std::fmt;

/// Error information for a specific field that failed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldValidationError {
    /// The field that failed validation.
    pub field: String,
    /// Human-readable validation error message.
    pub message: String,
    /// Optional error code.
    pub code: Option<String>,
}

impl FieldValidationError {
    /// Creates a new field validation error.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            code: None,
        }
    }

    /// Creates a new field validation error with an error code.
    pub fn with_code(field: impl Into<String>, message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            code: Some(code.into()),
        }
    }
}

impl fmt::Display for FieldValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// A failed commit: field-level messages plus an optional row-level message.
#[derive(Debug, Clone, Default, PartialEq, thiserror::Error)]
#[error("Validation failed ({} field errors)", fields.len())]
pub struct ValidationErrors {
    /// Per-field messages, in the order they were reported.
    pub fields: Vec<FieldValidationError>,
    /// Message not tied to a field (e.g. persistence failed).
    pub message: Option<String>,
}

impl ValidationErrors {
    /// Creates an empty error set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a row-level failure without field messages.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            fields: Vec::new(),
            message: Some(message.into()),
        }
    }

    /// Adds a field error (builder pattern).
    pub fn with_field(mut self, field: impl Into<String>, message: impl Into<String>) -> Self {
        self.fields.push(FieldValidationError::new(field, message));
        self
    }

    /// Adds a field error.
    pub fn push(&mut self, error: FieldValidationError) {
        self.fields.push(error);
    }

    /// Returns `true` if nothing was reported.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.message.is_none()
    }

    /// Returns the messages reported for one field.
    pub fn for_field<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.fields
            .iter()
            .filter(move |e| e.field == field)
            .map(|e| e.message.as_str())
    }
}
