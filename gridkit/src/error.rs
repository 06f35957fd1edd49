//! Error types for grid controllers.

use gridkit_lib::error::{FieldError, FilterError, ProviderError, ValidationErrors};
use gridkit_lib::model::RowId;
use thiserror::Error;

/// Configuration rejected at build time.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No data provider was registered.
    #[error("a data provider is required")]
    MissingProvider,

    /// Two modes that cannot be combined.
    #[error("{0} cannot be combined with {1}")]
    Incompatible(&'static str, &'static str),

    /// A size that must be positive was zero.
    #[error("{0} must be greater than zero")]
    ZeroSize(&'static str),

    /// The configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors from the edit session.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EditError {
    /// A modal edit is already open.
    #[error("another row is already being edited")]
    Busy,

    /// No edit session is open.
    #[error("no row is being edited")]
    NotEditing,

    /// The session is waiting for a save to finish.
    #[error("the row is being saved")]
    Saving,

    /// The operation requires the other edit mode.
    #[error("operation not available in {0} edit mode")]
    WrongMode(&'static str),

    /// The row rejected a field write.
    #[error(transparent)]
    Field(#[from] FieldError),

    /// Validation or the save was rejected; the session stays open.
    #[error("{0}")]
    Validation(ValidationErrors),
}

/// Errors surfaced by [`Grid`](crate::grid::Grid) operations.
#[derive(Debug, Error)]
pub enum GridError {
    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Edit(#[from] EditError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// A column name did not match any registered column.
    #[error("unknown column '{0}'")]
    UnknownColumn(String),

    /// No current row has this identity.
    #[error("unknown row '{0}'")]
    UnknownRow(RowId),

    /// A render-mode switch conflicts with the configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The operation needs a mode the grid was not configured with.
    #[error("{0} is not enabled")]
    NotEnabled(&'static str),

    /// A listener panicked while the grid state was locked.
    #[error("grid state is unavailable")]
    StateUnavailable,
}
