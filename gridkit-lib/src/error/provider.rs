//! Data provider error types

/// Errors reported by a data provider or child loader.
///
/// These never cross the query engine boundary as a failure: the engine turns
/// them into an empty result carrying the error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    /// The provider could not produce a result.
    #[error("Query failed: {message}")]
    Failed { message: String },

    /// The provider is not reachable right now.
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    /// The provider rejected the descriptor.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

impl ProviderError {
    /// Creates a generic failure.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }

    /// Returns `true` if a retry could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}
