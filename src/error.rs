//! Application-wide error types.
//!
//! This module provides a unified error hierarchy for the crate.
//! Subsystems use specific error types via `thiserror` (for example
//! [`crate::providers::ProviderError`] and [`crate::store::StoreError`]);
//! the pipeline surfaces aggregate them into [`Error`].
//!
//! Degradation policy in one place: provider failures during enrichment
//! (embedding fetch, reranking) degrade with a warning, while failures
//! that would corrupt cache keys (model-bundle resolution) or lose data
//! (profile persistence) propagate as errors.

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level application error.
///
/// Aggregates errors from all subsystems for unified handling.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// External provider (embeddings, reranker) error
    #[error("Provider error: {0}")]
    Provider(#[from] crate::providers::ProviderError),

    /// Persistence layer error
    #[error("Store error: {0}")]
    Store(#[from] crate::store::StoreError),

    /// Text extraction error
    #[error("Extraction error: {0}")]
    Extract(#[from] crate::extract::ExtractError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Cache key parsing error
    #[error("Cache key error: {0}")]
    Key(#[from] crate::hashing::KeyParseError),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Add context to an error.
    pub fn context(self, ctx: impl Into<String>) -> Self {
        Self::WithContext {
            context: ctx.into(),
            source: Box::new(self),
        }
    }
}

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn with_context(self, ctx: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(ctx))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, crate::providers::ProviderError> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Provider(e).context(ctx))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, crate::store::StoreError> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Store(e).context(ctx))
    }
}
