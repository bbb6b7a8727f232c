//! Trait definitions for the embedding and reranking providers.
//!
//! The actual LLM/embedding API clients live outside this crate; the core
//! only sees these capability traits. Production code injects real client
//! implementations, while tests substitute the mocks below.
//!
//! # Example
//!
//! ```ignore
//! use playlist_pilot::providers::EmbeddingProvider;
//!
//! async fn embed_all<T: EmbeddingProvider>(provider: &T, texts: &[String]) {
//!     let vectors = provider.embed_batch(texts).await?;
//! }
//! ```

use std::time::Duration;

use async_trait::async_trait;

/// An embedding vector plus the model that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    /// The vector, `dims` entries long
    pub vector: Vec<f32>,
    /// Model identifier (e.g. "text-embedding-3-small")
    pub model: String,
    /// Dimensionality of `vector`
    pub dims: usize,
}

/// Static description of the active embedding model.
///
/// Feeds the model-bundle hash, so every field here participates in cache
/// invalidation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddingMetadata {
    /// Model identifier
    pub model: String,
    /// Vector dimensionality
    pub dims: usize,
    /// Provider name (e.g. "openai", "voyage")
    pub provider: String,
}

/// One cross-encoder relevance score, referencing the input document index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RerankScore {
    /// Index into the submitted document list
    pub index: usize,
    /// Relevance score; providers are expected to return values in [0,1]
    pub score: f64,
}

/// Errors surfaced by embedding/reranking providers.
///
/// Rate-limit errors carry the provider's retry-after hint so callers can
/// back off; this crate does not retry on its own.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    #[error("rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("provider API error: {0}")]
    Api(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("provider call timed out after {0:?}")]
    Timeout(Duration),

    #[error("embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("failed to parse provider response: {0}")]
    Parse(String),
}

/// Trait for embedding text into vectors.
///
/// Implement this trait to create mock implementations for testing.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Describe the active model. Used for model-bundle versioning; a
    /// failure here propagates rather than defaulting, since a wrong model
    /// assumption would corrupt every downstream cache key.
    async fn metadata(&self) -> Result<EmbeddingMetadata, ProviderError>;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Embedding, ProviderError>;

    /// Embed a batch of texts; results are positionally aligned with input.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>, ProviderError>;
}

/// Trait for cross-encoder reranking of query/document pairs.
#[async_trait]
pub trait RerankProvider: Send + Sync {
    /// Score each document against the query. Scores reference documents by
    /// index and may be returned in any order.
    async fn rerank(
        &self,
        query: &str,
        documents: &[String],
    ) -> Result<Vec<RerankScore>, ProviderError>;
}
