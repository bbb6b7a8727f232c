//! Model-bundle versioning.
//!
//! A [`ModelBundle`] describes everything the matching pipeline's output
//! depends on besides the input data: the embedding model, the reranker,
//! the algorithm versions, and the enrichment settings. Its hash feeds
//! every downstream cache key, so upgrading any of these transparently
//! invalidates stale profiles and match results.
//!
//! [`BundleResolver`] is an explicitly constructed service object (init
//! once, inject everywhere) rather than module-level state, so tests can
//! swap providers freely.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::OnceCell;

use super::keys::{CacheKey, KeyKind};
use crate::providers::{EmbeddingProvider, ProviderError};

/// Format version of the bundle struct itself; bump when fields change.
pub const BUNDLE_FORMAT_VERSION: u32 = 1;

/// Versions of the pure algorithms participating in matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AlgorithmVersions {
    /// Text extraction (embedding input blocks)
    pub extractor: u32,
    /// Analysis schema normalization
    pub schema: u32,
    /// Profile aggregation
    pub profile: u32,
    /// Scoring/ranking
    pub matching: u32,
}

impl Default for AlgorithmVersions {
    fn default() -> Self {
        Self {
            extractor: 1,
            schema: 1,
            profile: 1,
            matching: 1,
        }
    }
}

/// Enrichment settings that alter what the pipeline sees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrichmentSettings {
    /// Where genres come from (e.g. "spotify", "lastfm")
    pub genre_source: String,
    /// Whether emotion analysis participates in profiling
    pub emotion_enabled: bool,
}

impl Default for EnrichmentSettings {
    fn default() -> Self {
        Self {
            genre_source: "spotify".to_string(),
            emotion_enabled: true,
        }
    }
}

/// Full description of the active model/algorithm stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelBundle {
    pub embedding_model: String,
    pub embedding_dims: usize,
    pub embedding_provider: String,
    pub reranker_model: Option<String>,
    pub algorithm_versions: AlgorithmVersions,
    pub enrichment: EnrichmentSettings,
    pub bundle_format_version: u32,
}

impl ModelBundle {
    /// The bundle's cache key (`mb_...`). Unversioned on purpose: the hash
    /// itself is the version.
    pub fn key(&self) -> CacheKey {
        let value = serde_json::to_value(self).unwrap_or(serde_json::Value::Null);
        CacheKey::new(KeyKind::ModelBundle, None, super::hash_value(&value))
    }
}

/// Resolves and caches the active model bundle.
///
/// The embedding provider is queried for its metadata exactly once per
/// resolver lifetime; repeated calls return the cached bundle. A provider
/// failure propagates as an error rather than defaulting - a wrong model
/// assumption would silently corrupt every downstream cache key.
pub struct BundleResolver {
    embeddings: Arc<dyn EmbeddingProvider>,
    reranker_model: Option<String>,
    algorithm_versions: AlgorithmVersions,
    enrichment: EnrichmentSettings,
    cached: OnceCell<ModelBundle>,
}

impl BundleResolver {
    /// Create a resolver with the default algorithm versions and
    /// enrichment settings.
    pub fn new(embeddings: Arc<dyn EmbeddingProvider>, reranker_model: Option<String>) -> Self {
        Self::with_settings(
            embeddings,
            reranker_model,
            AlgorithmVersions::default(),
            EnrichmentSettings::default(),
        )
    }

    /// Create a resolver with explicit versions/settings.
    pub fn with_settings(
        embeddings: Arc<dyn EmbeddingProvider>,
        reranker_model: Option<String>,
        algorithm_versions: AlgorithmVersions,
        enrichment: EnrichmentSettings,
    ) -> Self {
        Self {
            embeddings,
            reranker_model,
            algorithm_versions,
            enrichment,
            cached: OnceCell::new(),
        }
    }

    /// The active bundle, resolving provider metadata on first call.
    pub async fn bundle(&self) -> Result<&ModelBundle, ProviderError> {
        self.cached
            .get_or_try_init(|| async {
                let meta = self.embeddings.metadata().await?;
                tracing::debug!(
                    model = %meta.model,
                    dims = meta.dims,
                    provider = %meta.provider,
                    "resolved model bundle"
                );
                Ok(ModelBundle {
                    embedding_model: meta.model,
                    embedding_dims: meta.dims,
                    embedding_provider: meta.provider,
                    reranker_model: self.reranker_model.clone(),
                    algorithm_versions: self.algorithm_versions,
                    enrichment: self.enrichment.clone(),
                    bundle_format_version: BUNDLE_FORMAT_VERSION,
                })
            })
            .await
    }

    /// The active bundle's rendered hash key.
    pub async fn bundle_hash(&self) -> Result<String, ProviderError> {
        Ok(self.bundle().await?.key().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::mocks::MockEmbeddings;

    fn bundle_fixture() -> ModelBundle {
        ModelBundle {
            embedding_model: "embed-v2".to_string(),
            embedding_dims: 512,
            embedding_provider: "acme".to_string(),
            reranker_model: Some("rerank-v1".to_string()),
            algorithm_versions: AlgorithmVersions::default(),
            enrichment: EnrichmentSettings::default(),
            bundle_format_version: BUNDLE_FORMAT_VERSION,
        }
    }

    #[test]
    fn test_bundle_key_prefix() {
        let key = bundle_fixture().key();
        assert_eq!(key.kind, KeyKind::ModelBundle);
        assert!(key.to_string().starts_with("mb_"));
    }

    #[test]
    fn test_any_field_change_changes_hash() {
        let base = bundle_fixture();

        let mut model = base.clone();
        model.embedding_model = "embed-v3".to_string();
        assert_ne!(base.key(), model.key());

        let mut dims = base.clone();
        dims.embedding_dims = 1024;
        assert_ne!(base.key(), dims.key());

        let mut reranker = base.clone();
        reranker.reranker_model = None;
        assert_ne!(base.key(), reranker.key());

        let mut algo = base.clone();
        algo.algorithm_versions.profile = 2;
        assert_ne!(base.key(), algo.key());

        let mut enrich = base.clone();
        enrich.enrichment.emotion_enabled = false;
        assert_ne!(base.key(), enrich.key());
    }

    #[tokio::test]
    async fn test_resolver_caches_bundle() {
        let resolver = BundleResolver::new(Arc::new(MockEmbeddings::new(16)), None);
        let first = resolver.bundle_hash().await.unwrap();
        let second = resolver.bundle_hash().await.unwrap();
        assert_eq!(first, second);
        assert!(first.starts_with("mb_"));
    }

    #[tokio::test]
    async fn test_resolver_propagates_provider_failure() {
        let resolver = BundleResolver::new(
            Arc::new(MockEmbeddings::with_error(ProviderError::Network(
                "metadata endpoint down".to_string(),
            ))),
            None,
        );
        let result = resolver.bundle_hash().await;
        assert!(matches!(result, Err(ProviderError::Network(_))));
    }
}
