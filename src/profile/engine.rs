//! Profile computation with content-addressed reuse.
//!
//! A stored profile is reused iff its content hash (membership + rounded
//! audio centroid) AND its model-bundle hash both match the values
//! recomputed from current inputs. No TTL is involved - profiles are
//! purely content-addressed, so they stay valid for months if nothing
//! changes and die instantly when anything does.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::extract;
use crate::hashing::bundle::BundleResolver;
use crate::hashing::profile_content_key;
use crate::model::{PlaylistProfile, Song, PROFILE_KIND};
use crate::providers::{EmbeddingProvider, ProviderError};
use crate::store::MatchStore;

use super::stats;

/// Options for one profile computation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProfileOptions {
    /// Skip the stored-profile validity check and always recompute
    pub skip_cache: bool,
    /// Compute only; do not upsert the result
    pub skip_persist: bool,
}

/// Computes and persists playlist profiles.
pub struct ProfileEngine {
    store: Arc<dyn MatchStore>,
    embeddings: Arc<dyn EmbeddingProvider>,
    bundle: Arc<BundleResolver>,
    provider_timeout: Duration,
}

impl ProfileEngine {
    /// Create an engine over the given collaborators.
    pub fn new(
        store: Arc<dyn MatchStore>,
        embeddings: Arc<dyn EmbeddingProvider>,
        bundle: Arc<BundleResolver>,
        provider_timeout: Duration,
    ) -> Self {
        Self {
            store,
            embeddings,
            bundle,
            provider_timeout,
        }
    }

    /// Compute (or reuse) the profile for a playlist.
    ///
    /// `known_embeddings` carries already-available song vectors keyed by
    /// song ID; songs not present there are embedded via the provider, and
    /// songs that still end up without a vector are skipped - missing data
    /// degrades the profile, it never fails it. Only the model-bundle
    /// resolution and the persistence layer can error here.
    pub async fn compute_profile(
        &self,
        playlist_id: &str,
        songs: &[Song],
        known_embeddings: &HashMap<String, Vec<f32>>,
        options: ProfileOptions,
    ) -> Result<PlaylistProfile> {
        // Step 1: resolve the model bundle (fails loudly on provider error)
        let bundle_hash = self.bundle.bundle_hash().await?;

        // Step 2: current content hash (cheap, pure)
        let audio_centroid =
            stats::audio_centroid(songs.iter().filter_map(|s| s.audio_features.as_ref()));
        let song_ids: Vec<String> = songs.iter().map(|s| s.id.clone()).collect();
        let content_hash = profile_content_key(&song_ids, &audio_centroid).to_string();

        // Step 3: reuse the stored profile when both hashes still match
        if !options.skip_cache
            && let Some(mut stored) = self.store.get_profile(playlist_id).await?
            && stored.content_hash == content_hash
            && stored.model_bundle_hash == bundle_hash
        {
            tracing::debug!(playlist_id, "profile valid, served from store");
            stored.from_cache = true;
            return Ok(stored);
        }

        // Step 4: recompute from scratch
        let vectors = self.resolve_embeddings(songs, known_embeddings).await;
        let embedding = match stats::centroid(&vectors) {
            v if v.is_empty() => None,
            v => Some(v),
        };

        let profile = PlaylistProfile {
            playlist_id: playlist_id.to_string(),
            kind: PROFILE_KIND.to_string(),
            embedding,
            audio_centroid,
            genre_distribution: stats::genre_distribution(songs),
            emotion_distribution: stats::emotion_distribution(songs),
            theme_distribution: stats::theme_distribution(songs),
            context_distribution: stats::context_distribution(songs),
            song_count: song_ids.len(),
            song_ids,
            content_hash,
            model_bundle_hash: bundle_hash,
            from_cache: false,
        };

        // Step 5: persist wholesale, keyed by playlist ID
        if !options.skip_persist {
            self.store.upsert_profile(&profile).await?;
            tracing::info!(
                playlist_id,
                songs = profile.song_count,
                "profile recomputed and stored"
            );
        }

        Ok(profile)
    }

    /// Gather one embedding per song where possible.
    ///
    /// Prefers vectors from `known`; the rest are embedded in one batch.
    /// Provider failures are logged and degrade to "no vector" rather than
    /// failing the profile.
    async fn resolve_embeddings(
        &self,
        songs: &[Song],
        known: &HashMap<String, Vec<f32>>,
    ) -> Vec<Vec<f32>> {
        let mut vectors = Vec::with_capacity(songs.len());
        let mut pending_texts = Vec::new();

        for song in songs {
            if let Some(vector) = known.get(&song.id) {
                vectors.push(vector.clone());
            } else {
                pending_texts.push(extract::embedding_text(song));
            }
        }

        if pending_texts.is_empty() {
            return vectors;
        }

        match self.embed_batch_bounded(&pending_texts).await {
            Ok(embedded) => {
                for embedding in embedded {
                    vectors.push(embedding.vector);
                }
            }
            Err(e) => {
                tracing::warn!(
                    missing = pending_texts.len(),
                    error = %e,
                    "embedding fetch failed, profiling without those songs"
                );
            }
        }
        vectors
    }

    async fn embed_batch_bounded(
        &self,
        texts: &[String],
    ) -> std::result::Result<Vec<crate::providers::Embedding>, ProviderError> {
        tokio::time::timeout(self.provider_timeout, self.embeddings.embed_batch(texts))
            .await
            .map_err(|_| ProviderError::Timeout(self.provider_timeout))?
    }
}
