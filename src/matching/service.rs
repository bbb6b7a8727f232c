//! The matching service: cache-aware batch orchestration.
//!
//! Request flow:
//!
//! ```text
//! [Request] -> context key -> [In-Memory cache] -> [Store] -> [Compute]
//! ```
//!
//! The context key is a composite hash over the candidate songs, the
//! playlist profiles, the full config, and the model bundle; any change to
//! any of them routes the request past both cache tiers. Identical
//! concurrent requests are coalesced so the pipeline computes each context
//! at most once at a time.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::cache::{CacheStats, MatchCache};
use crate::config::MatchingConfig;
use crate::error::Result;
use crate::extract;
use crate::hashing::bundle::BundleResolver;
use crate::hashing::{
    candidate_set_key, match_context_key, matching_config_key, playlist_set_key,
    song_content_hash,
};
use crate::model::{
    BatchOutcome, BatchStats, Match, MatchCandidate, MatchContext, MatchSet, PlaylistProfile,
    Song,
};
use crate::rerank::Reranker;
use crate::scoring::engine::rank_matches;
use crate::scoring::{BatchOptions, ScoringEngine};
use crate::store::MatchStore;

/// Cache-aware song-to-playlist matching.
pub struct MatchingService {
    config: MatchingConfig,
    engine: ScoringEngine,
    reranker: Option<Reranker>,
    cache: MatchCache,
    store: Arc<dyn MatchStore>,
    bundle: Arc<BundleResolver>,
    /// Per-context gates for request coalescing
    in_flight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl MatchingService {
    /// Create a service without reranking.
    pub fn new(
        config: MatchingConfig,
        store: Arc<dyn MatchStore>,
        bundle: Arc<BundleResolver>,
    ) -> Self {
        Self {
            engine: ScoringEngine::new(config.weights),
            cache: MatchCache::new(config.cache),
            reranker: None,
            config,
            store,
            bundle,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Create a service with a reranking stage.
    pub fn with_reranker(
        config: MatchingConfig,
        store: Arc<dyn MatchStore>,
        bundle: Arc<BundleResolver>,
        reranker: Reranker,
    ) -> Self {
        let mut service = Self::new(config, store, bundle);
        service.reranker = Some(reranker);
        service
    }

    /// Build the composite context for a request.
    pub async fn match_context(
        &self,
        songs: &[Song],
        profiles: &[PlaylistProfile],
    ) -> Result<MatchContext> {
        let model_bundle_hash = self.bundle.bundle_hash().await?;

        let candidate_pairs: Vec<(String, String)> = songs
            .iter()
            .map(|s| (s.id.clone(), song_content_hash(s)))
            .collect();
        let playlist_pairs: Vec<(String, String)> = profiles
            .iter()
            .map(|p| (p.playlist_id.clone(), p.content_hash.clone()))
            .collect();

        Ok(MatchContext {
            candidate_set_hash: candidate_set_key(&candidate_pairs).to_string(),
            playlist_set_hash: playlist_set_key(&playlist_pairs).to_string(),
            config_hash: matching_config_key(&self.config).to_string(),
            model_bundle_hash,
        })
    }

    /// Match a batch of songs, serving cached results when valid.
    ///
    /// `account_id` scopes the persistent tier; `None` keeps results in
    /// memory only. Persistent writes are best-effort: a store failure
    /// after a successful computation logs a warning instead of failing
    /// the request.
    pub async fn get_or_compute_matches(
        &self,
        account_id: Option<&str>,
        songs: &[Song],
        profiles: &[PlaylistProfile],
        embeddings: &HashMap<String, Vec<f32>>,
    ) -> Result<BatchOutcome> {
        let context = self.match_context(songs, profiles).await?;
        let context_key = match_context_key(&context).to_string();

        // Coalesce identical concurrent requests onto one computation
        let gate = {
            let mut in_flight = self.in_flight.lock().await;
            in_flight
                .entry(context_key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        let guard = gate.lock().await;

        let outcome = self
            .serve_context(account_id, &context_key, songs, profiles, embeddings)
            .await;

        drop(guard);
        {
            let mut in_flight = self.in_flight.lock().await;
            // Last one out removes the gate
            if Arc::strong_count(&gate) <= 2 {
                in_flight.remove(&context_key);
            }
        }

        outcome
    }

    async fn serve_context(
        &self,
        account_id: Option<&str>,
        context_key: &str,
        songs: &[Song],
        profiles: &[PlaylistProfile],
        embeddings: &HashMap<String, Vec<f32>>,
    ) -> Result<BatchOutcome> {
        if let Some(set) = self.cache.get(context_key) {
            tracing::debug!(context_key, "matches served from memory cache");
            return Ok(outcome_from_cached(set, songs.len()));
        }

        if let Some(account) = account_id
            && let Some(set) = self.store.get_match_set(account, context_key).await?
        {
            tracing::debug!(context_key, account, "matches served from store");
            self.cache.insert(context_key, set.clone());
            return Ok(outcome_from_cached(set, songs.len()));
        }

        let outcome = self
            .match_batch(songs, profiles, embeddings, &mut BatchOptions::default())
            .await;

        let set = MatchSet {
            matches: outcome.matches.clone(),
            computed_at: chrono::Utc::now().timestamp(),
        };
        self.cache.insert(context_key, set.clone());

        if let Some(account) = account_id
            && let Err(e) = self.store.upsert_match_set(account, context_key, &set).await
        {
            tracing::warn!(context_key, account, error = %e, "failed to persist match set");
        }

        tracing::info!(
            context_key,
            songs = outcome.stats.total,
            matched = outcome.stats.matched,
            failed = outcome.stats.failed,
            "matches computed"
        );
        Ok(outcome)
    }

    /// Score one song against the given profiles, bypassing both cache
    /// tiers. Reranking applies when configured.
    pub async fn match_song(
        &self,
        song: &Song,
        embedding: Option<&[f32]>,
        profiles: &[PlaylistProfile],
    ) -> Vec<Match> {
        let mut matches = self.engine.match_song(song, embedding, profiles);
        self.rerank_song(song, &mut matches, profiles).await;
        matches
    }

    /// Score a batch of songs, bypassing both cache tiers.
    pub async fn match_batch(
        &self,
        songs: &[Song],
        profiles: &[PlaylistProfile],
        embeddings: &HashMap<String, Vec<f32>>,
        options: &mut BatchOptions<'_>,
    ) -> BatchOutcome {
        let mut outcome = self.engine.match_batch(songs, profiles, embeddings, options);
        if self.reranker.is_some() {
            for song in songs {
                let Some(matches) = outcome.matches.get_mut(&song.id) else {
                    continue;
                };
                self.rerank_song(song, matches, profiles).await;
            }
        }
        outcome
    }

    /// Rerank one song's matches in place.
    ///
    /// The song's embedding text is the query; each profile's summary
    /// document is a candidate. Candidates dropped by the threshold are
    /// dropped from the match list too; survivors get re-ranked.
    async fn rerank_song(
        &self,
        song: &Song,
        matches: &mut Vec<Match>,
        profiles: &[PlaylistProfile],
    ) {
        let Some(reranker) = &self.reranker else {
            return;
        };
        if matches.is_empty() {
            return;
        }

        let documents: HashMap<&str, String> = profiles
            .iter()
            .map(|p| (p.playlist_id.as_str(), extract::profile_document(p)))
            .collect();

        let candidates: Vec<MatchCandidate> = matches
            .iter()
            .map(|m| MatchCandidate {
                id: m.playlist_id.clone(),
                score: m.score,
                document: documents
                    .get(m.playlist_id.as_str())
                    .cloned()
                    .unwrap_or_default(),
                metadata: serde_json::Map::new(),
            })
            .collect();

        let query = extract::embedding_text(song);
        let outcome = reranker
            .rerank(&query, candidates, &self.config.rerank_config())
            .await;
        if !outcome.reranked {
            return;
        }

        let mut by_playlist: HashMap<String, Match> = matches
            .drain(..)
            .map(|m| (m.playlist_id.clone(), m))
            .collect();
        for candidate in outcome.candidates {
            if let Some(mut m) = by_playlist.remove(&candidate.id) {
                m.score = candidate.score;
                matches.push(m);
            }
        }
        rank_matches(matches);
    }

    /// Drop all in-memory cached match sets.
    pub fn invalidate_cache(&self) {
        self.cache.invalidate_all();
    }

    /// In-memory cache counters.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

/// Rebuild a batch outcome from a cached match set.
fn outcome_from_cached(set: MatchSet, total: usize) -> BatchOutcome {
    let mut matches = set.matches;
    let mut cached = 0;
    let mut matched = 0;
    for list in matches.values_mut() {
        if !list.is_empty() {
            matched += 1;
        }
        for m in list.iter_mut() {
            m.from_cache = true;
            cached += 1;
        }
    }
    BatchOutcome {
        matches,
        stats: BatchStats {
            total,
            matched,
            failed: 0,
            cached,
            computed: 0,
        },
        failures: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::providers::mocks::{MockEmbeddings, MockReranker};
    use crate::providers::ProviderError;
    use crate::store::MemoryStore;
    use crate::test_utils::{analyzed_song, genre_profile};

    fn service_with(
        config: MatchingConfig,
        store: Arc<MemoryStore>,
        reranker: Option<MockReranker>,
    ) -> MatchingService {
        let bundle = Arc::new(BundleResolver::new(Arc::new(MockEmbeddings::new(8)), None));
        match reranker {
            Some(mock) => MatchingService::with_reranker(
                config,
                store,
                bundle,
                Reranker::new(Arc::new(mock), Duration::from_secs(5)),
            ),
            None => MatchingService::new(config, store, bundle),
        }
    }

    fn inputs() -> (Vec<Song>, Vec<PlaylistProfile>) {
        let songs = vec![
            analyzed_song("s1", &["rock", "indie"], "euphoric", &["summer"]),
            analyzed_song("s2", &["electronic"], "dark", &["night"]),
        ];
        let profiles = vec![
            genre_profile("pl-rock", &[("rock", 5), ("indie", 2)]),
            genre_profile("pl-edm", &[("electronic", 6)]),
        ];
        (songs, profiles)
    }

    #[tokio::test]
    async fn test_genre_drives_ranking() {
        let store = Arc::new(MemoryStore::new());
        let service = service_with(MatchingConfig::default(), store, None);
        let (songs, profiles) = inputs();

        let outcome = service
            .get_or_compute_matches(None, &songs, &profiles, &HashMap::new())
            .await
            .unwrap();

        let rock = &outcome.matches["s1"];
        assert_eq!(rock[0].playlist_id, "pl-rock");
        assert!(rock[0].score > rock[1].score);

        let edm = &outcome.matches["s2"];
        assert_eq!(edm[0].playlist_id, "pl-edm");

        assert_eq!(outcome.stats.total, 2);
        assert_eq!(outcome.stats.matched, 2);
        assert_eq!(outcome.stats.cached, 0);
    }

    #[tokio::test]
    async fn test_match_song_bypasses_cache() {
        let store = Arc::new(MemoryStore::new());
        let service = service_with(MatchingConfig::default(), store, None);
        let (songs, profiles) = inputs();

        let matches = service.match_song(&songs[0], None, &profiles).await;
        assert_eq!(matches[0].playlist_id, "pl-rock");
        assert_eq!(matches[0].rank, 1);
        assert_eq!(service.cache_stats().inserts, 0);
    }

    #[tokio::test]
    async fn test_second_call_served_from_memory() {
        let store = Arc::new(MemoryStore::new());
        let service = service_with(MatchingConfig::default(), store, None);
        let (songs, profiles) = inputs();
        let embeddings = HashMap::new();

        let first = service
            .get_or_compute_matches(None, &songs, &profiles, &embeddings)
            .await
            .unwrap();
        assert!(!first.matches["s1"][0].from_cache);

        let second = service
            .get_or_compute_matches(None, &songs, &profiles, &embeddings)
            .await
            .unwrap();
        assert!(second.matches["s1"][0].from_cache);
        assert_eq!(second.stats.computed, 0);
        assert_eq!(second.stats.cached, 4);
        assert_eq!(
            second.matches["s1"][0].score,
            first.matches["s1"][0].score
        );
        assert_eq!(service.cache_stats().hits, 1);
    }

    #[tokio::test]
    async fn test_store_backs_memory_cache() {
        let store = Arc::new(MemoryStore::new());
        let service = service_with(MatchingConfig::default(), store, None);
        let (songs, profiles) = inputs();
        let embeddings = HashMap::new();

        service
            .get_or_compute_matches(Some("acct-1"), &songs, &profiles, &embeddings)
            .await
            .unwrap();

        // Memory tier gone, persistent tier still has the set
        service.invalidate_cache();
        let again = service
            .get_or_compute_matches(Some("acct-1"), &songs, &profiles, &embeddings)
            .await
            .unwrap();
        assert!(again.matches["s1"][0].from_cache);
        assert_eq!(again.stats.computed, 0);
    }

    #[tokio::test]
    async fn test_no_account_skips_persistence() {
        let store = Arc::new(MemoryStore::new());
        let service = service_with(MatchingConfig::default(), store, None);
        let (songs, profiles) = inputs();
        let embeddings = HashMap::new();

        service
            .get_or_compute_matches(None, &songs, &profiles, &embeddings)
            .await
            .unwrap();

        service.invalidate_cache();
        let again = service
            .get_or_compute_matches(Some("acct-1"), &songs, &profiles, &embeddings)
            .await
            .unwrap();
        assert!(
            !again.matches["s1"][0].from_cache,
            "nothing was persisted without an account"
        );
    }

    #[tokio::test]
    async fn test_config_change_misses_cache() {
        let store = Arc::new(MemoryStore::new());
        let (songs, profiles) = inputs();
        let embeddings = HashMap::new();

        let service_a = service_with(MatchingConfig::default(), store.clone(), None);
        service_a
            .get_or_compute_matches(Some("acct-1"), &songs, &profiles, &embeddings)
            .await
            .unwrap();

        let mut tweaked = MatchingConfig::default();
        tweaked.weights.genre = 0.5;
        let service_b = service_with(tweaked, store, None);
        let outcome = service_b
            .get_or_compute_matches(Some("acct-1"), &songs, &profiles, &embeddings)
            .await
            .unwrap();
        assert!(
            !outcome.matches["s1"][0].from_cache,
            "weight change must change the context key"
        );
    }

    #[tokio::test]
    async fn test_profile_change_misses_cache() {
        let store = Arc::new(MemoryStore::new());
        let service = service_with(MatchingConfig::default(), store, None);
        let (songs, profiles) = inputs();
        let embeddings = HashMap::new();

        service
            .get_or_compute_matches(None, &songs, &profiles, &embeddings)
            .await
            .unwrap();

        let mut changed = profiles.clone();
        changed[0].content_hash = "pp_v1_different".to_string();
        let outcome = service
            .get_or_compute_matches(None, &songs, &changed, &embeddings)
            .await
            .unwrap();
        assert!(!outcome.matches["s1"][0].from_cache);
    }

    #[tokio::test]
    async fn test_rerank_reorders_matches() {
        let store = Arc::new(MemoryStore::new());
        // Cross-encoder strongly prefers the second-ranked candidate
        let mut config = MatchingConfig::default();
        config.rerank.blend_weight = 0.9;
        config.rerank.min_score_threshold = 0.0;
        let service = service_with(
            config,
            store,
            Some(MockReranker::with_scores(vec![0.0, 1.0])),
        );

        let songs = vec![analyzed_song("s1", &["rock"], "euphoric", &[])];
        let profiles = vec![
            genre_profile("pl-rock", &[("rock", 5)]),
            genre_profile("pl-other", &[("jazz", 5)]),
        ];

        let outcome = service
            .get_or_compute_matches(None, &songs, &profiles, &HashMap::new())
            .await
            .unwrap();
        let matches = &outcome.matches["s1"];
        assert_eq!(matches[0].playlist_id, "pl-other");
        assert_eq!(matches[0].rank, 1);
        assert_eq!(matches[1].rank, 2);
    }

    #[tokio::test]
    async fn test_rerank_failure_keeps_original_order() {
        let store = Arc::new(MemoryStore::new());
        let mut config = MatchingConfig::default();
        config.rerank.min_score_threshold = 0.0;
        let service = service_with(
            config,
            store,
            Some(MockReranker::with_error(ProviderError::Network(
                "down".to_string(),
            ))),
        );

        let songs = vec![analyzed_song("s1", &["rock"], "euphoric", &[])];
        let profiles = vec![
            genre_profile("pl-rock", &[("rock", 5)]),
            genre_profile("pl-other", &[("jazz", 5)]),
        ];

        let outcome = service
            .get_or_compute_matches(None, &songs, &profiles, &HashMap::new())
            .await
            .unwrap();
        assert_eq!(outcome.matches["s1"][0].playlist_id, "pl-rock");
    }

    #[tokio::test]
    async fn test_concurrent_requests_coalesce() {
        let store = Arc::new(MemoryStore::new());
        let service = Arc::new(service_with(MatchingConfig::default(), store, None));
        let (songs, profiles) = inputs();

        let mut handles = Vec::new();
        for _ in 0..4 {
            let service = service.clone();
            let songs = songs.clone();
            let profiles = profiles.clone();
            handles.push(tokio::spawn(async move {
                service
                    .get_or_compute_matches(None, &songs, &profiles, &HashMap::new())
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            let outcome = handle.await.unwrap();
            assert_eq!(outcome.matches.len(), 2);
        }
        // At most one computation; the rest hit the gate then the cache
        let stats = service.cache_stats();
        assert_eq!(stats.inserts, 1);
        assert_eq!(stats.hits, 3);
    }
}
