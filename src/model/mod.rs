//! Core data models for the matching pipeline.
//!
//! These types are OUR types - external collaborators (Spotify sync, LLM
//! analysis, the persistence layer) get converted into these at the boundary
//! and nothing downstream ever probes raw provider JSON again.
//!
//! The central entities:
//! - [`Song`] - immutable snapshot of a track as seen by the matcher
//! - [`PlaylistProfile`] - aggregated numerical/semantic profile of a playlist
//! - [`Match`] - one scored song-to-playlist pairing
//! - [`MatchContext`] - the composite cache key for a matching request

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Versioned algorithm tag stamped on every profile this crate produces.
pub const PROFILE_KIND: &str = "content_v1";

/// A song as seen by the matching pipeline.
///
/// Immutable snapshot; owned by the data layer, passed in by reference.
/// Missing enrichment (genres, audio features, analysis) is a valid state,
/// never an error - factors that depend on missing data score zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Song {
    /// Internal song ID (stable across syncs)
    pub id: String,
    /// Spotify track ID
    pub spotify_id: String,
    /// Track name
    pub name: String,
    /// Artist names, in credit order
    pub artists: Vec<String>,
    /// Genres from enrichment (None = not yet enriched)
    pub genres: Option<Vec<String>>,
    /// Audio features from enrichment (None = not available)
    pub audio_features: Option<AudioFeatures>,
    /// LLM analysis, normalized at ingestion (None = not analyzed)
    pub analysis: Option<SongAnalysis>,
}

/// The nine audio features used for centroids and similarity.
///
/// Each field is independently optional: a provider may return a partial
/// record, and aggregation filters missing/NaN values per field rather than
/// defaulting to zero (which would drag centroids toward silence).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioFeatures {
    pub energy: Option<f64>,
    pub valence: Option<f64>,
    pub danceability: Option<f64>,
    pub acousticness: Option<f64>,
    pub instrumentalness: Option<f64>,
    pub speechiness: Option<f64>,
    pub liveness: Option<f64>,
    /// Beats per minute
    pub tempo: Option<f64>,
    /// Average loudness in dB (typically -60..0)
    pub loudness: Option<f64>,
}

/// Canonical field names, in the order they appear in the struct.
pub const AUDIO_FEATURE_NAMES: [&str; 9] = [
    "energy",
    "valence",
    "danceability",
    "acousticness",
    "instrumentalness",
    "speechiness",
    "liveness",
    "tempo",
    "loudness",
];

impl AudioFeatures {
    /// All fields paired with their canonical names.
    pub fn fields(&self) -> [(&'static str, Option<f64>); 9] {
        [
            ("energy", self.energy),
            ("valence", self.valence),
            ("danceability", self.danceability),
            ("acousticness", self.acousticness),
            ("instrumentalness", self.instrumentalness),
            ("speechiness", self.speechiness),
            ("liveness", self.liveness),
            ("tempo", self.tempo),
            ("loudness", self.loudness),
        ]
    }

    /// Look up a field by its canonical name.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.fields()
            .into_iter()
            .find(|(n, _)| *n == name)
            .and_then(|(_, v)| v)
    }
}

/// Normalized LLM analysis of a song.
///
/// Historically the analysis JSON shipped the dominant mood at several
/// nested paths as the schema evolved. [`SongAnalysis::from_raw`] performs
/// that probing exactly once at ingestion; everything downstream consumes
/// this canonical shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SongAnalysis {
    /// Dominant mood label (e.g. "melancholic", "euphoric")
    pub dominant_mood: Option<String>,
    /// Thematic tags (e.g. "heartbreak", "summer")
    pub themes: Vec<String>,
    /// Listening-context scores (e.g. "workout" -> 0.8), each in [0,1]
    pub listening_contexts: BTreeMap<String, f64>,
}

impl SongAnalysis {
    /// Normalize a raw analysis JSON blob into the canonical shape.
    ///
    /// Dominant mood is probed at the known locations, in order:
    /// `dominant_mood`, `emotional.dominant_mood`,
    /// `emotional_profile.dominant_mood`, `analysis.emotional.dominant_mood`.
    /// None of the fallbacks can be dropped yet - stored analyses from every
    /// schema generation are still in circulation.
    ///
    /// Returns `None` if the value is not a JSON object.
    pub fn from_raw(raw: &Value) -> Option<Self> {
        let obj = raw.as_object()?;

        let dominant_mood = [
            raw.pointer("/dominant_mood"),
            raw.pointer("/emotional/dominant_mood"),
            raw.pointer("/emotional_profile/dominant_mood"),
            raw.pointer("/analysis/emotional/dominant_mood"),
        ]
        .into_iter()
        .flatten()
        .find_map(|v| v.as_str())
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty());

        let themes = obj
            .get("themes")
            .or_else(|| raw.pointer("/analysis/themes"))
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|t| t.as_str())
                    .map(|t| t.trim().to_lowercase())
                    .filter(|t| !t.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let listening_contexts = obj
            .get("listening_contexts")
            .or_else(|| obj.get("listeningContexts"))
            .and_then(|v| v.as_object())
            .map(|map| {
                map.iter()
                    .filter_map(|(k, v)| v.as_f64().map(|s| (k.to_lowercase(), s)))
                    .filter(|(_, s)| s.is_finite())
                    .collect()
            })
            .unwrap_or_default();

        Some(Self {
            dominant_mood,
            themes,
            listening_contexts,
        })
    }
}

/// Aggregated profile of a playlist's content.
///
/// Recomputed wholesale whenever membership or the model bundle changes;
/// never mutated in place. A stored profile is valid for reuse iff both
/// `content_hash` and `model_bundle_hash` equal the values recomputed from
/// current inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistProfile {
    /// Playlist this profile describes
    pub playlist_id: String,
    /// Versioned algorithm tag ([`PROFILE_KIND`])
    pub kind: String,
    /// Per-dimension mean of member song embeddings (None = no vectors)
    pub embedding: Option<Vec<f32>>,
    /// Per-field mean of member audio features; fields absent on every
    /// member are omitted entirely
    pub audio_centroid: BTreeMap<String, f64>,
    /// Genre occurrence counts across all members (duplicates included)
    pub genre_distribution: BTreeMap<String, u32>,
    /// Dominant-mood counts across members that have one
    pub emotion_distribution: BTreeMap<String, u32>,
    /// Theme occurrence counts across members with analysis
    pub theme_distribution: BTreeMap<String, u32>,
    /// Mean listening-context scores across members that report each context
    pub context_distribution: BTreeMap<String, f64>,
    /// Member song IDs, in playlist order (defines membership)
    pub song_ids: Vec<String>,
    /// Number of member songs
    pub song_count: usize,
    /// Content hash over sorted song IDs + rounded audio centroid
    pub content_hash: String,
    /// Hash of the model bundle active when this profile was computed
    pub model_bundle_hash: String,
    /// Whether this instance was served from the store without recompute
    #[serde(skip)]
    pub from_cache: bool,
}

/// Per-factor component scores for one match, each clamped to [0,1].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchFactors {
    pub vector: f64,
    pub genre: f64,
    pub audio: f64,
    pub semantic: f64,
    pub context: f64,
    pub flow: f64,
}

/// One scored song-to-playlist pairing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
    pub song_id: String,
    pub playlist_id: String,
    /// Weighted blend of factors, clamped to [0,1]
    pub score: f64,
    /// 1-based rank within the song's result list (descending score)
    pub rank: usize,
    /// Margin-based decisiveness measure in [0,1]
    pub confidence: f64,
    /// Component scores that produced `score`
    pub factors: MatchFactors,
    /// Whether this match was served from cache
    #[serde(default)]
    pub from_cache: bool,
}

/// A candidate entering the reranking stage.
#[derive(Debug, Clone)]
pub struct MatchCandidate {
    /// Candidate identifier (the playlist ID)
    pub id: String,
    /// Current score in [0,1] (blended in place by reranking)
    pub score: f64,
    /// Text document handed to the cross-encoder
    pub document: String,
    /// Opaque metadata bag; reranking adds `original_score`/`rerank_score`
    pub metadata: serde_json::Map<String, Value>,
}

/// The composite cache key for a matching request.
///
/// All component hashes are built from sorted inputs, so two requests with
/// the same songs, profiles, config, and model bundle are cache-equivalent
/// regardless of supplied order or object identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchContext {
    /// Hash over sorted (song ID, song content hash) pairs
    pub candidate_set_hash: String,
    /// Hash over sorted (playlist ID, profile content hash) pairs
    pub playlist_set_hash: String,
    /// Hash over the full matching config (weights and thresholds included)
    pub config_hash: String,
    /// Active model bundle hash
    pub model_bundle_hash: String,
}

/// A full per-song match result set, as cached and persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchSet {
    /// Ranked matches keyed by song ID
    pub matches: HashMap<String, Vec<Match>>,
    /// Unix timestamp (seconds) of computation
    pub computed_at: i64,
}

/// Why one song in a batch failed to match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchFailure {
    pub song_id: String,
    pub reason: String,
}

/// Counters reported alongside batch results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    /// Songs submitted
    pub total: usize,
    /// Songs that produced at least one match
    pub matched: usize,
    /// Songs recorded as failed (batch continues past them)
    pub failed: usize,
    /// Matches served from cache
    pub cached: usize,
    /// Matches freshly computed
    pub computed: usize,
}

/// Result of a batch matching operation.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    /// Ranked matches keyed by song ID
    pub matches: HashMap<String, Vec<Match>>,
    /// Aggregate counters
    pub stats: BatchStats,
    /// Per-song failure reasons (empty on full success)
    pub failures: Vec<MatchFailure>,
}

/// Progress report for batch operations; `done` counts from 1 to `total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub done: usize,
    pub total: usize,
}
