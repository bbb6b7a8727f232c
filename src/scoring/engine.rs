//! Weighted blending, ranking, and batch scoring.

use std::collections::{HashMap, HashSet};

use crate::config::FactorWeights;
use crate::model::{
    BatchOutcome, BatchStats, Match, MatchFactors, MatchFailure, PlaylistProfile, Progress, Song,
};

use super::factors;

/// Options for a batch scoring run.
#[derive(Default)]
pub struct BatchOptions<'a> {
    /// Invoked once per song, in input order, after that song completes
    pub on_progress: Option<&'a mut (dyn FnMut(Progress) + Send)>,
}

/// Scores songs against playlist profiles with configured factor weights.
///
/// Pure computation: no I/O, no caching. Results for a song are always
/// sorted descending by score with ties kept in profile insertion order.
pub struct ScoringEngine {
    weights: FactorWeights,
}

impl ScoringEngine {
    /// Create an engine with the given weights. Weights are used as-is;
    /// callers wanting a [0,1] final scale should pass normalized weights.
    pub fn new(weights: FactorWeights) -> Self {
        Self { weights }
    }

    /// Compute all factor scores for one song/profile pair.
    pub fn score_factors(
        &self,
        song: &Song,
        embedding: Option<&[f32]>,
        profile: &PlaylistProfile,
    ) -> MatchFactors {
        let vector = match (embedding, profile.embedding.as_deref()) {
            (Some(song_vec), Some(profile_vec)) => {
                factors::cosine_similarity(song_vec, profile_vec)
            }
            _ => 0.0,
        };

        let genre = song
            .genres
            .as_deref()
            .map(|genres| factors::genre_overlap(genres, &profile.genre_distribution))
            .unwrap_or(0.0);

        let (audio, flow) = song
            .audio_features
            .as_ref()
            .map(|features| {
                (
                    factors::audio_similarity(features, &profile.audio_centroid),
                    factors::flow_cohesion(features, &profile.audio_centroid),
                )
            })
            .unwrap_or((0.0, 0.0));

        let (semantic, context) = song
            .analysis
            .as_ref()
            .map(|analysis| {
                (
                    factors::semantic_overlap(&analysis.themes, profile),
                    factors::context_fit(
                        &analysis.listening_contexts,
                        &profile.context_distribution,
                    ),
                )
            })
            .unwrap_or((0.0, 0.0));

        MatchFactors {
            vector,
            genre,
            audio,
            semantic,
            context,
            flow,
        }
    }

    /// Weighted blend of factors, clamped to [0,1].
    fn blend(&self, factors: &MatchFactors) -> f64 {
        let w = &self.weights;
        factors::clamp01(
            w.vector * factors.vector
                + w.genre * factors.genre
                + w.audio * factors.audio
                + w.semantic * factors.semantic
                + w.context * factors.context
                + w.flow * factors.flow,
        )
    }

    /// Match one song against a set of profiles.
    ///
    /// An empty profile list yields an empty result; a song missing every
    /// feature still scores (all factors 0), never errors.
    pub fn match_song(
        &self,
        song: &Song,
        embedding: Option<&[f32]>,
        profiles: &[PlaylistProfile],
    ) -> Vec<Match> {
        let mut matches: Vec<Match> = profiles
            .iter()
            .map(|profile| {
                let factors = self.score_factors(song, embedding, profile);
                Match {
                    song_id: song.id.clone(),
                    playlist_id: profile.playlist_id.clone(),
                    score: self.blend(&factors),
                    rank: 0,
                    confidence: 0.0,
                    factors,
                    from_cache: false,
                }
            })
            .collect();

        rank_matches(&mut matches);
        matches
    }

    /// Match every song against every profile.
    ///
    /// Results are keyed by song ID. The progress callback fires exactly
    /// once per song, in input order, with `done` counting up from 1.
    /// Failed songs (empty or duplicate IDs) are recorded with a reason
    /// and skipped; the batch always runs to completion.
    pub fn match_batch(
        &self,
        songs: &[Song],
        profiles: &[PlaylistProfile],
        embeddings: &HashMap<String, Vec<f32>>,
        options: &mut BatchOptions<'_>,
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome {
            stats: BatchStats {
                total: songs.len(),
                ..Default::default()
            },
            ..Default::default()
        };
        let mut seen: HashSet<&str> = HashSet::new();

        for (index, song) in songs.iter().enumerate() {
            let failure = if song.id.is_empty() {
                Some("empty song id".to_string())
            } else if !seen.insert(song.id.as_str()) {
                Some("duplicate song id in batch".to_string())
            } else {
                None
            };

            if let Some(reason) = failure {
                tracing::warn!(song = %song.id, %reason, "song skipped in batch");
                outcome.stats.failed += 1;
                outcome.failures.push(MatchFailure {
                    song_id: song.id.clone(),
                    reason,
                });
            } else {
                let embedding = embeddings.get(&song.id).map(|v| v.as_slice());
                let matches = self.match_song(song, embedding, profiles);
                outcome.stats.computed += matches.len();
                if !matches.is_empty() {
                    outcome.stats.matched += 1;
                }
                outcome.matches.insert(song.id.clone(), matches);
            }

            if let Some(on_progress) = options.on_progress.as_mut() {
                on_progress(Progress {
                    done: index + 1,
                    total: songs.len(),
                });
            }
        }

        outcome
    }
}

/// Sort descending by score (stable, so ties keep insertion order), then
/// assign 1-based ranks and margin-based confidence.
///
/// Confidence blends absolute score with the gap to the next-best
/// candidate: a decisive winner approaches 1, a photo-finish stays near
/// half its score. The last (or only) candidate has no margin.
pub fn rank_matches(matches: &mut [Match]) {
    matches.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let scores: Vec<f64> = matches.iter().map(|m| m.score).collect();
    for (i, entry) in matches.iter_mut().enumerate() {
        entry.rank = i + 1;
        let margin = match scores.get(i + 1) {
            Some(next) => entry.score - next,
            None => 0.0,
        };
        entry.confidence = factors::clamp01(0.5 * entry.score + 0.5 * margin);
    }
}
