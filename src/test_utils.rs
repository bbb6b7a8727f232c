//! Test utilities and fixtures for playlist-pilot tests.
//!
//! This module provides common song and profile factories to reduce
//! boilerplate in tests.
//!
//! # Example
//!
//! ```ignore
//! use playlist_pilot::test_utils::{analyzed_song, genre_profile};
//!
//! #[test]
//! fn test_something() {
//!     let song = analyzed_song("s1", &["rock"], "euphoric", &["summer"]);
//!     let profile = genre_profile("pl-rock", &[("rock", 5)]);
//!     // ... test logic
//! }
//! ```

use std::collections::BTreeMap;

use crate::model::{AudioFeatures, PlaylistProfile, Song, SongAnalysis, PROFILE_KIND};

/// A song with no enrichment at all: no genres, features, or analysis.
pub fn bare_song(id: &str) -> Song {
    Song {
        id: id.to_string(),
        spotify_id: format!("sp-{id}"),
        name: format!("Track {id}"),
        artists: vec!["Test Artist".to_string()],
        genres: None,
        audio_features: None,
        analysis: None,
    }
}

/// A song with genres and LLM analysis (mood + themes).
pub fn analyzed_song(id: &str, genres: &[&str], mood: &str, themes: &[&str]) -> Song {
    Song {
        genres: Some(genres.iter().map(|g| g.to_string()).collect()),
        analysis: Some(SongAnalysis {
            dominant_mood: Some(mood.to_string()),
            themes: themes.iter().map(|t| t.to_string()).collect(),
            listening_contexts: BTreeMap::new(),
        }),
        ..bare_song(id)
    }
}

/// A song with the three most commonly asserted audio features set.
pub fn featured_song(id: &str, energy: f64, valence: f64, tempo: f64) -> Song {
    Song {
        audio_features: Some(AudioFeatures {
            energy: Some(energy),
            valence: Some(valence),
            tempo: Some(tempo),
            ..Default::default()
        }),
        ..bare_song(id)
    }
}

/// A profile with every distribution empty.
///
/// Customize using struct update syntax or direct field mutation:
///
/// ```ignore
/// let mut profile = empty_profile("pl-1");
/// profile.theme_distribution.insert("summer".to_string(), 2);
/// ```
pub fn empty_profile(playlist_id: &str) -> PlaylistProfile {
    PlaylistProfile {
        playlist_id: playlist_id.to_string(),
        kind: PROFILE_KIND.to_string(),
        embedding: None,
        audio_centroid: BTreeMap::new(),
        genre_distribution: BTreeMap::new(),
        emotion_distribution: BTreeMap::new(),
        theme_distribution: BTreeMap::new(),
        context_distribution: BTreeMap::new(),
        song_ids: Vec::new(),
        song_count: 0,
        content_hash: format!("pp_v1_{}", crate::hashing::short_hash(playlist_id)),
        model_bundle_hash: "mb_fixture".to_string(),
        from_cache: false,
    }
}

/// A profile whose genre distribution is the given (genre, count) pairs.
pub fn genre_profile(playlist_id: &str, genres: &[(&str, u32)]) -> PlaylistProfile {
    PlaylistProfile {
        genre_distribution: genres
            .iter()
            .map(|(g, count)| (g.to_string(), *count))
            .collect(),
        ..empty_profile(playlist_id)
    }
}
