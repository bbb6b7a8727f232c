//! Independent factor scores, each in [0,1].
//!
//! Every function here is total: missing data on either side scores 0.0
//! (absence of signal, not an error). Keeping factors independent lets the
//! engine blend them with arbitrary weights without cross-talk.

use std::collections::BTreeMap;

use crate::model::{AudioFeatures, PlaylistProfile};

/// Clamp into [0,1]; NaN collapses to 0.
pub fn clamp01(x: f64) -> f64 {
    if x.is_nan() { 0.0 } else { x.clamp(0.0, 1.0) }
}

/// Cosine similarity between two vectors, clamped to [0,1].
///
/// Empty vectors or mismatched dimensions score 0 (no signal). Negative
/// cosine also clamps to 0 - "opposite" embeddings are simply not a match.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        dot += (*x as f64) * (*y as f64);
        norm_a += (*x as f64) * (*x as f64);
        norm_b += (*y as f64) * (*y as f64);
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    clamp01(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

/// Weighted overlap between a song's genres and a profile's genre
/// distribution: the fraction of the distribution's total weight covered
/// by genres the song carries.
pub fn genre_overlap(song_genres: &[String], distribution: &BTreeMap<String, u32>) -> f64 {
    if song_genres.is_empty() || distribution.is_empty() {
        return 0.0;
    }
    let total: u32 = distribution.values().sum();
    if total == 0 {
        return 0.0;
    }
    let song_set: std::collections::BTreeSet<String> =
        song_genres.iter().map(|g| g.to_lowercase()).collect();
    let matched: u32 = distribution
        .iter()
        .filter(|(genre, _)| song_set.contains(*genre))
        .map(|(_, count)| *count)
        .sum();
    clamp01(matched as f64 / total as f64)
}

/// Normalize one audio feature to [0,1] by its natural range.
///
/// Most features already live in [0,1]; tempo and loudness get scaled.
fn normalize_feature(name: &str, value: f64) -> f64 {
    match name {
        "tempo" => clamp01(value / 250.0),
        "loudness" => clamp01((value + 60.0) / 60.0),
        _ => clamp01(value),
    }
}

/// Inverse normalized distance between a song's audio features and a
/// profile's audio centroid, over the fields present on both sides.
pub fn audio_similarity(features: &AudioFeatures, centroid: &BTreeMap<String, f64>) -> f64 {
    distance_similarity(features, centroid, &crate::model::AUDIO_FEATURE_NAMES)
}

/// Flow/cohesion: how well the song's motion-defining features sit inside
/// the playlist's center. A narrower view than [`audio_similarity`],
/// restricted to the fields that govern sequencing feel.
pub fn flow_cohesion(features: &AudioFeatures, centroid: &BTreeMap<String, f64>) -> f64 {
    distance_similarity(features, centroid, &["energy", "valence", "tempo", "danceability"])
}

fn distance_similarity(
    features: &AudioFeatures,
    centroid: &BTreeMap<String, f64>,
    fields: &[&str],
) -> f64 {
    let mut total_diff = 0.0;
    let mut count = 0usize;
    for name in fields {
        if let Some(song_value) = features.get(name)
            && song_value.is_finite()
            && let Some(centroid_value) = centroid.get(*name)
        {
            let diff =
                (normalize_feature(name, song_value) - normalize_feature(name, *centroid_value)).abs();
            total_diff += diff;
            count += 1;
        }
    }
    if count == 0 {
        return 0.0;
    }
    clamp01(1.0 - total_diff / count as f64)
}

/// Overlap between a song's themes and the profile's semantic vocabulary
/// (theme and emotion distributions combined).
pub fn semantic_overlap(themes: &[String], profile: &PlaylistProfile) -> f64 {
    if themes.is_empty() {
        return 0.0;
    }
    let mut vocabulary: BTreeMap<&str, u32> = BTreeMap::new();
    for (theme, count) in &profile.theme_distribution {
        *vocabulary.entry(theme.as_str()).or_insert(0) += count;
    }
    for (mood, count) in &profile.emotion_distribution {
        *vocabulary.entry(mood.as_str()).or_insert(0) += count;
    }
    if vocabulary.is_empty() {
        return 0.0;
    }

    let theme_set: std::collections::BTreeSet<String> =
        themes.iter().map(|t| t.to_lowercase()).collect();
    let total: u32 = vocabulary.values().sum();
    let matched: u32 = vocabulary
        .iter()
        .filter(|(term, _)| theme_set.contains(**term))
        .map(|(_, count)| *count)
        .sum();
    clamp01(matched as f64 / total as f64)
}

/// Alignment between a song's listening-context vector and the profile's
/// aggregated context distribution (sparse cosine over shared keys).
pub fn context_fit(
    song_contexts: &BTreeMap<String, f64>,
    profile_contexts: &BTreeMap<String, f64>,
) -> f64 {
    if song_contexts.is_empty() || profile_contexts.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0;
    let mut norm_song = 0.0;
    let mut norm_profile = 0.0;
    for (context, song_score) in song_contexts {
        norm_song += song_score * song_score;
        if let Some(profile_score) = profile_contexts.get(context) {
            dot += song_score * profile_score;
        }
    }
    for profile_score in profile_contexts.values() {
        norm_profile += profile_score * profile_score;
    }
    if norm_song == 0.0 || norm_profile == 0.0 {
        return 0.0;
    }
    clamp01(dot / (norm_song.sqrt() * norm_profile.sqrt()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::empty_profile;

    #[test]
    fn test_cosine_identical() {
        let v = vec![0.5, 0.5, 0.1];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_cosine_orthogonal() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn test_cosine_negative_clamps() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_cosine_mismatched_dims() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn test_genre_overlap_full() {
        let mut dist = BTreeMap::new();
        dist.insert("rock".to_string(), 10);
        let genres = vec!["Rock".to_string()];
        assert!((genre_overlap(&genres, &dist) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_genre_overlap_partial() {
        let mut dist = BTreeMap::new();
        dist.insert("rock".to_string(), 3);
        dist.insert("jazz".to_string(), 1);
        let genres = vec!["rock".to_string()];
        assert!((genre_overlap(&genres, &dist) - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_genre_overlap_empty_sides() {
        let dist = BTreeMap::new();
        assert_eq!(genre_overlap(&["rock".to_string()], &dist), 0.0);
        let mut dist = BTreeMap::new();
        dist.insert("rock".to_string(), 1);
        assert_eq!(genre_overlap(&[], &dist), 0.0);
    }

    #[test]
    fn test_audio_similarity_identical() {
        let features = AudioFeatures {
            energy: Some(0.8),
            valence: Some(0.3),
            ..Default::default()
        };
        let mut centroid = BTreeMap::new();
        centroid.insert("energy".to_string(), 0.8);
        centroid.insert("valence".to_string(), 0.3);
        assert!((audio_similarity(&features, &centroid) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_audio_similarity_no_common_fields() {
        let features = AudioFeatures {
            energy: Some(0.8),
            ..Default::default()
        };
        let mut centroid = BTreeMap::new();
        centroid.insert("tempo".to_string(), 120.0);
        assert_eq!(audio_similarity(&features, &centroid), 0.0);
    }

    #[test]
    fn test_audio_similarity_tempo_normalized() {
        let features = AudioFeatures {
            tempo: Some(125.0),
            ..Default::default()
        };
        let mut centroid = BTreeMap::new();
        centroid.insert("tempo".to_string(), 150.0);
        // |125-150|/250 = 0.1 -> similarity 0.9
        assert!((audio_similarity(&features, &centroid) - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_semantic_overlap_against_profile() {
        let mut profile = empty_profile("pl");
        profile.theme_distribution.insert("summer".to_string(), 2);
        profile.emotion_distribution.insert("euphoric".to_string(), 2);
        let themes = vec!["summer".to_string()];
        assert!((semantic_overlap(&themes, &profile) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_context_fit_aligned() {
        let mut song = BTreeMap::new();
        song.insert("workout".to_string(), 0.9);
        let mut profile = BTreeMap::new();
        profile.insert("workout".to_string(), 0.8);
        assert!(context_fit(&song, &profile) > 0.99);
    }

    #[test]
    fn test_context_fit_disjoint() {
        let mut song = BTreeMap::new();
        song.insert("workout".to_string(), 0.9);
        let mut profile = BTreeMap::new();
        profile.insert("study".to_string(), 0.8);
        assert_eq!(context_fit(&song, &profile), 0.0);
    }

    #[test]
    fn test_flow_uses_motion_fields_only() {
        let features = AudioFeatures {
            energy: Some(0.5),
            acousticness: Some(0.0),
            ..Default::default()
        };
        let mut centroid = BTreeMap::new();
        centroid.insert("energy".to_string(), 0.5);
        centroid.insert("acousticness".to_string(), 1.0);
        // acousticness would tank audio similarity but not flow
        assert!((flow_cohesion(&features, &centroid) - 1.0).abs() < 1e-9);
        assert!(audio_similarity(&features, &centroid) < 0.6);
    }

    #[test]
    fn test_clamp01() {
        assert_eq!(clamp01(-0.5), 0.0);
        assert_eq!(clamp01(1.5), 1.0);
        assert_eq!(clamp01(f64::NAN), 0.0);
        assert_eq!(clamp01(0.25), 0.25);
    }
}
