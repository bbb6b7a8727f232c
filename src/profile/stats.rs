//! Deterministic aggregation over playlist members.
//!
//! All functions here are pure and total: empty or partially-missing input
//! degrades to empty/partial output, never an error. Distributions use
//! `BTreeMap` so iteration (and anything hashed from it) is ordered.

use std::collections::BTreeMap;

use crate::model::{AudioFeatures, Song};

/// Arithmetic mean of vectors, per dimension.
///
/// Vectors whose length differs from the first are skipped (a dimension
/// mismatch upstream should not corrupt the centroid). Empty input yields
/// an empty vector.
pub fn centroid(vectors: &[Vec<f32>]) -> Vec<f32> {
    let Some(first) = vectors.first() else {
        return Vec::new();
    };
    let dims = first.len();

    let mut sums = vec![0.0f64; dims];
    let mut count = 0usize;
    for vector in vectors {
        if vector.len() != dims {
            continue;
        }
        for (sum, v) in sums.iter_mut().zip(vector) {
            *sum += *v as f64;
        }
        count += 1;
    }
    if count == 0 {
        return Vec::new();
    }
    sums.into_iter().map(|s| (s / count as f64) as f32).collect()
}

/// Per-field mean of audio features.
///
/// Each field averages independently over the songs that carry a finite
/// value for it - one song's NaN energy does not poison the others. Fields
/// absent (or non-finite) on every song are omitted from the result map
/// entirely, never defaulted to zero.
pub fn audio_centroid<'a, I>(features: I) -> BTreeMap<String, f64>
where
    I: IntoIterator<Item = &'a AudioFeatures>,
{
    let mut sums: BTreeMap<&'static str, (f64, usize)> = BTreeMap::new();
    for feature_set in features {
        for (name, value) in feature_set.fields() {
            if let Some(v) = value
                && v.is_finite()
            {
                let entry = sums.entry(name).or_insert((0.0, 0));
                entry.0 += v;
                entry.1 += 1;
            }
        }
    }
    sums.into_iter()
        .map(|(name, (sum, count))| (name.to_string(), sum / count as f64))
        .collect()
}

/// Genre occurrence counts across all songs.
///
/// Every occurrence increments, including a genre repeated on one song;
/// genres are case-folded so "Rock" and "rock" aggregate together.
pub fn genre_distribution(songs: &[Song]) -> BTreeMap<String, u32> {
    let mut counts = BTreeMap::new();
    for song in songs {
        if let Some(genres) = &song.genres {
            for genre in genres {
                *counts.entry(genre.to_lowercase()).or_insert(0) += 1;
            }
        }
    }
    counts
}

/// Dominant-mood counts; songs without a mood are skipped.
pub fn emotion_distribution(songs: &[Song]) -> BTreeMap<String, u32> {
    let mut counts = BTreeMap::new();
    for song in songs {
        if let Some(analysis) = &song.analysis
            && let Some(mood) = &analysis.dominant_mood
        {
            *counts.entry(mood.clone()).or_insert(0) += 1;
        }
    }
    counts
}

/// Theme occurrence counts across songs with analysis.
pub fn theme_distribution(songs: &[Song]) -> BTreeMap<String, u32> {
    let mut counts = BTreeMap::new();
    for song in songs {
        if let Some(analysis) = &song.analysis {
            for theme in &analysis.themes {
                *counts.entry(theme.clone()).or_insert(0) += 1;
            }
        }
    }
    counts
}

/// Mean listening-context score, per context, over the songs reporting it.
pub fn context_distribution(songs: &[Song]) -> BTreeMap<String, f64> {
    let mut sums: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    for song in songs {
        if let Some(analysis) = &song.analysis {
            for (context, score) in &analysis.listening_contexts {
                if score.is_finite() {
                    let entry = sums.entry(context.clone()).or_insert((0.0, 0));
                    entry.0 += score;
                    entry.1 += 1;
                }
            }
        }
    }
    sums.into_iter()
        .map(|(context, (sum, count))| (context, sum / count as f64))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SongAnalysis;
    use crate::test_utils::{analyzed_song, bare_song, featured_song};

    #[test]
    fn test_centroid_of_three_vectors() {
        let vectors = vec![
            vec![1.0, 2.0, 3.0],
            vec![3.0, 4.0, 5.0],
            vec![5.0, 6.0, 7.0],
        ];
        assert_eq!(centroid(&vectors), vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_centroid_empty() {
        assert_eq!(centroid(&[]), Vec::<f32>::new());
    }

    #[test]
    fn test_centroid_skips_mismatched_dims() {
        let vectors = vec![vec![2.0, 4.0], vec![1.0, 2.0, 3.0], vec![4.0, 6.0]];
        assert_eq!(centroid(&vectors), vec![3.0, 5.0]);
    }

    #[test]
    fn test_audio_centroid_filters_nan() {
        let valid = AudioFeatures {
            energy: Some(0.6),
            ..Default::default()
        };
        let poisoned = AudioFeatures {
            energy: Some(f64::NAN),
            ..Default::default()
        };
        let result = audio_centroid([&valid, &poisoned]);
        // The NaN sample is ignored; the valid value survives unchanged
        assert_eq!(result.get("energy"), Some(&0.6));
    }

    #[test]
    fn test_audio_centroid_omits_absent_fields() {
        let a = AudioFeatures {
            energy: Some(0.4),
            tempo: Some(120.0),
            ..Default::default()
        };
        let b = AudioFeatures {
            energy: Some(0.8),
            ..Default::default()
        };
        let result = audio_centroid([&a, &b]);
        assert_eq!(result.get("energy"), Some(&0.6));
        // tempo averages only over the one song that has it
        assert_eq!(result.get("tempo"), Some(&120.0));
        // valence is absent everywhere, so it must not appear at all
        assert!(!result.contains_key("valence"));
    }

    #[test]
    fn test_genre_distribution_counts() {
        let songs = vec![
            analyzed_song("s1", &["rock", "indie"], "calm", &[]),
            analyzed_song("s2", &["rock", "alternative"], "calm", &[]),
        ];
        let dist = genre_distribution(&songs);
        assert_eq!(dist.get("rock"), Some(&2));
        assert_eq!(dist.get("indie"), Some(&1));
        assert_eq!(dist.get("alternative"), Some(&1));
    }

    #[test]
    fn test_genre_distribution_case_folds() {
        let songs = vec![
            analyzed_song("s1", &["Rock"], "calm", &[]),
            analyzed_song("s2", &["rock"], "calm", &[]),
        ];
        assert_eq!(genre_distribution(&songs).get("rock"), Some(&2));
    }

    #[test]
    fn test_emotion_distribution_skips_moodless() {
        let mut moodless = analyzed_song("s1", &[], "x", &[]);
        moodless.analysis = Some(SongAnalysis::default());
        let songs = vec![moodless, analyzed_song("s2", &[], "tense", &[]), bare_song("s3")];
        let dist = emotion_distribution(&songs);
        assert_eq!(dist.len(), 1);
        assert_eq!(dist.get("tense"), Some(&1));
    }

    #[test]
    fn test_context_distribution_means() {
        let mut a = analyzed_song("s1", &[], "calm", &[]);
        a.analysis
            .as_mut()
            .unwrap()
            .listening_contexts
            .insert("study".to_string(), 0.2);
        let mut b = analyzed_song("s2", &[], "calm", &[]);
        b.analysis
            .as_mut()
            .unwrap()
            .listening_contexts
            .insert("study".to_string(), 0.6);
        let dist = context_distribution(&[a, b]);
        let study = dist.get("study").unwrap();
        assert!((study - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_featured_song_fixture_participates() {
        let songs = vec![featured_song("s1", 0.9, 0.1, 140.0)];
        let result = audio_centroid(songs.iter().filter_map(|s| s.audio_features.as_ref()));
        assert_eq!(result.get("energy"), Some(&0.9));
    }
}
