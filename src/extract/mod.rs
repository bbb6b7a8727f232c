//! Text extraction for embedding input.
//!
//! Pure functions that turn a song's metadata and LLM analysis into
//! normalized text blocks. The embedding provider sees only these blocks,
//! so their wording is part of the cache contract: changing it warrants a
//! bump of the extractor algorithm version in the model bundle.

use crate::model::{PlaylistProfile, Song, SongAnalysis};

/// Extraction errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractError {
    /// The song has no LLM analysis to extract from
    #[error("song {0} has no analysis")]
    MissingAnalysis(String),
}

/// Collapse whitespace runs and trim.
fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Metadata block: name, artists, genres.
pub fn metadata_block(song: &Song) -> String {
    let mut parts = vec![format!("Track: {}", song.name)];
    if !song.artists.is_empty() {
        parts.push(format!("Artists: {}", song.artists.join(", ")));
    }
    if let Some(genres) = &song.genres
        && !genres.is_empty()
    {
        parts.push(format!("Genres: {}", genres.join(", ")));
    }
    normalize(&parts.join(". "))
}

/// Analysis block: mood and themes.
///
/// Errors when the song carries no analysis at all; an analysis with empty
/// fields yields an empty-ish block, not an error.
pub fn analysis_block(song: &Song) -> Result<String, ExtractError> {
    let analysis = song
        .analysis
        .as_ref()
        .ok_or_else(|| ExtractError::MissingAnalysis(song.id.clone()))?;

    let mut parts = Vec::new();
    if let Some(mood) = &analysis.dominant_mood {
        parts.push(format!("Mood: {mood}"));
    }
    if !analysis.themes.is_empty() {
        parts.push(format!("Themes: {}", analysis.themes.join(", ")));
    }
    Ok(normalize(&parts.join(". ")))
}

/// Context block: listening contexts ordered by descending score.
pub fn context_block(analysis: &SongAnalysis) -> String {
    if analysis.listening_contexts.is_empty() {
        return String::new();
    }
    let mut contexts: Vec<(&String, &f64)> = analysis.listening_contexts.iter().collect();
    contexts.sort_by(|a, b| b.1.partial_cmp(a.1).unwrap_or(std::cmp::Ordering::Equal));
    let listed: Vec<&str> = contexts.iter().map(|(name, _)| name.as_str()).collect();
    normalize(&format!("Listening contexts: {}", listed.join(", ")))
}

/// Full embedding text for a song: metadata plus whatever analysis blocks
/// are available. Missing analysis just omits those blocks.
pub fn embedding_text(song: &Song) -> String {
    let mut blocks = vec![metadata_block(song)];
    if let Ok(block) = analysis_block(song)
        && !block.is_empty()
    {
        blocks.push(block);
    }
    if let Some(analysis) = &song.analysis {
        let block = context_block(analysis);
        if !block.is_empty() {
            blocks.push(block);
        }
    }
    blocks.join("\n")
}

/// Short text document describing a playlist profile, used as the
/// cross-encoder document during reranking.
pub fn profile_document(profile: &PlaylistProfile) -> String {
    let mut parts = vec![format!("Playlist with {} songs", profile.song_count)];

    let top_genres = top_keys(&profile.genre_distribution, 5);
    if !top_genres.is_empty() {
        parts.push(format!("Genres: {}", top_genres.join(", ")));
    }
    let top_moods = top_keys(&profile.emotion_distribution, 3);
    if !top_moods.is_empty() {
        parts.push(format!("Moods: {}", top_moods.join(", ")));
    }
    let top_themes = top_keys(&profile.theme_distribution, 5);
    if !top_themes.is_empty() {
        parts.push(format!("Themes: {}", top_themes.join(", ")));
    }
    normalize(&parts.join(". "))
}

/// Keys of a count map, by descending count then name, truncated to `n`.
fn top_keys(distribution: &std::collections::BTreeMap<String, u32>, n: usize) -> Vec<String> {
    let mut entries: Vec<(&String, &u32)> = distribution.iter().collect();
    entries.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    entries.into_iter().take(n).map(|(k, _)| k.clone()).collect()
}
