//! Deterministic content hashing and versioned cache keys.
//!
//! Everything cache-related in this crate flows through one serialization
//! primitive: [`stable_stringify`], a canonical JSON encoding with sorted
//! object keys. Hashing that string with SHA-256 gives hashes that are
//! stable across process restarts, field orderings, and map iteration
//! orders - which is what makes content-addressed cache invalidation
//! trustworthy.
//!
//! Domain hash functions wrap the digest in a typed [`CacheKey`] so every
//! key is self-describing (`pp_v1_...`, `ctx_...`).

pub mod bundle;
pub mod keys;

use std::collections::BTreeMap;

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::config::MatchingConfig;
use crate::model::{MatchContext, Song};
pub use keys::{CacheKey, KeyKind, KeyParseError};

/// Version tag for track-embedding keys.
pub const TRACK_EMBEDDING_VERSION: u32 = 1;
/// Version tag for playlist-profile content keys.
pub const PLAYLIST_PROFILE_VERSION: u32 = 1;
/// Version tag for matching-config keys.
pub const MATCHING_CONFIG_VERSION: u32 = 1;

/// Serialize a JSON value deterministically.
///
/// Object keys are emitted in lexicographic order; arrays keep their order.
/// `Null` serializes to the literal `null` - and since absent optional
/// fields also serialize to `Null` upstream, absent and explicitly-null
/// inputs hash identically. That equivalence is intentional and load-bearing
/// for hash backward-compatibility; do not "fix" it.
pub fn stable_stringify(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => serde_json::to_string(s).unwrap_or_default(),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(stable_stringify).collect();
            format!("[{}]", parts.join(","))
        }
        Value::Object(map) => {
            // BTreeMap gives lexicographic key order
            let sorted: BTreeMap<&String, &Value> = map.iter().collect();
            let parts: Vec<String> = sorted
                .into_iter()
                .map(|(k, v)| {
                    format!(
                        "{}:{}",
                        serde_json::to_string(k).unwrap_or_default(),
                        stable_stringify(v)
                    )
                })
                .collect();
            format!("{{{}}}", parts.join(","))
        }
    }
}

/// Full SHA-256 digest of the content, as 64 lowercase hex chars.
pub fn stable_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(64);
    for byte in digest {
        hex.push_str(&format!("{byte:02x}"));
    }
    hex
}

/// First 16 hex chars of the full digest.
pub fn short_hash(content: &str) -> String {
    stable_hash(content)[..16].to_string()
}

/// Short hash of a value's stable serialization.
pub fn hash_value(value: &Value) -> String {
    short_hash(&stable_stringify(value))
}

/// Round to 4 decimal places so float jitter cannot flip a content hash.
pub fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

/// Key for the embedding of one track's extracted text.
pub fn track_embedding_key(text: &str) -> CacheKey {
    CacheKey::new(
        KeyKind::TrackEmbedding,
        Some(TRACK_EMBEDDING_VERSION),
        short_hash(text),
    )
}

/// Key for a track's genre set (sorted, case-folded - order independent).
pub fn track_genre_key(genres: &[String]) -> CacheKey {
    let mut sorted: Vec<String> = genres.iter().map(|g| g.to_lowercase()).collect();
    sorted.sort();
    let value = Value::Array(sorted.into_iter().map(Value::String).collect());
    CacheKey::new(KeyKind::TrackGenre, None, hash_value(&value))
}

/// Content hash of one song snapshot.
///
/// Covers the full matching view (metadata, genres, features, analysis),
/// so any enrichment change to a song changes its candidate-set hash.
pub fn song_content_hash(song: &Song) -> String {
    let value = serde_json::to_value(song).unwrap_or(Value::Null);
    hash_value(&value)
}

/// Content key for a playlist profile: sorted member song IDs plus the
/// rounded audio centroid.
pub fn profile_content_key(
    song_ids: &[String],
    audio_centroid: &BTreeMap<String, f64>,
) -> CacheKey {
    let mut ids: Vec<&String> = song_ids.iter().collect();
    ids.sort();

    let centroid: serde_json::Map<String, Value> = audio_centroid
        .iter()
        .map(|(k, v)| (k.clone(), Value::from(round4(*v))))
        .collect();

    let value = serde_json::json!({
        "song_ids": ids,
        "audio_centroid": centroid,
    });
    CacheKey::new(
        KeyKind::PlaylistProfile,
        Some(PLAYLIST_PROFILE_VERSION),
        hash_value(&value),
    )
}

/// Key over the full matching configuration.
///
/// Every config field participates: a weight tweak, a different rerank
/// blend, even a TTL change produces a different key and therefore a fresh
/// computation - never a stale hit.
pub fn matching_config_key(config: &MatchingConfig) -> CacheKey {
    let value = serde_json::to_value(config).unwrap_or(Value::Null);
    CacheKey::new(
        KeyKind::MatchingConfig,
        Some(MATCHING_CONFIG_VERSION),
        hash_value(&value),
    )
}

/// Key over a candidate song set: (song ID, content hash) pairs, sorted by
/// ID so request order is irrelevant.
pub fn candidate_set_key(pairs: &[(String, String)]) -> CacheKey {
    CacheKey::new(KeyKind::CandidateSet, None, hash_pair_set(pairs))
}

/// Key over a playlist set: (playlist ID, profile content hash) pairs,
/// sorted by ID.
pub fn playlist_set_key(pairs: &[(String, String)]) -> CacheKey {
    CacheKey::new(KeyKind::PlaylistSet, None, hash_pair_set(pairs))
}

fn hash_pair_set(pairs: &[(String, String)]) -> String {
    let mut sorted: Vec<&(String, String)> = pairs.iter().collect();
    sorted.sort();
    let value = Value::Array(
        sorted
            .into_iter()
            .map(|(id, hash)| {
                serde_json::json!({ "id": id, "hash": hash })
            })
            .collect(),
    );
    hash_value(&value)
}

/// Composite key for a full match context.
pub fn match_context_key(context: &MatchContext) -> CacheKey {
    let value = serde_json::json!({
        "candidate_set_hash": context.candidate_set_hash,
        "playlist_set_hash": context.playlist_set_hash,
        "config_hash": context.config_hash,
        "model_bundle_hash": context.model_bundle_hash,
    });
    CacheKey::new(KeyKind::MatchContext, None, hash_value(&value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stable_stringify_sorts_keys() {
        let a = json!({ "b": 1, "a": 2 });
        assert_eq!(stable_stringify(&a), r#"{"a":2,"b":1}"#);
    }

    #[test]
    fn test_stable_stringify_null() {
        assert_eq!(stable_stringify(&Value::Null), "null");
        assert_eq!(stable_stringify(&json!({ "x": null })), r#"{"x":null}"#);
    }

    #[test]
    fn test_stable_stringify_preserves_array_order() {
        let v = json!([3, 1, 2]);
        assert_eq!(stable_stringify(&v), "[3,1,2]");
    }

    #[test]
    fn test_stable_stringify_nested_determinism() {
        let a = json!({ "outer": { "z": [1, 2], "a": "x" }, "flag": true });
        let first = stable_stringify(&a);
        let second = stable_stringify(&a);
        assert_eq!(first, second);
        assert_eq!(first, r#"{"flag":true,"outer":{"a":"x","z":[1,2]}}"#);
    }

    #[test]
    fn test_hash_lengths() {
        assert_eq!(stable_hash("hello").len(), 64);
        assert_eq!(short_hash("hello").len(), 16);
        assert!(stable_hash("hello").starts_with(&short_hash("hello")));
    }

    #[test]
    fn test_hash_stability() {
        // Pinned digest: must never change across releases, or every
        // persisted cache key becomes garbage.
        assert_eq!(
            stable_hash(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_track_genre_key_order_independent() {
        let a = track_genre_key(&["Rock".to_string(), "indie".to_string()]);
        let b = track_genre_key(&["indie".to_string(), "rock".to_string()]);
        assert_eq!(a, b);
        assert_eq!(a.kind, KeyKind::TrackGenre);
    }

    #[test]
    fn test_candidate_set_key_order_independent() {
        let pairs_a = vec![
            ("s1".to_string(), "h1".to_string()),
            ("s2".to_string(), "h2".to_string()),
        ];
        let pairs_b = vec![
            ("s2".to_string(), "h2".to_string()),
            ("s1".to_string(), "h1".to_string()),
        ];
        assert_eq!(candidate_set_key(&pairs_a), candidate_set_key(&pairs_b));
    }

    #[test]
    fn test_candidate_set_key_sensitive_to_content() {
        let pairs_a = vec![("s1".to_string(), "h1".to_string())];
        let pairs_b = vec![("s1".to_string(), "h1-changed".to_string())];
        assert_ne!(candidate_set_key(&pairs_a), candidate_set_key(&pairs_b));
    }

    #[test]
    fn test_profile_content_key_rounding() {
        let ids = vec!["a".to_string()];
        let mut c1 = BTreeMap::new();
        c1.insert("energy".to_string(), 0.500049999);
        let mut c2 = BTreeMap::new();
        c2.insert("energy".to_string(), 0.50001);
        // Both round to 0.5 at 4 decimal places
        assert_eq!(profile_content_key(&ids, &c1), profile_content_key(&ids, &c2));
    }

    #[test]
    fn test_profile_content_key_membership_change() {
        let centroid = BTreeMap::new();
        let one = profile_content_key(&["a".to_string()], &centroid);
        let two = profile_content_key(&["a".to_string(), "b".to_string()], &centroid);
        assert_ne!(one, two);
    }

    #[test]
    fn test_match_context_key_component_sensitivity() {
        let base = MatchContext {
            candidate_set_hash: "cs_a".to_string(),
            playlist_set_hash: "ps_a".to_string(),
            config_hash: "mc_a".to_string(),
            model_bundle_hash: "mb_a".to_string(),
        };
        let mut changed = base.clone();
        changed.config_hash = "mc_b".to_string();
        assert_ne!(match_context_key(&base), match_context_key(&changed));
    }
}

/// Property-based tests using proptest
#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::Value;

    /// Generate arbitrary JSON values a few levels deep
    fn arb_json() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::from),
            any::<i64>().prop_map(Value::from),
            "[a-z0-9 ]{0,12}".prop_map(Value::from),
        ];
        leaf.prop_recursive(3, 24, 6, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
                prop::collection::btree_map("[a-z_]{1,8}", inner, 0..6).prop_map(|m| {
                    Value::Object(m.into_iter().collect())
                }),
            ]
        })
    }

    proptest! {
        /// Serializing the same value twice yields identical output
        #[test]
        fn stringify_is_deterministic(value in arb_json()) {
            prop_assert_eq!(stable_stringify(&value), stable_stringify(&value));
        }

        /// Reordering object keys does not change the serialization
        #[test]
        fn stringify_ignores_key_order(
            map in prop::collection::btree_map("[a-z_]{1,8}", any::<i64>().prop_map(Value::from), 1..8)
        ) {
            let forward = Value::Object(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect());
            let reversed = Value::Object(map.iter().rev().map(|(k, v)| (k.clone(), v.clone())).collect());
            prop_assert_eq!(stable_stringify(&forward), stable_stringify(&reversed));
        }

        /// Hashes are fixed-width hex regardless of input
        #[test]
        fn hashes_are_hex(content in ".{0,64}") {
            let full = stable_hash(&content);
            prop_assert_eq!(full.len(), 64);
            prop_assert!(full.chars().all(|c| c.is_ascii_hexdigit()));
            prop_assert_eq!(&short_hash(&content), &full[..16]);
        }
    }
}
