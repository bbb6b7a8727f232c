//! Typed, self-describing cache keys.
//!
//! Every hash this crate emits is wrapped in a [`CacheKey`] carrying its
//! kind and optional algorithm version, rendered with the stable prefixes
//! (`te_v1_`, `pp_v1_`, `ctx_`, ...) that make keys recognizable in logs
//! and store dumps. The format/parse pair replaces ad hoc string
//! concatenation so malformed keys fail loudly instead of silently missing
//! the cache.

use std::fmt;
use std::str::FromStr;

/// What a cache key identifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyKind {
    /// Embedding of one track's extracted text
    TrackEmbedding,
    /// A track's genre set
    TrackGenre,
    /// A playlist profile's content
    PlaylistProfile,
    /// A matching configuration (weights + thresholds)
    MatchingConfig,
    /// The candidate song set of a matching request
    CandidateSet,
    /// The playlist set of a matching request
    PlaylistSet,
    /// A full match context (composite of the above)
    MatchContext,
    /// The active model bundle (unversioned - the hash IS the version)
    ModelBundle,
}

impl KeyKind {
    /// Stable wire prefix for this kind.
    pub fn prefix(self) -> &'static str {
        match self {
            KeyKind::TrackEmbedding => "te",
            KeyKind::TrackGenre => "tg",
            KeyKind::PlaylistProfile => "pp",
            KeyKind::MatchingConfig => "mc",
            KeyKind::CandidateSet => "cs",
            KeyKind::PlaylistSet => "ps",
            KeyKind::MatchContext => "ctx",
            KeyKind::ModelBundle => "mb",
        }
    }

    fn from_prefix(prefix: &str) -> Option<Self> {
        Some(match prefix {
            "te" => KeyKind::TrackEmbedding,
            "tg" => KeyKind::TrackGenre,
            "pp" => KeyKind::PlaylistProfile,
            "mc" => KeyKind::MatchingConfig,
            "cs" => KeyKind::CandidateSet,
            "ps" => KeyKind::PlaylistSet,
            "ctx" => KeyKind::MatchContext,
            "mb" => KeyKind::ModelBundle,
            _ => return None,
        })
    }
}

/// A structured cache key: kind, optional version, hex hash suffix.
///
/// Renders as `{prefix}_v{version}_{hash}` (or `{prefix}_{hash}` when
/// unversioned) and parses back losslessly.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub kind: KeyKind,
    pub version: Option<u32>,
    pub hash: String,
}

impl CacheKey {
    /// Create a key from parts.
    pub fn new(kind: KeyKind, version: Option<u32>, hash: impl Into<String>) -> Self {
        Self {
            kind,
            version,
            hash: hash.into(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.version {
            Some(v) => write!(f, "{}_v{}_{}", self.kind.prefix(), v, self.hash),
            None => write!(f, "{}_{}", self.kind.prefix(), self.hash),
        }
    }
}

/// Errors from parsing a rendered cache key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyParseError {
    #[error("unknown key prefix: {0}")]
    UnknownKind(String),

    #[error("key has no hash component: {0}")]
    MissingHash(String),

    #[error("invalid version segment in key: {0}")]
    BadVersion(String),
}

impl FromStr for CacheKey {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix, rest) = s
            .split_once('_')
            .ok_or_else(|| KeyParseError::MissingHash(s.to_string()))?;

        let kind = KeyKind::from_prefix(prefix)
            .ok_or_else(|| KeyParseError::UnknownKind(prefix.to_string()))?;

        // A "v<digits>_" segment between prefix and hash is the version
        let (version, hash) = match rest.split_once('_') {
            Some((seg, tail)) if seg.starts_with('v') => {
                let number = seg[1..]
                    .parse::<u32>()
                    .map_err(|_| KeyParseError::BadVersion(s.to_string()))?;
                (Some(number), tail)
            }
            _ => (None, rest),
        };

        if hash.is_empty() {
            return Err(KeyParseError::MissingHash(s.to_string()));
        }

        Ok(CacheKey::new(kind, version, hash))
    }
}
