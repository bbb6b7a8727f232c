//! Configuration system using TOML files.
//!
//! Config is stored in the OS-standard config directory:
//! - Windows: %APPDATA%\playlist-pilot\config.toml
//! - macOS: ~/Library/Application Support/playlist-pilot/config.toml
//! - Linux: ~/.config/playlist-pilot/config.toml
//!
//! The config file is human-readable and editable. Every field here
//! participates in the matching-config hash, so editing any of them
//! invalidates cached match results on the next run.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::rerank::RerankConfig;

/// Matching pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Per-factor blend weights
    pub weights: FactorWeights,

    /// In-memory match cache settings
    pub cache: CacheSettings,

    /// Cross-encoder reranking settings
    pub rerank: RerankSettings,

    /// External provider settings
    pub provider: ProviderSettings,
}

impl MatchingConfig {
    /// Reranking parameters in the shape the rerank stage consumes.
    pub fn rerank_config(&self) -> RerankConfig {
        RerankConfig {
            top_n: self.rerank.top_n,
            blend_weight: self.rerank.blend_weight,
            min_score_threshold: self.rerank.min_score_threshold,
        }
    }

    /// Provider call deadline.
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_millis(self.provider.timeout_ms)
    }
}

/// Blend weights for the scoring factors.
///
/// Defaults sum to 1.0 so the blended score stays a weighted average;
/// custom weights are used as-is (the final score is clamped regardless).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct FactorWeights {
    /// Embedding cosine similarity
    pub vector: f64,
    /// Genre distribution overlap
    pub genre: f64,
    /// Audio feature proximity to the playlist centroid
    pub audio: f64,
    /// Theme/mood vocabulary overlap
    pub semantic: f64,
    /// Listening-context alignment
    pub context: f64,
    /// Energy/tempo flow cohesion
    pub flow: f64,
}

impl Default for FactorWeights {
    fn default() -> Self {
        Self {
            vector: 0.35,
            genre: 0.20,
            audio: 0.15,
            semantic: 0.12,
            context: 0.10,
            flow: 0.08,
        }
    }
}

/// In-memory match cache settings
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Entry time-to-live in milliseconds
    pub ttl_ms: u64,

    /// Maximum resident entries before LRU eviction
    pub max_entries: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_ms: 600_000,
            max_entries: 500,
        }
    }
}

impl CacheSettings {
    /// Entry time-to-live.
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }
}

/// Cross-encoder reranking settings
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankSettings {
    /// How many top candidates go through the cross-encoder
    pub top_n: usize,

    /// Weight of the rerank score in the blend
    pub blend_weight: f64,

    /// Candidates scoring below this are dropped before reranking
    pub min_score_threshold: f64,
}

impl Default for RerankSettings {
    fn default() -> Self {
        let defaults = RerankConfig::default();
        Self {
            top_n: defaults.top_n,
            blend_weight: defaults.blend_weight,
            min_score_threshold: defaults.min_score_threshold,
        }
    }
}

/// External provider settings
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// Deadline for any single provider call, in milliseconds
    pub timeout_ms: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self { timeout_ms: 30_000 }
    }
}

// ============================================================================
// Config File Operations
// ============================================================================

/// Get the config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("playlist-pilot"))
}

/// Get the full path to the config file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

/// Load configuration from disk
///
/// Returns default config if file doesn't exist or can't be parsed.
/// Logs warnings but doesn't fail - we always return a usable config.
pub fn load() -> MatchingConfig {
    let Some(path) = config_path() else {
        tracing::warn!("Could not determine config directory, using defaults");
        return MatchingConfig::default();
    };

    if !path.exists() {
        tracing::info!("No config file found at {:?}, using defaults", path);
        return MatchingConfig::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => {
                tracing::info!("Loaded config from {:?}", path);
                config
            }
            Err(e) => {
                tracing::error!("Failed to parse config file {:?}: {}", path, e);
                tracing::warn!("Using default configuration");
                MatchingConfig::default()
            }
        },
        Err(e) => {
            tracing::error!("Failed to read config file {:?}: {}", path, e);
            MatchingConfig::default()
        }
    }
}

/// Save configuration to disk
///
/// Creates the config directory if it doesn't exist.
pub fn save(config: &MatchingConfig) -> Result<(), ConfigError> {
    let dir = config_dir().ok_or(ConfigError::NoConfigDir)?;
    let path = dir.join("config.toml");

    // Ensure directory exists
    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::CreateDir(dir.clone(), e))?;

    // Serialize to pretty TOML
    let contents = toml::to_string_pretty(config).map_err(ConfigError::Serialize)?;

    // Write atomically (write to temp, then rename)
    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, &contents).map_err(|e| ConfigError::Write(temp_path.clone(), e))?;
    std::fs::rename(&temp_path, &path)
        .map_err(|e| ConfigError::Rename(temp_path, path.clone(), e))?;

    tracing::info!("Saved config to {:?}", path);
    Ok(())
}

// ============================================================================
// Error Types
// ============================================================================

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to create config directory {0}: {1}")]
    CreateDir(PathBuf, std::io::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),

    #[error("Failed to write config to {0}: {1}")]
    Write(PathBuf, std::io::Error),

    #[error("Failed to rename temp file {0} to {1}: {2}")]
    Rename(PathBuf, PathBuf, std::io::Error),
}

// ============================================================================
// Tests
// ============================================================================
