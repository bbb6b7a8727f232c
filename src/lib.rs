//! Playlist Pilot - song-to-playlist matching and profiling.
//!
//! This crate scores candidate songs against aggregated playlist profiles
//! and decides, per request, whether to serve cached results or compute
//! fresh ones. The pipeline in one line:
//!
//! ```text
//! songs + playlists -> profiles -> multi-factor scores -> rerank -> cached matches
//! ```
//!
//! Everything cacheable is content-addressed: profiles, configs, and the
//! model bundle all hash into the composite context key, so any change to
//! inputs, weights, or models transparently invalidates stale results.
//!
//! Entry points:
//! - [`profile::ProfileEngine`] computes and persists playlist profiles
//! - [`matching::MatchingService`] matches songs with two-tier caching
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use playlist_pilot::config;
//! use playlist_pilot::hashing::bundle::BundleResolver;
//! use playlist_pilot::matching::MatchingService;
//! use playlist_pilot::store::SqliteStore;
//!
//! let store = Arc::new(SqliteStore::connect("sqlite:playlist_pilot.db").await?);
//! let bundle = Arc::new(BundleResolver::new(embeddings, None));
//! let service = MatchingService::new(config::load(), store, bundle);
//! let outcome = service
//!     .get_or_compute_matches(Some("acct-1"), &songs, &profiles, &embeddings)
//!     .await?;
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod extract;
pub mod hashing;
pub mod matching;
pub mod model;
pub mod profile;
pub mod providers;
pub mod rerank;
pub mod scoring;
pub mod store;
#[cfg(test)]
pub mod test_utils;

pub use config::MatchingConfig;
pub use error::{Error, Result};
pub use matching::MatchingService;
pub use model::{Match, PlaylistProfile, Song};
