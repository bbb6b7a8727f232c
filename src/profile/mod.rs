//! Playlist profiling - aggregating member songs into a numerical and
//! semantic profile.
//!
//! [`stats`] holds the pure aggregation functions (centroids and
//! distributions); [`engine`] wraps them in a content-addressed
//! compute-or-reuse flow backed by the persistent store.

pub mod engine;
pub mod stats;

pub use engine::{ProfileEngine, ProfileOptions};
