//! Multi-factor scoring of songs against playlist profiles.
//!
//! [`factors`] holds the independent factor functions, each clamped to
//! [0,1]; [`engine`] blends them with configured weights and produces
//! ranked, confidence-scored matches.

pub mod engine;
pub mod factors;

pub use engine::{BatchOptions, ScoringEngine};
