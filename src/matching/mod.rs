//! Matching orchestration.
//!
//! [`service::MatchingService`] is the crate's front door: it owns the
//! scoring engine, the optional reranker, the in-memory cache, and the
//! persistent store, and decides per request whether to serve cached
//! results or compute fresh ones.

pub mod service;

pub use service::MatchingService;
