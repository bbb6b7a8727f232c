//! Cross-encoder reranking of top matching candidates.
//!
//! Reranking is a quality enhancement, never a hard dependency: provider
//! failure, an empty candidate list, or a blank query all degrade to a
//! pass-through of the original order and scores. The only way candidates
//! are lost here is the explicit minimum-score filter.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::model::MatchCandidate;
use crate::providers::{ProviderError, RerankProvider};
use crate::scoring::factors::clamp01;

/// Reranking parameters; see [`crate::config::MatchingConfig`] for the
/// caller-facing defaults.
#[derive(Debug, Clone)]
pub struct RerankConfig {
    /// How many top candidates go through the cross-encoder
    pub top_n: usize,
    /// Weight of the rerank score in the blend (0.3 = 70% original)
    pub blend_weight: f64,
    /// Candidates scoring below this are dropped before reranking
    pub min_score_threshold: f64,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            top_n: 50,
            blend_weight: 0.3,
            min_score_threshold: 0.05,
        }
    }
}

/// Summary numbers for one reranking pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RerankStats {
    /// Top score before reranking
    pub original_top_score: f64,
    /// Raw cross-encoder score of the post-rerank top candidate
    pub rerank_top_score: f64,
    /// Blended top score minus original top score
    pub score_shift: f64,
}

/// Result of a reranking pass.
#[derive(Debug, Clone)]
pub struct RerankOutcome {
    /// Candidates in final order (reranked subset first, passthrough after)
    pub candidates: Vec<MatchCandidate>,
    /// Whether the cross-encoder actually ran
    pub reranked: bool,
    /// Present only when `reranked` is true
    pub stats: Option<RerankStats>,
}

impl RerankOutcome {
    fn passthrough(candidates: Vec<MatchCandidate>) -> Self {
        Self {
            candidates,
            reranked: false,
            stats: None,
        }
    }
}

/// Applies cross-encoder reranking to scored candidates.
pub struct Reranker {
    provider: Arc<dyn RerankProvider>,
    provider_timeout: Duration,
}

impl Reranker {
    /// Create a reranker over the given provider.
    pub fn new(provider: Arc<dyn RerankProvider>, provider_timeout: Duration) -> Self {
        Self {
            provider,
            provider_timeout,
        }
    }

    /// Rerank candidates against a query.
    ///
    /// Candidates below `min_score_threshold` are dropped; the top `top_n`
    /// of the remainder are cross-encoded and re-sorted by blended score;
    /// anything past `top_n` passes through untouched, appended after the
    /// reranked ones.
    pub async fn rerank(
        &self,
        query: &str,
        candidates: Vec<MatchCandidate>,
        config: &RerankConfig,
    ) -> RerankOutcome {
        if candidates.is_empty() || query.trim().is_empty() {
            return RerankOutcome::passthrough(candidates);
        }

        let kept: Vec<MatchCandidate> = candidates
            .into_iter()
            .filter(|c| c.score >= config.min_score_threshold)
            .collect();
        if kept.is_empty() {
            return RerankOutcome::passthrough(kept);
        }

        let take = config.top_n.min(kept.len());
        let mut head: Vec<MatchCandidate> = kept[..take].to_vec();
        let tail: Vec<MatchCandidate> = kept[take..].to_vec();

        let documents: Vec<String> = head.iter().map(|c| c.document.clone()).collect();
        let scores = match tokio::time::timeout(
            self.provider_timeout,
            self.provider.rerank(query, &documents),
        )
        .await
        {
            Ok(Ok(scores)) => scores,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "reranker failed, keeping original order");
                return RerankOutcome::passthrough(merge(head, tail));
            }
            Err(_) => {
                let e = ProviderError::Timeout(self.provider_timeout);
                tracing::warn!(error = %e, "reranker timed out, keeping original order");
                return RerankOutcome::passthrough(merge(head, tail));
            }
        };

        let original_top_score = head.first().map(|c| c.score).unwrap_or(0.0);

        for rerank_score in &scores {
            let Some(candidate) = head.get_mut(rerank_score.index) else {
                tracing::warn!(index = rerank_score.index, "reranker returned unknown index");
                continue;
            };
            let original = candidate.score;
            let blended = clamp01(
                (1.0 - config.blend_weight) * original + config.blend_weight * rerank_score.score,
            );
            candidate
                .metadata
                .insert("original_score".to_string(), Value::from(original));
            candidate
                .metadata
                .insert("rerank_score".to_string(), Value::from(rerank_score.score));
            candidate.score = blended;
        }

        head.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let rerank_top_score = head
            .first()
            .and_then(|c| c.metadata.get("rerank_score"))
            .and_then(Value::as_f64)
            .unwrap_or(0.0);
        let blended_top = head.first().map(|c| c.score).unwrap_or(0.0);
        let stats = RerankStats {
            original_top_score,
            rerank_top_score,
            score_shift: blended_top - original_top_score,
        };

        RerankOutcome {
            candidates: merge(head, tail),
            reranked: true,
            stats: Some(stats),
        }
    }
}

fn merge(head: Vec<MatchCandidate>, tail: Vec<MatchCandidate>) -> Vec<MatchCandidate> {
    let mut merged = head;
    merged.extend(tail);
    merged
}
