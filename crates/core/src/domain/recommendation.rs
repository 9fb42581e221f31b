use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::domain::product::{ProductId, ProductSummary};

/// A scored product. `score` is always inside `[0, 1]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecommendationCandidate {
    pub product_id: ProductId,
    pub summary: Option<ProductSummary>,
    pub score: f64,
    /// Score quoted by the model reply, kept for display only.
    pub model_score: Option<f64>,
    pub explanation: Option<String>,
}

impl RecommendationCandidate {
    pub fn new(product_id: ProductId, score: f64) -> Self {
        Self { product_id, summary: None, score: clamp_score(score), model_score: None, explanation: None }
    }

    pub fn with_summary(mut self, summary: ProductSummary) -> Self {
        self.summary = Some(summary);
        self
    }

    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = Some(explanation.into());
        self
    }

    /// Candidate ordering: score descending, then product id ascending.
    pub fn ranking_order(a: &Self, b: &Self) -> Ordering {
        b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal).then_with(|| a.product_id.cmp(&b.product_id))
    }
}

pub fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

pub fn sort_candidates(candidates: &mut [RecommendationCandidate]) {
    candidates.sort_by(RecommendationCandidate::ranking_order);
}
