//! Deterministic product scoring.
//!
//! Scores products against a customer and an optional context using weighted
//! attribute similarity. The model never decides a score; these values are
//! authoritative for every ranked list the agents return.

mod engine;
mod pairing;

pub use engine::{ComponentScores, ScoringEngine, ScoringWeights};
pub use pairing::frequently_paired;

/// Default scoring weights. Weights plus the context bonus sum to 1.0.
pub const DEFAULT_WEIGHTS: ScoringWeights =
    ScoringWeights { category: 0.40, price_band: 0.25, rating: 0.20, context_bonus: 0.15 };

/// Candidates scoring below this are never returned.
pub const MIN_RECOMMENDATION_SCORE: f64 = 0.30;

/// Number of recommendations returned by default.
pub const DEFAULT_TOP_K: usize = 5;

/// Peers below this similarity are not reported as similar customers.
pub const MIN_CUSTOMER_SIMILARITY: f64 = 0.60;
