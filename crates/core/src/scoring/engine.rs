use std::cmp::Ordering;
use std::collections::HashMap;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::pairing::frequently_paired;
use super::{DEFAULT_WEIGHTS, MIN_CUSTOMER_SIMILARITY, MIN_RECOMMENDATION_SCORE};
use crate::domain::analytics::CategoryPairing;
use crate::domain::context::ContextSpec;
use crate::domain::customer::{CustomerProfile, SimilarCustomer};
use crate::domain::product::{PriceBand, ProductId, ProductRecord};
use crate::domain::recommendation::{clamp_score, sort_candidates, RecommendationCandidate};

/// Weights for scoring components
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    /// Weight for category/subcategory affinity (default: 0.40)
    pub category: f64,
    /// Weight for price-band proximity (default: 0.25)
    pub price_band: f64,
    /// Weight for normalized rating (default: 0.20)
    pub rating: f64,
    /// Additive bonus when the product matches the active context (default: 0.15)
    pub context_bonus: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        DEFAULT_WEIGHTS
    }
}

/// Per-component values, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentScores {
    pub category: f64,
    pub price_band: f64,
    pub rating: f64,
    /// 1.0 when the product matches the active context, else 0.0.
    pub context: f64,
}

#[derive(Debug, Clone)]
pub struct ScoringEngine {
    weights: ScoringWeights,
    min_score: f64,
}

impl ScoringEngine {
    pub fn new() -> Self {
        Self { weights: ScoringWeights::default(), min_score: MIN_RECOMMENDATION_SCORE }
    }

    pub fn with_weights(weights: ScoringWeights, min_score: f64) -> Self {
        Self { weights, min_score: clamp_score(min_score) }
    }

    pub fn weights(&self) -> ScoringWeights {
        self.weights
    }

    pub fn min_score(&self) -> f64 {
        self.min_score
    }

    pub fn components(
        &self,
        customer: &CustomerProfile,
        product: &ProductRecord,
        context: &ContextSpec,
    ) -> ComponentScores {
        ComponentScores {
            category: category_affinity(customer, product),
            price_band: band_proximity(customer.preferred_price_band(), product.price_band()),
            rating: normalized_rating(product.rating),
            context: if matches_context(product, context) { 1.0 } else { 0.0 },
        }
    }

    pub fn total(&self, components: &ComponentScores) -> f64 {
        let total = components.category * self.weights.category
            + components.price_band * self.weights.price_band
            + components.rating * self.weights.rating
            + components.context * self.weights.context_bonus;
        clamp_score(total)
    }

    /// Match score between a customer and a product, always inside `[0, 1]`.
    pub fn score(
        &self,
        customer: &CustomerProfile,
        product: &ProductRecord,
        context: &ContextSpec,
    ) -> f64 {
        self.total(&self.components(customer, product, context))
    }

    /// Scores, filters by the minimum score, orders and truncates to `limit`.
    pub fn rank(
        &self,
        customer: &CustomerProfile,
        products: &[ProductRecord],
        context: &ContextSpec,
        exclusions: &[ProductId],
        limit: usize,
    ) -> Vec<RecommendationCandidate> {
        let mut ranked: Vec<RecommendationCandidate> = products
            .iter()
            .filter(|product| !exclusions.contains(&product.id))
            .filter_map(|product| {
                let score = self.score(customer, product, context);
                (score >= self.min_score).then(|| {
                    RecommendationCandidate::new(product.id.clone(), score)
                        .with_summary(product.summary())
                })
            })
            .collect();

        sort_candidates(&mut ranked);
        ranked.truncate(limit);
        ranked
    }

    /// Similarity of two products from category, brand, price and rating.
    pub fn product_similarity(&self, a: &ProductRecord, b: &ProductRecord) -> f64 {
        let category = if a.in_category(&b.category)
            && a.subcategory.trim().eq_ignore_ascii_case(b.subcategory.trim())
        {
            1.0
        } else if a.in_category(&b.category) {
            0.7
        } else {
            0.0
        };
        let brand = if a.brand.trim().eq_ignore_ascii_case(b.brand.trim()) { 1.0 } else { 0.0 };
        let rating = 1.0 - ((a.rating - b.rating).abs() / 5.0).min(1.0);

        clamp_score(
            category * 0.40
                + brand * 0.15
                + price_proximity(a.price, b.price) * 0.25
                + rating * 0.20,
        )
    }

    /// Same-category products most similar to `subject`, never including `subject` itself.
    pub fn similar_products(
        &self,
        subject: &ProductRecord,
        pool: &[ProductRecord],
        limit: usize,
    ) -> Vec<RecommendationCandidate> {
        let mut similar: Vec<RecommendationCandidate> = pool
            .iter()
            .filter(|product| product.id != subject.id && product.in_category(&subject.category))
            .map(|product| {
                RecommendationCandidate::new(
                    product.id.clone(),
                    self.product_similarity(subject, product),
                )
                .with_summary(product.summary())
            })
            .collect();

        sort_candidates(&mut similar);
        similar.truncate(limit);
        similar
    }

    pub fn complement_score(
        &self,
        subject: &ProductRecord,
        candidate: &ProductRecord,
        pairing_strength: f64,
    ) -> f64 {
        clamp_score(
            clamp_score(pairing_strength) * 0.5
                + normalized_rating(candidate.rating) * 0.3
                + price_proximity(subject.price, candidate.price) * 0.2,
        )
    }

    /// Cross-category products that pair well with `subject`.
    ///
    /// Pairing strength comes from co-occurrence counts when `pairings` has
    /// rows, otherwise from the static frequently-paired map. Categories with
    /// neither fall back to every other category at zero strength.
    pub fn complementary_products(
        &self,
        subject: &ProductRecord,
        pool: &[ProductRecord],
        pairings: &[CategoryPairing],
        limit: usize,
    ) -> Vec<RecommendationCandidate> {
        let strengths = pairing_strengths(&subject.category, pairings);
        let mut complements: Vec<RecommendationCandidate> = pool
            .iter()
            .filter(|product| product.id != subject.id && !product.in_category(&subject.category))
            .filter_map(|product| {
                let strength = if strengths.is_empty() {
                    Some(0.0)
                } else {
                    strengths.get(&product.category.trim().to_ascii_lowercase()).copied()
                }?;
                Some(
                    RecommendationCandidate::new(
                        product.id.clone(),
                        self.complement_score(subject, product, strength),
                    )
                    .with_summary(product.summary()),
                )
            })
            .collect();

        sort_candidates(&mut complements);
        complements.truncate(limit);
        complements
    }

    /// Segment 0.4, location 0.3, age within five years 0.3.
    pub fn customer_similarity(&self, a: &CustomerProfile, b: &CustomerProfile) -> f64 {
        let mut similarity = 0.0;
        if a.segment.trim().eq_ignore_ascii_case(b.segment.trim()) {
            similarity += 0.4;
        }
        if a.location.trim().eq_ignore_ascii_case(b.location.trim()) {
            similarity += 0.3;
        }
        if a.age.abs_diff(b.age) <= 5 {
            similarity += 0.3;
        }
        clamp_score(similarity)
    }

    pub fn similar_customers(
        &self,
        subject: &CustomerProfile,
        pool: &[CustomerProfile],
        limit: usize,
    ) -> Vec<SimilarCustomer> {
        let mut peers: Vec<SimilarCustomer> = pool
            .iter()
            .filter(|peer| peer.id != subject.id)
            .filter_map(|peer| {
                let similarity = self.customer_similarity(subject, peer);
                (similarity >= MIN_CUSTOMER_SIMILARITY).then(|| SimilarCustomer {
                    customer_id: peer.id.clone(),
                    segment: peer.segment.clone(),
                    location: peer.location.clone(),
                    age: peer.age,
                    avg_order_value: peer.avg_order_value,
                    similarity,
                })
            })
            .collect();

        peers.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.avg_order_value.cmp(&a.avg_order_value))
                .then_with(|| a.customer_id.cmp(&b.customer_id))
        });
        peers.truncate(limit);
        peers
    }
}

impl Default for ScoringEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn category_affinity(customer: &CustomerProfile, product: &ProductRecord) -> f64 {
    let mut affinity = 0.0;
    if customer.browsed(&product.category) {
        affinity += 0.4;
    }
    if customer.purchased_from(&product.category) || customer.purchased_from(&product.subcategory)
    {
        affinity += 0.6;
    }
    f64::min(affinity, 1.0)
}

fn band_proximity(preferred: PriceBand, actual: PriceBand) -> f64 {
    let distance = preferred.index().abs_diff(actual.index()) as f64;
    1.0 - distance / 3.0
}

fn normalized_rating(rating: f64) -> f64 {
    clamp_score(rating / 5.0)
}

fn price_proximity(a: Decimal, b: Decimal) -> f64 {
    let a = a.to_f64().unwrap_or(0.0);
    let b = b.to_f64().unwrap_or(0.0);
    let scale = a.abs().max(b.abs()).max(1.0);
    1.0 - ((a - b).abs() / scale).min(1.0)
}

fn matches_context(product: &ProductRecord, context: &ContextSpec) -> bool {
    match context {
        ContextSpec::None => false,
        ContextSpec::Occasion(occasion) => product.fits_occasion(occasion),
        ContextSpec::Season(season) => product.fits_season(*season),
        ContextSpec::Category(category) => product.in_category(category),
    }
}

fn pairing_strengths(category: &str, pairings: &[CategoryPairing]) -> HashMap<String, f64> {
    let relevant: Vec<&CategoryPairing> = pairings
        .iter()
        .filter(|pairing| {
            pairing.category.trim().eq_ignore_ascii_case(category.trim())
                && pairing.co_occurrence_count > 0
        })
        .collect();

    if let Some(max) = relevant.iter().map(|pairing| pairing.co_occurrence_count).max() {
        return relevant
            .iter()
            .map(|pairing| {
                (
                    pairing.paired_category.trim().to_ascii_lowercase(),
                    f64::from(pairing.co_occurrence_count) / f64::from(max),
                )
            })
            .collect();
    }

    frequently_paired(category)
        .iter()
        .enumerate()
        .map(|(index, paired)| (paired.to_ascii_lowercase(), 1.0 - 0.2 * index as f64))
        .collect()
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::domain::context::Season;
    use crate::domain::customer::CustomerId;

    fn customer(id: &str) -> CustomerProfile {
        CustomerProfile {
            id: CustomerId::from(id),
            age: 30,
            gender: "Female".to_owned(),
            location: "Chicago".to_owned(),
            segment: "Frequent Buyer".to_owned(),
            avg_order_value: Decimal::from(120),
            browsing_history: vec!["Fashion".to_owned()],
            purchase_history: vec!["Jackets".to_owned()],
            purchased_products: Vec::new(),
        }
    }

    fn product(id: &str, category: &str, subcategory: &str, price: i64, rating: f64) -> ProductRecord {
        ProductRecord {
            id: ProductId::from(id),
            category: category.to_owned(),
            subcategory: subcategory.to_owned(),
            brand: "Acme".to_owned(),
            price: Decimal::from(price),
            rating,
            avg_similar_rating: 4.0,
            sentiment_score: 0.7,
            seasons: Vec::new(),
            occasions: Vec::new(),
        }
    }

    #[test]
    fn score_is_bounded_and_deterministic() {
        let engine = ScoringEngine::new();
        let shopper = customer("C1");
        let products = [
            product("P1", "Fashion", "Jackets", 150, 5.0),
            product("P2", "Garden", "Hoses", 5000, 0.0),
            product("P3", "Fashion", "Jeans", 10, 9.0),
        ];
        let contexts = [
            ContextSpec::None,
            ContextSpec::Season(Season::Winter),
            ContextSpec::Category("Fashion".to_owned()),
        ];

        for item in &products {
            for context in &contexts {
                let first = engine.score(&shopper, item, context);
                let second = engine.score(&shopper, item, context);
                assert!((0.0..=1.0).contains(&first), "score {first} out of range");
                assert_eq!(first.to_bits(), second.to_bits());
            }
        }
    }

    #[test]
    fn total_score_uses_weights() {
        let engine = ScoringEngine::new();
        let components = ComponentScores { category: 1.0, price_band: 0.5, rating: 0.8, context: 0.0 };
        // 0.40 + 0.125 + 0.16 = 0.685
        assert!((engine.total(&components) - 0.685).abs() < 1e-9);
    }

    #[test]
    fn winter_context_outranks_identical_non_seasonal_product() {
        let engine = ScoringEngine::new();
        let shopper = customer("C1");
        let plain = product("P1", "Fashion", "Coats", 150, 4.0);
        let mut seasonal = product("P2", "Fashion", "Coats", 150, 4.0);
        seasonal.seasons = vec![Season::Winter];
        let context = ContextSpec::Season(Season::Winter);

        assert!(engine.score(&shopper, &seasonal, &context) > engine.score(&shopper, &plain, &context));
        let ranked = engine.rank(&shopper, &[plain, seasonal], &context, &[], 5);
        assert_eq!(ranked[0].product_id, ProductId::from("P2"));
    }

    #[test]
    fn rank_filters_excludes_and_truncates() {
        let engine = ScoringEngine::new();
        let shopper = customer("C1");
        let products = vec![
            product("P1", "Fashion", "Jackets", 150, 5.0),
            product("P2", "Fashion", "Jackets", 150, 5.0),
            product("P3", "Fashion", "Jackets", 150, 4.0),
            product("P4", "Garden", "Hoses", 5000, 0.0),
        ];

        let ranked = engine.rank(&shopper, &products, &ContextSpec::None, &[ProductId::from("P1")], 2);

        let ids: Vec<_> = ranked.iter().map(|c| c.product_id.as_str()).collect();
        assert_eq!(ids, vec!["P2", "P3"]);
        assert!(ranked.iter().all(|c| c.score >= MIN_RECOMMENDATION_SCORE));
        assert!(ranked.iter().all(|c| c.summary.is_some()));
    }

    #[test]
    fn equal_scores_rank_by_product_id() {
        let engine = ScoringEngine::new();
        let shopper = customer("C1");
        let products =
            vec![product("P9", "Fashion", "Jackets", 150, 4.0), product("P1", "Fashion", "Jackets", 150, 4.0)];

        let ranked = engine.rank(&shopper, &products, &ContextSpec::None, &[], 5);
        assert_eq!(ranked[0].product_id, ProductId::from("P1"));
        assert_eq!(ranked[1].product_id, ProductId::from("P9"));
    }

    #[test]
    fn similar_products_exclude_subject_and_other_categories() {
        let engine = ScoringEngine::new();
        let subject = product("P1", "Electronics", "Smartphone", 999, 4.7);
        let pool = vec![
            subject.clone(),
            product("P2", "Electronics", "Smartphone", 899, 4.5),
            product("P3", "Electronics", "Tablet", 499, 4.0),
            product("P4", "Books", "Biography", 25, 4.4),
        ];

        let similar = engine.similar_products(&subject, &pool, 5);
        let ids: Vec<_> = similar.iter().map(|c| c.product_id.as_str()).collect();
        assert_eq!(ids, vec!["P2", "P3"]);
    }

    #[test]
    fn complements_prefer_co_occurrence_then_static_map() {
        let engine = ScoringEngine::new();
        let subject = product("P1", "Electronics", "Smartphone", 999, 4.7);
        let pool = vec![
            product("P2", "Books", "Biography", 25, 5.0),
            product("P3", "Fitness", "Resistance Bands", 30, 4.0),
            product("P4", "Electronics", "Tablet", 499, 4.0),
        ];

        let fallback = engine.complementary_products(&subject, &pool, &[], 5);
        let ids: Vec<_> = fallback.iter().map(|c| c.product_id.as_str()).collect();
        assert_eq!(ids, vec!["P3"], "static map pairs electronics with fitness");

        let pairings = vec![CategoryPairing {
            category: "Electronics".to_owned(),
            paired_category: "Books".to_owned(),
            co_occurrence_count: 12,
        }];
        let learned = engine.complementary_products(&subject, &pool, &pairings, 5);
        let ids: Vec<_> = learned.iter().map(|c| c.product_id.as_str()).collect();
        assert_eq!(ids, vec!["P2"]);
    }

    #[test]
    fn unknown_category_complements_fall_back_to_any_other_category() {
        let engine = ScoringEngine::new();
        let subject = product("P1", "Garden", "Hoses", 40, 4.0);
        let pool = vec![product("P2", "Books", "Biography", 25, 5.0), product("P3", "Garden", "Rakes", 20, 4.0)];

        let complements = engine.complementary_products(&subject, &pool, &[], 5);
        assert_eq!(complements.len(), 1);
        assert_eq!(complements[0].product_id, ProductId::from("P2"));
    }

    #[test]
    fn similar_customers_require_threshold() {
        let engine = ScoringEngine::new();
        let subject = customer("C1");
        let mut close = customer("C2");
        close.age = 33;
        let mut far = customer("C3");
        far.segment = "New Visitor".to_owned();
        far.location = "Boston".to_owned();

        let peers = engine.similar_customers(&subject, &[subject.clone(), close, far], 5);
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].customer_id, CustomerId::from("C2"));
        assert!((peers[0].similarity - 1.0).abs() < 1e-9);
    }
}
