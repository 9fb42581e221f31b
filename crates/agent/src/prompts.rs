//! Deterministic prompt assembly.
//!
//! The same subject, candidates, context and task always produce the same
//! text, so prompts can be asserted on in tests and diffed in logs.

use std::fmt::Write as _;

use smartshop_core::domain::analytics::CategoryAggregate;
use smartshop_core::domain::context::ContextSpec;
use smartshop_core::domain::customer::CustomerProfile;
use smartshop_core::domain::product::ProductRecord;
use smartshop_core::domain::recommendation::{sort_candidates, RecommendationCandidate};

use crate::results::AgentRole;

pub const DEFAULT_ITEM_CAP: usize = 20;

/// The record a prompt is about.
#[derive(Clone, Copy, Debug)]
pub enum PromptSubject<'a> {
    Customer(&'a CustomerProfile),
    Product(&'a ProductRecord),
    /// A product together with statistics for the category it belongs to.
    ProductInCategory(&'a ProductRecord, &'a CategoryAggregate),
    Category(&'a CategoryAggregate),
}

/// What the model is asked to produce.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PromptTask {
    pub instruction: String,
    /// Narrative sections, in the order the model should write them.
    pub sections: Vec<&'static str>,
    /// Sections whose body is a list of `ITEM:` lines.
    pub item_sections: Vec<&'static str>,
    pub wants_tags: bool,
}

impl PromptTask {
    pub fn new(instruction: impl Into<String>) -> Self {
        Self {
            instruction: instruction.into(),
            sections: Vec::new(),
            item_sections: Vec::new(),
            wants_tags: false,
        }
    }

    pub fn section(mut self, name: &'static str) -> Self {
        self.sections.push(name);
        self
    }

    pub fn item_section(mut self, name: &'static str) -> Self {
        self.item_sections.push(name);
        self
    }

    pub fn with_tags(mut self) -> Self {
        self.wants_tags = true;
        self
    }

    /// Every header the model is told to use, narrative sections first.
    pub fn headers(&self) -> Vec<&'static str> {
        self.sections.iter().chain(self.item_sections.iter()).copied().collect()
    }
}

#[derive(Clone, Debug)]
pub struct PromptBuilder {
    item_cap: usize,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_ITEM_CAP)
    }
}

impl PromptBuilder {
    pub fn new(item_cap: usize) -> Self {
        Self { item_cap: item_cap.max(1) }
    }

    pub fn item_cap(&self) -> usize {
        self.item_cap
    }

    pub fn build(
        &self,
        role: AgentRole,
        subject: &PromptSubject<'_>,
        candidates: &[RecommendationCandidate],
        context: &ContextSpec,
        task: &PromptTask,
    ) -> String {
        let mut prompt = String::new();
        prompt.push_str(preamble(role));
        prompt.push_str("\n\n## Subject\n");
        for (key, value) in subject_fields(subject) {
            let _ = writeln!(prompt, "{key}: {}", sanitize(&value));
        }

        if !candidates.is_empty() {
            prompt.push_str("\n## Candidates\n");
            for (position, candidate) in self.capped(candidates).iter().enumerate() {
                let _ = writeln!(prompt, "{}. {}", position + 1, candidate_line(candidate));
            }
        }

        if let Some(description) = context.describe() {
            let _ = write!(prompt, "\n## Context\n{}\n", sanitize(&description));
        }

        let _ = write!(prompt, "\n## Task\n{}\n", sanitize(&task.instruction));
        prompt.push_str(&output_format(task));
        prompt
    }

    /// Candidates as they appear in the prompt: re-ranked and truncated once
    /// the list exceeds the cap, untouched otherwise.
    pub fn capped(&self, candidates: &[RecommendationCandidate]) -> Vec<RecommendationCandidate> {
        let mut listed = candidates.to_vec();
        if listed.len() > self.item_cap {
            sort_candidates(&mut listed);
            listed.truncate(self.item_cap);
        }
        listed
    }
}

fn preamble(role: AgentRole) -> &'static str {
    match role {
        AgentRole::Recommendation => {
            "You are the recommendation agent of an online shop. You explain why the listed \
             products suit this shopper and write a short shopping guide. Only mention products \
             from the candidate list."
        }
        AgentRole::Product => {
            "You are the product analysis agent of an online shop. You describe products and \
             categories for shoppers, using only the facts listed below."
        }
        AgentRole::Customer => {
            "You are the customer insight agent of an online shop. You summarise a shopper's \
             profile, browsing and purchase behaviour, using only the facts listed below."
        }
    }
}

fn subject_fields(subject: &PromptSubject<'_>) -> Vec<(&'static str, String)> {
    match subject {
        PromptSubject::Customer(customer) => vec![
            ("customer_id", customer.id.to_string()),
            ("age", customer.age.to_string()),
            ("age_band", customer.age_band()),
            ("gender", customer.gender.clone()),
            ("location", customer.location.clone()),
            ("segment", customer.segment.clone()),
            ("avg_order_value", customer.avg_order_value.to_string()),
            ("preferred_price_band", customer.preferred_price_band().as_str().to_string()),
            ("browsing_history", join_or_none(&customer.browsing_history)),
            ("purchase_history", join_or_none(&customer.purchase_history)),
        ],
        PromptSubject::Product(product) => product_fields(product),
        PromptSubject::ProductInCategory(product, aggregate) => {
            let mut fields = product_fields(product);
            fields.extend(category_stats(aggregate));
            fields
        }
        PromptSubject::Category(aggregate) => vec![
            ("category", aggregate.category.clone()),
            ("product_count", aggregate.product_count.to_string()),
            ("average_price", aggregate.average_price.round_dp(2).to_string()),
            ("min_price", aggregate.min_price.to_string()),
            ("max_price", aggregate.max_price.to_string()),
            ("average_rating", format!("{:.2}", aggregate.average_rating)),
            ("subcategories", join_or_none(&aggregate.subcategories)),
            (
                "price_trend",
                join_or_none(
                    &aggregate
                        .price_trend
                        .iter()
                        .map(|point| format!("{}={}", point.period, point.average_price.round_dp(2)))
                        .collect::<Vec<_>>(),
                ),
            ),
            (
                "trending_products",
                join_or_none(
                    &aggregate
                        .trending_products
                        .iter()
                        .map(|product| {
                            format!("{} ({} {}, {:.1})", product.product_id, product.brand, product.subcategory, product.rating)
                        })
                        .collect::<Vec<_>>(),
                ),
            ),
        ],
    }
}

fn product_fields(product: &ProductRecord) -> Vec<(&'static str, String)> {
    vec![
        ("product_id", product.id.to_string()),
        ("category", product.category.clone()),
        ("subcategory", product.subcategory.clone()),
        ("brand", product.brand.clone()),
        ("price", product.price.to_string()),
        ("price_band", product.price_band().as_str().to_string()),
        ("rating", format!("{:.1}", product.rating)),
        ("avg_similar_rating", format!("{:.1}", product.avg_similar_rating)),
        ("sentiment_score", format!("{:.2}", product.sentiment_score)),
        (
            "seasons",
            join_or_none(
                &product.seasons.iter().map(|season| season.to_string()).collect::<Vec<_>>(),
            ),
        ),
        ("occasions", join_or_none(&product.occasions)),
    ]
}

/// Category figures listed next to a product, prefixed so they do not read
/// as properties of the product itself.
fn category_stats(aggregate: &CategoryAggregate) -> Vec<(&'static str, String)> {
    vec![
        ("category_product_count", aggregate.product_count.to_string()),
        ("category_average_price", aggregate.average_price.round_dp(2).to_string()),
        ("category_min_price", aggregate.min_price.to_string()),
        ("category_max_price", aggregate.max_price.to_string()),
        ("category_average_rating", format!("{:.2}", aggregate.average_rating)),
        (
            "category_trending_products",
            join_or_none(
                &aggregate
                    .trending_products
                    .iter()
                    .map(|product| product.product_id.to_string())
                    .collect::<Vec<_>>(),
            ),
        ),
    ]
}

fn candidate_line(candidate: &RecommendationCandidate) -> String {
    let mut line = format!("id: {}", candidate.product_id);
    if let Some(summary) = &candidate.summary {
        let _ = write!(
            line,
            " | category: {} | subcategory: {} | brand: {} | price: {} | rating: {:.1}",
            sanitize(&summary.category),
            sanitize(&summary.subcategory),
            sanitize(&summary.brand),
            summary.price,
            summary.rating
        );
    }
    let _ = write!(line, " | score: {:.2}", candidate.score);
    line
}

fn output_format(task: &PromptTask) -> String {
    let mut format = String::from("\n## Output format\nUse exactly these section headers:\n");
    for name in task.headers() {
        let _ = writeln!(format, "### {name}");
    }
    if !task.item_sections.is_empty() {
        let _ = write!(
            format,
            "Under {}, write one line per product:\nITEM: <product_id> || SCORE: <0.00-1.00> || REASON: <text>\n",
            task.item_sections.join(" and ")
        );
    }
    if task.wants_tags {
        format.push_str("Finish with one line of comma separated keywords:\nTAGS: <tag>, <tag>\n");
    }
    format
}

fn join_or_none(values: &[String]) -> String {
    if values.is_empty() {
        "none".to_string()
    } else {
        values.join(", ")
    }
}

/// Keeps every value on a single line so record fields cannot forge headers.
fn sanitize(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}
