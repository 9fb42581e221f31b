use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use smartshop_core::domain::analytics::CategoryAggregate;
use smartshop_core::domain::context::ContextSpec;
use smartshop_core::domain::customer::{CustomerId, SimilarCustomer};
use smartshop_core::domain::product::ProductId;
use smartshop_core::domain::recommendation::RecommendationCandidate;
use smartshop_core::flows::RequestState;

use crate::llm::LlmFailureKind;

/// Agent roles in merge priority order: earlier roles win duplicate candidates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Recommendation,
    Product,
    Customer,
}

impl AgentRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Recommendation => "recommendation",
            Self::Product => "product",
            Self::Customer => "customer",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Recommend,
    AnalyzeCustomer,
    AnalyzeProduct,
    AnalyzeCategory,
    SeasonalRecommend,
}

impl Feature {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Recommend => "recommend",
            Self::AnalyzeCustomer => "analyze_customer",
            Self::AnalyzeProduct => "analyze_product",
            Self::AnalyzeCategory => "analyze_category",
            Self::SeasonalRecommend => "seasonal_recommend",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerInsight {
    pub narrative: String,
    pub degradation: Option<LlmFailureKind>,
    pub customer_id: Option<CustomerId>,
    pub profile_summary: Option<String>,
    pub browsing_patterns: Option<String>,
    pub purchase_patterns: Option<String>,
    pub interests: Vec<String>,
    pub similar_customers: Vec<SimilarCustomer>,
}

/// What a product analysis is about.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ProductFocus {
    Product(ProductId),
    Category(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductInsight {
    pub narrative: String,
    pub degradation: Option<LlmFailureKind>,
    pub focus: ProductFocus,
    pub report: Option<String>,
    pub similarity_notes: Option<String>,
    pub complement_notes: Option<String>,
    pub category_insight: Option<String>,
    pub trend_analysis: Option<String>,
    pub similar_products: Vec<RecommendationCandidate>,
    pub complementary_products: Vec<RecommendationCandidate>,
    pub aggregate: Option<CategoryAggregate>,
}

impl ProductInsight {
    pub fn empty(focus: ProductFocus) -> Self {
        Self {
            narrative: String::new(),
            degradation: None,
            focus,
            report: None,
            similarity_notes: None,
            complement_notes: None,
            category_insight: None,
            trend_analysis: None,
            similar_products: Vec::new(),
            complementary_products: Vec::new(),
            aggregate: None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RecommendationSet {
    pub narrative: String,
    pub degradation: Option<LlmFailureKind>,
    pub context: ContextSpec,
    pub shopping_guide: Option<String>,
    pub candidates: Vec<RecommendationCandidate>,
    pub tags: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum AgentResult {
    Customer(CustomerInsight),
    Product(ProductInsight),
    Recommendation(RecommendationSet),
}

impl AgentResult {
    pub fn role(&self) -> AgentRole {
        match self {
            Self::Customer(_) => AgentRole::Customer,
            Self::Product(_) => AgentRole::Product,
            Self::Recommendation(_) => AgentRole::Recommendation,
        }
    }

    pub fn narrative(&self) -> &str {
        match self {
            Self::Customer(insight) => &insight.narrative,
            Self::Product(insight) => &insight.narrative,
            Self::Recommendation(set) => &set.narrative,
        }
    }

    pub fn degradation(&self) -> Option<LlmFailureKind> {
        match self {
            Self::Customer(insight) => insight.degradation,
            Self::Product(insight) => insight.degradation,
            Self::Recommendation(set) => set.degradation,
        }
    }

    /// Candidate lists in the order they take part in cross-result deduplication.
    pub fn candidate_lists_mut(&mut self) -> Vec<&mut Vec<RecommendationCandidate>> {
        match self {
            Self::Customer(_) => Vec::new(),
            Self::Product(insight) => {
                vec![&mut insight.similar_products, &mut insight.complementary_products]
            }
            Self::Recommendation(set) => vec![&mut set.candidates],
        }
    }
}

/// Everything one presentation call returns.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompositeResult {
    pub request_id: Uuid,
    pub feature: Feature,
    pub customer_id: Option<CustomerId>,
    pub product_id: Option<ProductId>,
    pub category: Option<String>,
    pub context: ContextSpec,
    pub generated_at: DateTime<Utc>,
    pub state: RequestState,
    pub results: Vec<AgentResult>,
    pub degraded_roles: Vec<AgentRole>,
}

impl CompositeResult {
    pub fn recommendations(&self) -> Option<&RecommendationSet> {
        self.results.iter().find_map(|result| match result {
            AgentResult::Recommendation(set) => Some(set),
            _ => None,
        })
    }

    pub fn product_insight(&self) -> Option<&ProductInsight> {
        self.results.iter().find_map(|result| match result {
            AgentResult::Product(insight) => Some(insight),
            _ => None,
        })
    }

    pub fn customer_insight(&self) -> Option<&CustomerInsight> {
        self.results.iter().find_map(|result| match result {
            AgentResult::Customer(insight) => Some(insight),
            _ => None,
        })
    }

    pub fn is_degraded(&self) -> bool {
        !self.degraded_roles.is_empty()
    }
}
