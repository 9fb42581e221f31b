use async_trait::async_trait;

use smartshop_core::domain::analytics::CategoryAggregate;
use smartshop_core::domain::context::ContextSpec;
use smartshop_core::domain::product::ProductRecord;

use super::{annotate, log_degraded, AgentRequest, AgentToolkit, SpecializedAgent};
use crate::prompts::{PromptSubject, PromptTask};
use crate::results::{AgentResult, AgentRole, ProductFocus, ProductInsight};

const REPORT: &str = "REPORT";
const SIMILAR: &str = "SIMILAR";
const COMPLEMENTARY: &str = "COMPLEMENTARY";
const CATEGORY: &str = "CATEGORY";
const INSIGHT: &str = "INSIGHT";
const TRENDS: &str = "TRENDS";

/// Describes one product, or a whole category when no product is given.
pub struct ProductAgent {
    toolkit: AgentToolkit,
}

impl ProductAgent {
    pub fn new(toolkit: AgentToolkit) -> Self {
        Self { toolkit }
    }

    async fn analyze_product(&self, request: &AgentRequest, subject: &ProductRecord) -> ProductInsight {
        let limits = self.toolkit.limits();
        let scoring = self.toolkit.scoring();
        let mut insight = ProductInsight::empty(ProductFocus::Product(subject.id.clone()));
        insight.similar_products = scoring.similar_products(subject, &request.catalog, limits.similar_limit);
        insight.complementary_products = scoring.complementary_products(
            subject,
            &request.catalog,
            &request.pairings,
            limits.complementary_limit,
        );
        insight.aggregate = request.aggregate.clone();

        let listed: Vec<_> = insight
            .similar_products
            .iter()
            .chain(insight.complementary_products.iter())
            .cloned()
            .collect();
        let stats = request.aggregate.as_ref().filter(|aggregate| !aggregate.is_empty());
        let mut task = PromptTask::new(match stats {
            Some(_) => {
                "Write a short report on this product. Under SIMILAR explain how the same-category \
                 candidates compare to it. Under COMPLEMENTARY explain which other-category \
                 candidates go well with it. Under CATEGORY use the category figures above to \
                 describe where it sits within its category."
            }
            None => {
                "Write a short report on this product. Under SIMILAR explain how the same-category \
                 candidates compare to it. Under COMPLEMENTARY explain which other-category \
                 candidates go well with it."
            }
        })
        .section(REPORT);
        if stats.is_some() {
            task = task.section(CATEGORY);
        }
        let task = task.item_section(SIMILAR).item_section(COMPLEMENTARY);
        let subject = match stats {
            Some(aggregate) => PromptSubject::ProductInCategory(subject, aggregate),
            None => PromptSubject::Product(subject),
        };
        let prompt = self.toolkit.prompt(self.role(), &subject, &listed, &ContextSpec::None, &task);

        match self.toolkit.ask(self.role(), request.request_id, &prompt, &task).await {
            Ok(reply) => {
                annotate(&mut insight.similar_products, &reply, SIMILAR);
                annotate(&mut insight.complementary_products, &reply, COMPLEMENTARY);
                insight.report = reply.section(REPORT).map(str::to_string);
                insight.similarity_notes = reply.section(SIMILAR).map(str::to_string);
                insight.complement_notes = reply.section(COMPLEMENTARY).map(str::to_string);
                insight.category_insight = reply.section(CATEGORY).map(str::to_string);
                insight.narrative = reply.narrative;
            }
            Err(error) => {
                log_degraded(request.request_id, self.role(), &error);
                insight.degradation = Some(error.kind());
            }
        }
        insight
    }

    async fn analyze_category(
        &self,
        request: &AgentRequest,
        category: &str,
        aggregate: Option<&CategoryAggregate>,
    ) -> ProductInsight {
        let mut insight = ProductInsight::empty(ProductFocus::Category(category.to_string()));
        let aggregate = match aggregate {
            Some(aggregate) if !aggregate.is_empty() => aggregate,
            other => {
                insight.aggregate =
                    Some(other.cloned().unwrap_or_else(|| CategoryAggregate::empty(category)));
                return insight;
            }
        };
        insight.aggregate = Some(aggregate.clone());

        let task = PromptTask::new(
            "Describe this category for shoppers under INSIGHT, then explain its price and \
             popularity trends under TRENDS.",
        )
        .section(INSIGHT)
        .section(TRENDS);
        let prompt = self.toolkit.prompt(
            self.role(),
            &PromptSubject::Category(aggregate),
            &[],
            &request.context,
            &task,
        );

        match self.toolkit.ask(self.role(), request.request_id, &prompt, &task).await {
            Ok(reply) => {
                insight.category_insight = reply.section(INSIGHT).map(str::to_string);
                insight.trend_analysis = reply.section(TRENDS).map(str::to_string);
                insight.narrative = reply.narrative;
            }
            Err(error) => {
                log_degraded(request.request_id, self.role(), &error);
                insight.degradation = Some(error.kind());
            }
        }
        insight
    }
}

#[async_trait]
impl SpecializedAgent for ProductAgent {
    fn role(&self) -> AgentRole {
        AgentRole::Product
    }

    async fn run(&self, request: &AgentRequest) -> AgentResult {
        let insight = match (&request.subject_product, &request.category) {
            (Some(subject), _) => self.analyze_product(request, subject).await,
            (None, Some(category)) => {
                self.analyze_category(request, category, request.aggregate.as_ref()).await
            }
            (None, None) => ProductInsight::empty(ProductFocus::Category(String::new())),
        };
        AgentResult::Product(insight)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use smartshop_core::config::AppConfig;
    use smartshop_core::domain::analytics::{CategoryAggregate, CategoryPairing};
    use smartshop_core::domain::context::ContextSpec;
    use uuid::Uuid;

    use super::ProductAgent;
    use crate::agents::testing::{product, ScriptedLlm};
    use crate::agents::{AgentRequest, AgentToolkit, SpecializedAgent};
    use crate::llm::{LlmError, LlmFailureKind};
    use crate::results::{AgentResult, Feature, ProductFocus, ProductInsight};

    fn catalog() -> Vec<smartshop_core::domain::product::ProductRecord> {
        vec![
            product("P1", "Electronics", "Smartphones", 699, 4.6),
            product("P2", "Electronics", "Smartphones", 649, 4.4),
            product("P3", "Electronics", "Headphones", 199, 4.1),
            product("P4", "Fitness", "Trackers", 129, 4.3),
            product("P5", "Books", "Fiction", 19, 4.8),
        ]
    }

    async fn run(agent: &ProductAgent, request: &AgentRequest) -> ProductInsight {
        match agent.run(request).await {
            AgentResult::Product(insight) => insight,
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[tokio::test]
    async fn subject_mode_scores_similar_and_complementary_products() {
        let llm = Arc::new(ScriptedLlm::replying(
            "### REPORT\nFlagship phone.\n### SIMILAR\nClose rivals.\nITEM: P2 || SCORE: 0.9 || REASON: Same tier\n### COMPLEMENTARY\nITEM: P4 || REASON: Tracks workouts\n### CATEGORY\nTop of range.",
        ));
        let agent = ProductAgent::new(AgentToolkit::new(llm.clone(), &AppConfig::default()));
        let mut request = AgentRequest::new(Uuid::nil(), Feature::AnalyzeProduct, ContextSpec::None);
        let catalog = catalog();
        request.subject_product = Some(catalog[0].clone());
        request.aggregate = Some(CategoryAggregate::from_products("Electronics", &catalog, Vec::new()));
        request.catalog = catalog;

        let insight = run(&agent, &request).await;

        assert_eq!(insight.focus, ProductFocus::Product("P1".into()));
        assert_eq!(insight.aggregate.as_ref().map(|aggregate| aggregate.product_count), Some(3));
        let prompt = llm.prompts().pop().expect("prompt should be recorded");
        assert!(prompt.contains("category_product_count: 3"));
        assert!(prompt.contains("### CATEGORY"));
        assert_eq!(insight.similar_products[0].product_id.as_str(), "P2");
        assert!(insight.similar_products.iter().all(|candidate| candidate.product_id.as_str() != "P1"));
        assert_eq!(insight.similar_products[0].explanation.as_deref(), Some("Same tier"));
        assert_eq!(insight.complementary_products[0].product_id.as_str(), "P4");
        assert_eq!(insight.complementary_products[0].explanation.as_deref(), Some("Tracks workouts"));
        assert_eq!(insight.report.as_deref(), Some("Flagship phone."));
        assert_eq!(insight.similarity_notes.as_deref(), Some("Close rivals."));
        assert_eq!(insight.category_insight.as_deref(), Some("Top of range."));
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn category_section_is_not_requested_without_figures() {
        let llm = Arc::new(ScriptedLlm::replying(
            "### REPORT\nFlagship phone.\n### CATEGORY\nBest in class, 40% cheaper than rivals.",
        ));
        let agent = ProductAgent::new(AgentToolkit::new(llm.clone(), &AppConfig::default()));
        let mut request = AgentRequest::new(Uuid::nil(), Feature::AnalyzeProduct, ContextSpec::None);
        let catalog = catalog();
        request.subject_product = Some(catalog[0].clone());
        request.catalog = catalog;

        let insight = run(&agent, &request).await;

        let prompt = llm.prompts().pop().expect("prompt should be recorded");
        assert!(!prompt.contains("### CATEGORY"));
        assert!(!prompt.contains("category_product_count"));
        assert_eq!(insight.category_insight, None);
        assert!(insight.aggregate.is_none());
    }

    #[tokio::test]
    async fn co_occurrence_pairings_override_the_static_map() {
        let llm = Arc::new(ScriptedLlm::failing(LlmError::Unreachable("down".to_string())));
        let agent = ProductAgent::new(AgentToolkit::new(llm, &AppConfig::default()));
        let mut request = AgentRequest::new(Uuid::nil(), Feature::AnalyzeProduct, ContextSpec::None);
        let catalog = catalog();
        request.subject_product = Some(catalog[0].clone());
        request.catalog = catalog;
        request.pairings = vec![CategoryPairing {
            category: "Electronics".to_string(),
            paired_category: "Books".to_string(),
            co_occurrence_count: 12,
        }];

        let insight = run(&agent, &request).await;

        assert_eq!(insight.degradation, Some(LlmFailureKind::Unreachable));
        assert!(insight.narrative.is_empty());
        let ids: Vec<&str> =
            insight.complementary_products.iter().map(|candidate| candidate.product_id.as_str()).collect();
        assert_eq!(ids, vec!["P5"]);
    }

    #[tokio::test]
    async fn category_mode_uses_the_aggregate() {
        let llm = Arc::new(ScriptedLlm::replying("### INSIGHT\nPhones lead.\n### TRENDS\nPrices are flat."));
        let agent = ProductAgent::new(AgentToolkit::new(llm.clone(), &AppConfig::default()));
        let catalog = catalog();
        let mut request = AgentRequest::new(Uuid::nil(), Feature::AnalyzeCategory, ContextSpec::None);
        request.category = Some("Electronics".to_string());
        request.aggregate = Some(CategoryAggregate::from_products("Electronics", &catalog, Vec::new()));

        let insight = run(&agent, &request).await;

        assert_eq!(insight.focus, ProductFocus::Category("Electronics".to_string()));
        assert_eq!(insight.category_insight.as_deref(), Some("Phones lead."));
        assert_eq!(insight.trend_analysis.as_deref(), Some("Prices are flat."));
        let aggregate = insight.aggregate.expect("aggregate should be attached");
        assert_eq!(aggregate.product_count, 3);
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn empty_category_skips_the_llm() {
        let llm = Arc::new(ScriptedLlm::replying("unused"));
        let agent = ProductAgent::new(AgentToolkit::new(llm.clone(), &AppConfig::default()));
        let mut request = AgentRequest::new(Uuid::nil(), Feature::AnalyzeCategory, ContextSpec::None);
        request.category = Some("Garden".to_string());
        request.aggregate = Some(CategoryAggregate::empty("Garden"));

        let insight = run(&agent, &request).await;

        assert!(insight.narrative.is_empty());
        assert_eq!(insight.degradation, None);
        assert!(insight.aggregate.is_some_and(|aggregate| aggregate.is_empty()));
        assert_eq!(llm.calls(), 0);
    }
}
