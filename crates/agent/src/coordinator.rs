//! Presentation-facing entry points.
//!
//! Each call reads its primary entity first, snapshots the data every agent
//! needs, dispatches the agents for the feature, and merges their results.
//! Model failures degrade individual results; only a missing primary entity
//! or a gateway failure turns into an error.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, info, warn};
use uuid::Uuid;

use smartshop_core::config::AppConfig;
use smartshop_core::domain::context::{ContextSpec, Season};
use smartshop_core::domain::customer::{CustomerId, CustomerProfile};
use smartshop_core::domain::product::{ProductId, ProductRecord};
use smartshop_core::errors::{EntityKind, OrchestrationError};
use smartshop_core::flows::{LifecycleEvent, RequestLifecycle};
use smartshop_core::gateway::{CustomerFilter, DataGateway, GatewayError, ProductFilter};
use smartshop_core::scoring::ScoringEngine;

use crate::agents::{
    AgentRequest, AgentToolkit, CustomerAgent, ProductAgent, RecommendationAgent, SpecializedAgent,
};
use crate::llm::LlmClient;
use crate::results::{AgentResult, AgentRole, CompositeResult, Feature, ProductFocus};

pub struct CoordinationAgent<G> {
    gateway: Arc<G>,
    scoring: ScoringEngine,
    recommendation: RecommendationAgent,
    product: ProductAgent,
    customer: CustomerAgent,
    concurrent_dispatch: bool,
}

impl<G: DataGateway> CoordinationAgent<G> {
    pub fn new(gateway: Arc<G>, llm: Arc<dyn LlmClient>, config: &AppConfig) -> Self {
        let toolkit = AgentToolkit::new(llm, config);
        Self {
            gateway,
            scoring: toolkit.scoring().clone(),
            recommendation: RecommendationAgent::new(toolkit.clone()),
            product: ProductAgent::new(toolkit.clone()),
            customer: CustomerAgent::new(toolkit),
            concurrent_dispatch: config.orchestration.concurrent_dispatch,
        }
    }

    /// Personalised picks, a look at the best pick, and a profile summary.
    pub async fn recommend(
        &self,
        customer_id: &CustomerId,
        context: ContextSpec,
    ) -> Result<CompositeResult, OrchestrationError> {
        let mut run = RequestRun::start(Feature::Recommend, context.clone());
        let customer = self.load_customer(&mut run, customer_id).await?;
        let catalog = run.read(self.gateway.list_products(&ProductFilter::default()).await)?;
        let peers = run.read(self.gateway.list_customers(&CustomerFilter::default()).await)?;
        let top = self.top_product(&customer, &catalog, &context);
        let (pairings, aggregate) = match &top {
            Some(product) => (
                run.read(self.gateway.category_pairings(&product.category).await)?,
                Some(run.read(self.gateway.category_aggregate(&product.category).await)?),
            ),
            None => (Vec::new(), None),
        };

        let mut request = AgentRequest::new(run.request_id, run.feature, context);
        request.subject_product = top;
        request.customer = Some(customer);
        request.catalog = catalog;
        request.peers = peers;
        request.pairings = pairings;
        request.aggregate = aggregate;

        self.finish(
            run,
            request,
            &[AgentRole::Recommendation, AgentRole::Product, AgentRole::Customer],
        )
        .await
    }

    pub async fn analyze_customer(
        &self,
        customer_id: &CustomerId,
    ) -> Result<CompositeResult, OrchestrationError> {
        let mut run = RequestRun::start(Feature::AnalyzeCustomer, ContextSpec::None);
        let customer = self.load_customer(&mut run, customer_id).await?;
        let catalog = run.read(self.gateway.list_products(&ProductFilter::default()).await)?;
        let peers = run.read(self.gateway.list_customers(&CustomerFilter::default()).await)?;

        let mut request = AgentRequest::new(run.request_id, run.feature, ContextSpec::None);
        request.customer = Some(customer);
        request.catalog = catalog;
        request.peers = peers;

        self.finish(run, request, &[AgentRole::Recommendation, AgentRole::Customer]).await
    }

    pub async fn analyze_product(
        &self,
        product_id: &ProductId,
    ) -> Result<CompositeResult, OrchestrationError> {
        let mut run = RequestRun::start(Feature::AnalyzeProduct, ContextSpec::None);
        let product = match run.read(self.gateway.get_product(product_id).await)? {
            Some(product) => product,
            None => return Err(run.not_found(EntityKind::Product, product_id.as_str())),
        };
        let catalog = run.read(self.gateway.list_products(&ProductFilter::default()).await)?;
        let pairings = run.read(self.gateway.category_pairings(&product.category).await)?;
        let aggregate = run.read(self.gateway.category_aggregate(&product.category).await)?;

        let mut request = AgentRequest::new(run.request_id, run.feature, ContextSpec::None);
        request.subject_product = Some(product);
        request.catalog = catalog;
        request.pairings = pairings;
        request.aggregate = Some(aggregate);

        self.finish(run, request, &[AgentRole::Product]).await
    }

    /// Unknown categories produce an empty aggregate rather than an error.
    pub async fn analyze_category(
        &self,
        category: &str,
    ) -> Result<CompositeResult, OrchestrationError> {
        let mut run = RequestRun::start(Feature::AnalyzeCategory, ContextSpec::None);
        let category = category.trim().to_string();
        let aggregate = run.read(self.gateway.category_aggregate(&category).await)?;

        let mut request = AgentRequest::new(run.request_id, run.feature, ContextSpec::None);
        request.category = Some(category);
        request.aggregate = Some(aggregate);

        self.finish(run, request, &[AgentRole::Product]).await
    }

    /// Season-focused picks plus an overview of the best pick's category.
    pub async fn seasonal_recommend(
        &self,
        customer_id: &CustomerId,
        season: Season,
    ) -> Result<CompositeResult, OrchestrationError> {
        let context = ContextSpec::Season(season);
        let mut run = RequestRun::start(Feature::SeasonalRecommend, context.clone());
        let customer = self.load_customer(&mut run, customer_id).await?;
        let catalog = run.read(self.gateway.list_products(&ProductFilter::default()).await)?;
        let top_category =
            self.top_product(&customer, &catalog, &context).map(|product| product.category);
        let aggregate = match &top_category {
            Some(category) => Some(run.read(self.gateway.category_aggregate(category).await)?),
            None => None,
        };

        let mut request = AgentRequest::new(run.request_id, run.feature, context);
        request.customer = Some(customer);
        request.catalog = catalog;
        request.category = top_category;
        request.aggregate = aggregate;

        self.finish(run, request, &[AgentRole::Recommendation, AgentRole::Product]).await
    }

    async fn load_customer(
        &self,
        run: &mut RequestRun,
        customer_id: &CustomerId,
    ) -> Result<CustomerProfile, OrchestrationError> {
        match run.read(self.gateway.get_customer(customer_id).await)? {
            Some(customer) => Ok(customer),
            None => Err(run.not_found(EntityKind::Customer, customer_id.as_str())),
        }
    }

    /// Best-scoring product the customer does not already own.
    fn top_product(
        &self,
        customer: &CustomerProfile,
        catalog: &[ProductRecord],
        context: &ContextSpec,
    ) -> Option<ProductRecord> {
        let ranked =
            self.scoring.rank(customer, catalog, context, &customer.purchased_products, 1);
        let top = ranked.first()?;
        catalog.iter().find(|product| product.id == top.product_id).cloned()
    }

    fn agent(&self, role: AgentRole) -> &dyn SpecializedAgent {
        match role {
            AgentRole::Recommendation => &self.recommendation,
            AgentRole::Product => &self.product,
            AgentRole::Customer => &self.customer,
        }
    }

    async fn dispatch(&self, request: &Arc<AgentRequest>, roles: &[AgentRole]) -> Vec<AgentResult> {
        for role in roles {
            debug!(
                event_name = "orchestration.agent.dispatched",
                request_id = %request.request_id,
                role = role.as_str(),
                "agent dispatched"
            );
        }

        if self.concurrent_dispatch {
            join_all(roles.iter().map(|role| self.agent(*role).run(request))).await
        } else {
            let mut results = Vec::with_capacity(roles.len());
            for role in roles {
                results.push(self.agent(*role).run(request).await);
            }
            results
        }
    }

    async fn finish(
        &self,
        mut run: RequestRun,
        request: AgentRequest,
        roles: &[AgentRole],
    ) -> Result<CompositeResult, OrchestrationError> {
        let request = Arc::new(request);
        run.lifecycle.apply(LifecycleEvent::AgentsDispatched)?;
        let results = self.dispatch(&request, roles).await;
        run.lifecycle.apply(LifecycleEvent::AgentsJoined)?;

        let results = merge_results(results, request.exclusions());
        run.lifecycle.apply(LifecycleEvent::ResultsMerged)?;

        let degraded_roles: Vec<AgentRole> = results
            .iter()
            .filter(|result| result.degradation().is_some())
            .map(AgentResult::role)
            .collect();
        let state = run.lifecycle.apply(LifecycleEvent::ResultReturned)?;

        info!(
            event_name = "orchestration.request.completed",
            request_id = %run.request_id,
            feature = run.feature.as_str(),
            agents = results.len(),
            degraded = degraded_roles.len(),
            elapsed_ms = run.started.elapsed().as_millis() as u64,
            "request completed"
        );

        Ok(CompositeResult {
            request_id: run.request_id,
            feature: run.feature,
            customer_id: request.customer.as_ref().map(|customer| customer.id.clone()),
            product_id: match run.feature {
                Feature::AnalyzeProduct => {
                    request.subject_product.as_ref().map(|product| product.id.clone())
                }
                _ => None,
            },
            category: request.category.clone(),
            context: request.context.clone(),
            generated_at: Utc::now(),
            state,
            results,
            degraded_roles,
        })
    }
}

/// Orders results by role priority and removes duplicate candidates.
///
/// The product list drops the analysed product, the recommendation list drops
/// products in `exclusions`, and a product already listed by a higher
/// priority result is dropped from later lists with its first score kept.
pub fn merge_results(mut results: Vec<AgentResult>, exclusions: &[ProductId]) -> Vec<AgentResult> {
    results.sort_by_key(AgentResult::role);

    for result in &mut results {
        match result {
            AgentResult::Recommendation(set) => {
                set.candidates.retain(|candidate| !exclusions.contains(&candidate.product_id));
            }
            AgentResult::Product(insight) => {
                if let ProductFocus::Product(subject) = &insight.focus {
                    insight.similar_products.retain(|candidate| &candidate.product_id != subject);
                    insight
                        .complementary_products
                        .retain(|candidate| &candidate.product_id != subject);
                }
            }
            AgentResult::Customer(_) => {}
        }
    }

    let mut seen: HashSet<ProductId> = HashSet::new();
    for result in &mut results {
        for list in result.candidate_lists_mut() {
            list.retain(|candidate| seen.insert(candidate.product_id.clone()));
        }
    }
    results
}

struct RequestRun {
    request_id: Uuid,
    feature: Feature,
    lifecycle: RequestLifecycle,
    started: Instant,
}

impl RequestRun {
    fn start(feature: Feature, context: ContextSpec) -> Self {
        let request_id = Uuid::new_v4();
        info!(
            event_name = "orchestration.request.started",
            request_id = %request_id,
            feature = feature.as_str(),
            context = context.describe().as_deref().unwrap_or("none"),
            "request started"
        );
        Self {
            request_id,
            feature,
            lifecycle: RequestLifecycle::new(request_id.to_string()),
            started: Instant::now(),
        }
    }

    fn read<T>(&mut self, result: Result<T, GatewayError>) -> Result<T, OrchestrationError> {
        result.map_err(|error| {
            warn!(
                event_name = "orchestration.gateway.failed",
                request_id = %self.request_id,
                feature = self.feature.as_str(),
                error = %error,
                "data gateway read failed"
            );
            self.fail(LifecycleEvent::GatewayFailed, OrchestrationError::from(error))
        })
    }

    fn not_found(&mut self, entity: EntityKind, id: &str) -> OrchestrationError {
        info!(
            event_name = "orchestration.entity.not_found",
            request_id = %self.request_id,
            feature = self.feature.as_str(),
            entity = %entity,
            id,
            "primary entity not found"
        );
        self.fail(
            LifecycleEvent::PrimaryEntityMissing,
            OrchestrationError::NotFound { entity, id: id.to_string() },
        )
    }

    fn fail(&mut self, event: LifecycleEvent, error: OrchestrationError) -> OrchestrationError {
        match self.lifecycle.apply(event) {
            Ok(_) => error,
            Err(transition) => transition.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use smartshop_core::config::AppConfig;
    use smartshop_core::domain::analytics::{CategoryAggregate, CategoryPairing};
    use smartshop_core::domain::context::ContextSpec;
    use smartshop_core::domain::customer::{CustomerId, CustomerProfile};
    use smartshop_core::domain::product::{ProductId, ProductRecord};
    use smartshop_core::domain::recommendation::RecommendationCandidate;
    use smartshop_core::errors::OrchestrationError;
    use smartshop_core::gateway::{CustomerFilter, DataGateway, GatewayError, ProductFilter};

    use super::{merge_results, CoordinationAgent};
    use crate::agents::testing::ScriptedLlm;
    use crate::results::{AgentResult, ProductFocus, ProductInsight, RecommendationSet};

    struct BrokenGateway;

    #[async_trait]
    impl DataGateway for BrokenGateway {
        async fn get_customer(&self, _id: &CustomerId) -> Result<Option<CustomerProfile>, GatewayError> {
            Err(GatewayError::Backend("connection reset".to_string()))
        }

        async fn get_product(&self, _id: &ProductId) -> Result<Option<ProductRecord>, GatewayError> {
            Err(GatewayError::Backend("connection reset".to_string()))
        }

        async fn list_products(&self, _filter: &ProductFilter) -> Result<Vec<ProductRecord>, GatewayError> {
            Ok(Vec::new())
        }

        async fn list_customers(
            &self,
            _filter: &CustomerFilter,
        ) -> Result<Vec<CustomerProfile>, GatewayError> {
            Ok(Vec::new())
        }

        async fn category_aggregate(&self, _category: &str) -> Result<CategoryAggregate, GatewayError> {
            Err(GatewayError::Decode("bad price".to_string()))
        }

        async fn category_pairings(&self, _category: &str) -> Result<Vec<CategoryPairing>, GatewayError> {
            Ok(Vec::new())
        }
    }

    fn candidate(id: &str, score: f64) -> RecommendationCandidate {
        RecommendationCandidate::new(ProductId::from(id), score)
    }

    #[test]
    fn merge_orders_by_priority_and_keeps_first_duplicate() {
        let mut insight = ProductInsight::empty(ProductFocus::Product(ProductId::from("P1")));
        insight.similar_products = vec![candidate("P1", 1.0), candidate("P2", 0.4), candidate("P3", 0.5)];
        insight.complementary_products = vec![candidate("P9", 0.7)];
        let set = RecommendationSet {
            candidates: vec![candidate("P2", 0.9), candidate("P8", 0.8), candidate("P9", 0.6)],
            ..RecommendationSet::default()
        };

        let merged = merge_results(
            vec![AgentResult::Product(insight), AgentResult::Recommendation(set)],
            &[ProductId::from("P8")],
        );

        let AgentResult::Recommendation(set) = &merged[0] else {
            panic!("recommendation result should come first");
        };
        let ids: Vec<&str> = set.candidates.iter().map(|c| c.product_id.as_str()).collect();
        assert_eq!(ids, vec!["P2", "P9"]);
        assert!((set.candidates[0].score - 0.9).abs() < f64::EPSILON);

        let AgentResult::Product(insight) = &merged[1] else {
            panic!("product result should come second");
        };
        let similar: Vec<&str> = insight.similar_products.iter().map(|c| c.product_id.as_str()).collect();
        assert_eq!(similar, vec!["P3"]);
        assert!(insight.complementary_products.is_empty());
    }

    #[tokio::test]
    async fn gateway_failures_surface_as_errors_without_llm_calls() {
        let llm = Arc::new(ScriptedLlm::replying("unused"));
        let coordinator =
            CoordinationAgent::new(Arc::new(BrokenGateway), llm.clone(), &AppConfig::default());

        let error = coordinator.recommend(&CustomerId::from("C1"), ContextSpec::None).await;
        assert_eq!(error, Err(OrchestrationError::DataGateway("gateway backend failure: connection reset".to_string())));

        let error = coordinator.analyze_category("Books").await;
        assert!(matches!(error, Err(OrchestrationError::DataGateway(_))));
        assert_eq!(llm.calls(), 0);
    }
}
