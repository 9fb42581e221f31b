//! Specialized agents and the toolkit they share.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};
use uuid::Uuid;

use smartshop_core::config::{AppConfig, OrchestrationConfig};
use smartshop_core::domain::analytics::{CategoryAggregate, CategoryPairing};
use smartshop_core::domain::context::ContextSpec;
use smartshop_core::domain::customer::CustomerProfile;
use smartshop_core::domain::product::{ProductId, ProductRecord};
use smartshop_core::domain::recommendation::RecommendationCandidate;
use smartshop_core::scoring::ScoringEngine;

use crate::llm::{CompletionConfig, LlmClient, LlmError};
use crate::parser::{ParsedReply, ResponseParser};
use crate::prompts::{PromptBuilder, PromptSubject, PromptTask};
use crate::results::{AgentResult, AgentRole, Feature};

pub mod customer;
pub mod product;
pub mod recommendation;

pub use customer::CustomerAgent;
pub use product::ProductAgent;
pub use recommendation::RecommendationAgent;

/// Read-only snapshot of everything an agent may look at for one request.
///
/// Built once by the coordinator before dispatch and shared behind an `Arc`,
/// so agents never read the gateway themselves.
#[derive(Clone, Debug)]
pub struct AgentRequest {
    pub request_id: Uuid,
    pub feature: Feature,
    pub context: ContextSpec,
    pub customer: Option<CustomerProfile>,
    pub subject_product: Option<ProductRecord>,
    /// Category under analysis in category mode.
    pub category: Option<String>,
    pub catalog: Vec<ProductRecord>,
    pub peers: Vec<CustomerProfile>,
    pub aggregate: Option<CategoryAggregate>,
    pub pairings: Vec<CategoryPairing>,
}

impl AgentRequest {
    pub fn new(request_id: Uuid, feature: Feature, context: ContextSpec) -> Self {
        Self {
            request_id,
            feature,
            context,
            customer: None,
            subject_product: None,
            category: None,
            catalog: Vec::new(),
            peers: Vec::new(),
            aggregate: None,
            pairings: Vec::new(),
        }
    }

    /// Products the customer already owns.
    pub fn exclusions(&self) -> &[ProductId] {
        self.customer.as_ref().map(|customer| customer.purchased_products.as_slice()).unwrap_or(&[])
    }
}

#[async_trait]
pub trait SpecializedAgent: Send + Sync {
    fn role(&self) -> AgentRole;

    /// Never fails. LLM problems surface as a degradation marker on the result.
    async fn run(&self, request: &AgentRequest) -> AgentResult;
}

/// Prompt, completion, parsing and scoring, bundled for the agents.
#[derive(Clone)]
pub struct AgentToolkit {
    llm: Arc<dyn LlmClient>,
    completion: CompletionConfig,
    max_retries: u32,
    prompts: PromptBuilder,
    parser: ResponseParser,
    scoring: ScoringEngine,
    limits: OrchestrationConfig,
}

impl AgentToolkit {
    pub fn new(llm: Arc<dyn LlmClient>, config: &AppConfig) -> Self {
        Self {
            llm,
            completion: CompletionConfig::from_llm_config(&config.llm),
            max_retries: config.llm.max_retries,
            prompts: PromptBuilder::new(config.orchestration.prompt_item_cap),
            parser: ResponseParser::new(),
            scoring: ScoringEngine::with_weights(config.scoring.weights, config.scoring.min_score),
            limits: config.orchestration.clone(),
        }
    }

    pub fn scoring(&self) -> &ScoringEngine {
        &self.scoring
    }

    pub fn limits(&self) -> &OrchestrationConfig {
        &self.limits
    }

    pub fn completion(&self) -> &CompletionConfig {
        &self.completion
    }

    pub fn prompt(
        &self,
        role: AgentRole,
        subject: &PromptSubject<'_>,
        candidates: &[RecommendationCandidate],
        context: &ContextSpec,
        task: &PromptTask,
    ) -> String {
        self.prompts.build(role, subject, candidates, context, task)
    }

    /// Sends `prompt` and parses the reply, recognising only the headers
    /// `task` asked for.
    ///
    /// Every attempt is bounded by the configured timeout. Transient failures
    /// are retried up to `llm.max_retries` times.
    pub async fn ask(
        &self,
        role: AgentRole,
        request_id: Uuid,
        prompt: &str,
        task: &PromptTask,
    ) -> Result<ParsedReply, LlmError> {
        let headers = task.headers();
        let mut attempt = 0;
        loop {
            match self.complete_once(prompt).await {
                Ok(text) => {
                    debug!(
                        event_name = "agent.llm.completed",
                        request_id = %request_id,
                        role = role.as_str(),
                        attempt,
                        chars = text.len(),
                        "llm completion received"
                    );
                    return Ok(self.parser.parse_expecting(role, &text, &headers));
                }
                Err(error) if error.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        event_name = "agent.llm.retry",
                        request_id = %request_id,
                        role = role.as_str(),
                        attempt,
                        error = %error,
                        "retrying llm completion"
                    );
                }
                Err(error) => return Err(error),
            }
        }
    }

    async fn complete_once(&self, prompt: &str) -> Result<String, LlmError> {
        let timeout = self.completion.timeout;
        let text = tokio::time::timeout(timeout, self.llm.complete(prompt, &self.completion))
            .await
            .map_err(|_| LlmError::Timeout(timeout))??;
        if text.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(text)
    }
}

pub(crate) fn log_degraded(request_id: Uuid, role: AgentRole, error: &LlmError) {
    warn!(
        event_name = "agent.degraded",
        request_id = %request_id,
        role = role.as_str(),
        failure = ?error.kind(),
        error = %error,
        "llm unavailable, returning score-only result"
    );
}

/// Attaches model reasons and scores to engine-scored candidates.
///
/// The engine score stays authoritative. Items naming unknown products are ignored.
pub(crate) fn annotate(candidates: &mut [RecommendationCandidate], reply: &ParsedReply, section: &str) {
    for candidate in candidates.iter_mut() {
        let item = reply
            .items_in(section)
            .iter()
            .find(|item| item.product_id == candidate.product_id)
            .or_else(|| reply.find_item(&candidate.product_id));
        if let Some(item) = item {
            candidate.model_score = item.score;
            if let Some(reason) = &item.reason {
                candidate.explanation = Some(reason.clone());
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use rust_decimal::Decimal;

    use smartshop_core::domain::context::Season;
    use smartshop_core::domain::customer::{CustomerId, CustomerProfile};
    use smartshop_core::domain::product::{ProductId, ProductRecord};

    use crate::llm::{CompletionConfig, LlmClient, LlmError};

    /// Replays scripted replies in order, then repeats the fallback.
    pub struct ScriptedLlm {
        script: Mutex<VecDeque<Result<String, LlmError>>>,
        fallback: Result<String, LlmError>,
        delay: Option<Duration>,
        calls: AtomicUsize,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedLlm {
        pub fn replying(text: &str) -> Self {
            Self::with_fallback(Ok(text.to_string()))
        }

        pub fn failing(error: LlmError) -> Self {
            Self::with_fallback(Err(error))
        }

        pub fn with_fallback(fallback: Result<String, LlmError>) -> Self {
            Self {
                script: Mutex::new(VecDeque::new()),
                fallback,
                delay: None,
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn then(self, reply: Result<String, LlmError>) -> Self {
            if let Ok(mut script) = self.script.lock() {
                script.push_back(reply);
            }
            self
        }

        pub fn delayed(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn prompts(&self) -> Vec<String> {
            self.prompts.lock().map(|prompts| prompts.clone()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(&self, prompt: &str, _config: &CompletionConfig) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut prompts) = self.prompts.lock() {
                prompts.push(prompt.to_string());
            }
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let scripted = self.script.lock().ok().and_then(|mut script| script.pop_front());
            scripted.unwrap_or_else(|| self.fallback.clone())
        }
    }

    pub fn customer(id: &str, browsing: &[&str], purchases: &[&str]) -> CustomerProfile {
        CustomerProfile {
            id: CustomerId::from(id),
            age: 32,
            gender: "F".to_string(),
            location: "Austin".to_string(),
            segment: "Frequent Buyer".to_string(),
            avg_order_value: Decimal::new(150, 0),
            browsing_history: browsing.iter().map(|value| value.to_string()).collect(),
            purchase_history: purchases.iter().map(|value| value.to_string()).collect(),
            purchased_products: Vec::new(),
        }
    }

    pub fn product(id: &str, category: &str, subcategory: &str, price: i64, rating: f64) -> ProductRecord {
        ProductRecord {
            id: ProductId::from(id),
            category: category.to_string(),
            subcategory: subcategory.to_string(),
            brand: "Acme".to_string(),
            price: Decimal::new(price, 0),
            rating,
            avg_similar_rating: 4.0,
            sentiment_score: 0.5,
            seasons: Vec::new(),
            occasions: Vec::new(),
        }
    }

    pub fn seasonal(mut product: ProductRecord, season: Season) -> ProductRecord {
        product.seasons.push(season);
        product
    }
}
