use async_trait::async_trait;

use smartshop_core::domain::context::ContextSpec;

use super::{annotate, log_degraded, AgentRequest, AgentToolkit, SpecializedAgent};
use crate::prompts::{PromptSubject, PromptTask};
use crate::results::{AgentResult, AgentRole, RecommendationSet};

const GUIDE: &str = "GUIDE";
const ITEMS: &str = "ITEMS";

/// Ranks the catalog for one shopper and asks the model to explain the picks.
pub struct RecommendationAgent {
    toolkit: AgentToolkit,
}

impl RecommendationAgent {
    pub fn new(toolkit: AgentToolkit) -> Self {
        Self { toolkit }
    }

    fn task(context: &ContextSpec) -> PromptTask {
        let focus = match context {
            ContextSpec::None => String::new(),
            ContextSpec::Season(season) => format!(" Focus the guide on {season} shopping."),
            ContextSpec::Occasion(occasion) => format!(" Focus the guide on the {occasion} occasion."),
            ContextSpec::Category(category) => format!(" Focus the guide on {category}."),
        };
        PromptTask::new(format!(
            "Write a short personalised shopping guide under GUIDE. Under ITEMS, give one line for \
             each candidate with your own fit score and a one sentence reason. End with a few \
             tags describing the selection.{focus}"
        ))
        .section(GUIDE)
        .item_section(ITEMS)
        .with_tags()
    }
}

#[async_trait]
impl SpecializedAgent for RecommendationAgent {
    fn role(&self) -> AgentRole {
        AgentRole::Recommendation
    }

    async fn run(&self, request: &AgentRequest) -> AgentResult {
        let mut set = RecommendationSet { context: request.context.clone(), ..RecommendationSet::default() };
        let Some(customer) = request.customer.as_ref() else {
            return AgentResult::Recommendation(set);
        };

        set.candidates = self.toolkit.scoring().rank(
            customer,
            &request.catalog,
            &request.context,
            request.exclusions(),
            self.toolkit.limits().top_k,
        );

        let task = Self::task(&request.context);
        let prompt = self.toolkit.prompt(
            self.role(),
            &PromptSubject::Customer(customer),
            &set.candidates,
            &request.context,
            &task,
        );

        match self.toolkit.ask(self.role(), request.request_id, &prompt, &task).await {
            Ok(reply) => {
                annotate(&mut set.candidates, &reply, ITEMS);
                set.shopping_guide = reply.section(GUIDE).map(str::to_string);
                set.tags = reply.tags.clone();
                set.narrative = reply.narrative;
            }
            Err(error) => {
                log_degraded(request.request_id, self.role(), &error);
                set.degradation = Some(error.kind());
            }
        }

        AgentResult::Recommendation(set)
    }
}
