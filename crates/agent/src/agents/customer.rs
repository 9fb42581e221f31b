use async_trait::async_trait;

use smartshop_core::domain::context::ContextSpec;

use super::{log_degraded, AgentRequest, AgentToolkit, SpecializedAgent};
use crate::prompts::{PromptSubject, PromptTask};
use crate::results::{AgentResult, AgentRole, CustomerInsight};

const PROFILE: &str = "PROFILE";
const BROWSING: &str = "BROWSING";
const PURCHASES: &str = "PURCHASES";
const INTERESTS: &str = "INTERESTS";

/// Summarises who the shopper is and finds look-alike customers.
pub struct CustomerAgent {
    toolkit: AgentToolkit,
}

impl CustomerAgent {
    pub fn new(toolkit: AgentToolkit) -> Self {
        Self { toolkit }
    }

    fn task() -> PromptTask {
        PromptTask::new(
            "Summarise this shopper's profile, what their browsing shows, what their purchases \
             show, and list their main interests as a comma separated list under INTERESTS.",
        )
        .section(PROFILE)
        .section(BROWSING)
        .section(PURCHASES)
        .section(INTERESTS)
    }
}

#[async_trait]
impl SpecializedAgent for CustomerAgent {
    fn role(&self) -> AgentRole {
        AgentRole::Customer
    }

    async fn run(&self, request: &AgentRequest) -> AgentResult {
        let Some(customer) = request.customer.as_ref() else {
            return AgentResult::Customer(CustomerInsight::default());
        };

        let mut insight = CustomerInsight {
            customer_id: Some(customer.id.clone()),
            similar_customers: self.toolkit.scoring().similar_customers(
                customer,
                &request.peers,
                self.toolkit.limits().similar_customer_limit,
            ),
            ..CustomerInsight::default()
        };

        let task = Self::task();
        let prompt = self.toolkit.prompt(
            self.role(),
            &PromptSubject::Customer(customer),
            &[],
            &ContextSpec::None,
            &task,
        );

        match self.toolkit.ask(self.role(), request.request_id, &prompt, &task).await {
            Ok(reply) => {
                insight.profile_summary = reply.section(PROFILE).map(str::to_string);
                insight.browsing_patterns = reply.section(BROWSING).map(str::to_string);
                insight.purchase_patterns = reply.section(PURCHASES).map(str::to_string);
                insight.interests = reply.section(INTERESTS).map(split_interests).unwrap_or_default();
                insight.narrative = reply.narrative;
            }
            Err(error) => {
                log_degraded(request.request_id, self.role(), &error);
                insight.degradation = Some(error.kind());
            }
        }

        AgentResult::Customer(insight)
    }
}

fn split_interests(body: &str) -> Vec<String> {
    let mut interests: Vec<String> = Vec::new();
    for interest in body
        .split(|c: char| c == ',' || c == '\n')
        .map(|value| value.trim().trim_start_matches(|c: char| matches!(c, '-' | '*' | '•')).trim())
        .filter(|value| !value.is_empty())
    {
        if !interests.iter().any(|existing| existing.eq_ignore_ascii_case(interest)) {
            interests.push(interest.to_string());
        }
    }
    interests
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use smartshop_core::config::AppConfig;
    use smartshop_core::domain::context::ContextSpec;
    use uuid::Uuid;

    use super::{split_interests, CustomerAgent};
    use crate::agents::testing::{customer, ScriptedLlm};
    use crate::agents::{AgentRequest, AgentToolkit, SpecializedAgent};
    use crate::llm::{LlmError, LlmFailureKind};
    use crate::results::{AgentResult, Feature};

    fn request() -> AgentRequest {
        let mut request = AgentRequest::new(Uuid::nil(), Feature::AnalyzeCustomer, ContextSpec::None);
        request.customer = Some(customer("C1", &["Electronics"], &["Smartphones"]));
        let mut far = customer("C3", &[], &[]);
        far.segment = "Occasional".to_string();
        far.location = "Oslo".to_string();
        far.age = 70;
        request.peers = vec![customer("C2", &["Books"], &[]), far];
        request
    }

    #[tokio::test]
    async fn sections_and_similar_customers_are_filled() {
        let llm = Arc::new(ScriptedLlm::replying(
            "### PROFILE\nTech savvy.\n### BROWSING\nGadgets.\n### PURCHASES\nPhones.\n### INTERESTS\nGadgets, phones, gadgets",
        ));
        let agent = CustomerAgent::new(AgentToolkit::new(llm.clone(), &AppConfig::default()));

        let AgentResult::Customer(insight) = agent.run(&request()).await else {
            panic!("customer agent should return a customer insight");
        };

        assert_eq!(insight.profile_summary.as_deref(), Some("Tech savvy."));
        assert_eq!(insight.purchase_patterns.as_deref(), Some("Phones."));
        assert_eq!(insight.interests, vec!["Gadgets".to_string(), "phones".to_string()]);
        assert_eq!(insight.similar_customers.len(), 1);
        assert_eq!(insight.similar_customers[0].customer_id.as_str(), "C2");
        assert_eq!(insight.degradation, None);
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn llm_failure_keeps_similar_customers() {
        let llm = Arc::new(ScriptedLlm::failing(LlmError::Unreachable("refused".to_string())));
        let agent = CustomerAgent::new(AgentToolkit::new(llm, &AppConfig::default()));

        let AgentResult::Customer(insight) = agent.run(&request()).await else {
            panic!("customer agent should return a customer insight");
        };

        assert!(insight.narrative.is_empty());
        assert_eq!(insight.degradation, Some(LlmFailureKind::Unreachable));
        assert_eq!(insight.similar_customers.len(), 1);
    }

    #[tokio::test]
    async fn missing_customer_skips_the_llm() {
        let llm = Arc::new(ScriptedLlm::replying("unused"));
        let agent = CustomerAgent::new(AgentToolkit::new(llm.clone(), &AppConfig::default()));
        let request = AgentRequest::new(Uuid::nil(), Feature::AnalyzeCustomer, ContextSpec::None);

        let result = agent.run(&request).await;
        assert!(result.narrative().is_empty());
        assert_eq!(llm.calls(), 0);
    }

    #[test]
    fn interests_accept_lists_and_bullets() {
        assert_eq!(
            split_interests("- Running\n- Yoga, running"),
            vec!["Running".to_string(), "Yoga".to_string()]
        );
    }
}
