//! Agent orchestration for SmartShop recommendations.
//!
//! This crate turns catalog data into shopper-facing insight:
//! - `llm` talks to an Ollama-compatible completion endpoint
//! - `prompts` builds deterministic prompts from records
//! - `parser` reads sections, scored items and tags out of free-form replies
//! - `agents` holds the recommendation, product and customer agents
//! - `coordinator` reads the data once, dispatches agents and merges results
//!
//! # Safety Principle
//!
//! The LLM only explains. Every ranked list is produced by the scoring engine
//! in `smartshop-core`; model scores are kept alongside, never in place of,
//! the engine score. A model failure degrades a result, it never fails a request.

pub mod agents;
pub mod coordinator;
pub mod llm;
pub mod parser;
pub mod prompts;
pub mod results;

pub use agents::{AgentRequest, AgentToolkit, SpecializedAgent};
pub use coordinator::{merge_results, CoordinationAgent};
pub use llm::{CompletionConfig, LlmClient, LlmError, LlmFailureKind, OllamaClient};
pub use parser::{ParsedItem, ParsedReply, ResponseParser};
pub use prompts::{PromptBuilder, PromptSubject, PromptTask};
pub use results::{
    AgentResult, AgentRole, CompositeResult, CustomerInsight, Feature, ProductFocus,
    ProductInsight, RecommendationSet,
};
