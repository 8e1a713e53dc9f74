use std::collections::HashMap;

use crate::{
    analyst,
    error::SbResult,
    llm::{self, ChatMessage, Role},
    symbol,
};

pub mod analysts;

pub use crate::analysis::{
    AnalysisInvoker, AnalysisParams, AnalysisReport, AnalysisRequest, DefaultValidator,
    LlmOverride, ParamsValidator, Prospect, llm_invoker::LlmInvoker,
};
pub use crate::analyst::Analyst;
pub use crate::batch::{
    BatchConfig, BatchController,
    task::{CompletionLogEntry, CompletionRecord, ProgressPulse, ProgressSnapshot, TaskStatus},
};
pub use crate::llm::{ChatCompletionEvent, ChatCompletionOptions, ChatCompletionStream, ChatRoute};
pub use crate::symbol::MarketType;

pub static LLM_SUPPORTED_PROTOCOLS: [&str; 1] = ["openai"];
pub static LLM_SUPPORTED_TYPES: [&str; 1] = ["chat"];

/// Controller wired with the LLM-backed invoker and the standard validator
pub fn batch_controller(config: BatchConfig) -> BatchController<LlmInvoker, DefaultValidator> {
    BatchController::new(LlmInvoker, DefaultValidator, config)
}

pub fn parse_symbols(text: &str) -> Vec<String> {
    symbol::parse_symbols(text)
}

pub fn parse_analysts(keys: &[String]) -> SbResult<Vec<Analyst>> {
    analyst::parse_analysts(keys)
}

pub async fn config_llm_chat(protocol: &str, options: &HashMap<String, String>) -> SbResult<()> {
    llm::config_chat(protocol, options).await
}

pub async fn llm_chat_completion_stream(
    prompt: &str,
    system: Option<&str>,
    options: &ChatCompletionOptions,
) -> SbResult<ChatCompletionStream> {
    let mut messages: Vec<ChatMessage> = vec![];

    if let Some(system) = system {
        messages.push(ChatMessage {
            role: Role::System,
            content: system.to_string(),
            reasoning: None,
        });
    }

    messages.push(ChatMessage {
        role: Role::User,
        content: prompt.to_string(),
        reasoning: None,
    });

    llm::chat_completion_stream(&messages, options).await
}

pub mod info {
    use crate::llm::{ChatRoute, resolve_route};

    pub async fn get_version() -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }

    /// The route a task without an explicit LLM override would use
    pub async fn get_default_llm_route() -> ChatRoute {
        resolve_route(None, None)
    }
}
