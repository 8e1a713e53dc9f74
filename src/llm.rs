use std::{collections::HashMap, path::PathBuf, str::FromStr, sync::LazyLock};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::Receiver;

use crate::{
    APP_DATA_DIR, LLM_CHAT_TEMPERATURE_DEFAULT, LLM_MODEL_DEFAULT, LLM_PROVIDER_DEFAULT,
    error::{SbResult, StockbatchError},
    llm::provider::{ChatProvider, open_ai::OpenAiProvider},
};

#[derive(Debug, Default, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[strum(ascii_case_insensitive)]
pub enum Protocol {
    #[default]
    OpenAI,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Config {
    protocol: Protocol,
    base_url: String,
    api_key: String,
    model: String,
}

/// Effective provider/model pair for one chat call
#[derive(Clone, Debug, PartialEq)]
pub struct ChatRoute {
    pub provider: String,
    pub model: String,
}

#[derive(Debug)]
pub enum ChatCompletionEvent {
    Content(String),
    ReasoningContent(String),
    Error(StockbatchError),
}

pub struct ChatCompletionOptions {
    pub temperature: f64,
}

pub struct ChatCompletionStream {
    receiver: Receiver<ChatCompletionEvent>,
}

#[derive(Clone, Debug)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub reasoning: Option<String>,
}

#[allow(dead_code)]
#[derive(strum::Display, strum::EnumString, Copy, Clone, Debug, PartialEq)]
#[strum(ascii_case_insensitive)]
pub enum Role {
    Bot,
    User,
    System,
}

/// Resolution chain: explicit override, then process environment, then the
/// hardcoded defaults
pub fn resolve_route(provider_override: Option<&str>, model_override: Option<&str>) -> ChatRoute {
    let provider = provider_override
        .map(str::to_string)
        .or_else(|| std::env::var("DEFAULT_LLM_PROVIDER").ok())
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| LLM_PROVIDER_DEFAULT.to_string());

    let model = model_override
        .map(str::to_string)
        .or_else(|| std::env::var("DEFAULT_LLM_MODEL").ok())
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| LLM_MODEL_DEFAULT.to_string());

    ChatRoute { provider, model }
}

fn load_chat_provider() -> SbResult<OpenAiProvider> {
    let cfg: Config = confy::load_path(&*CHAT_CONFIG_PATH)?;

    Ok(match cfg.protocol {
        Protocol::OpenAI => OpenAiProvider::new(&cfg.base_url, &cfg.api_key, &cfg.model),
    })
}

pub async fn chat_completion_stream(
    messages: &[ChatMessage],
    options: &ChatCompletionOptions,
) -> SbResult<ChatCompletionStream> {
    load_chat_provider()?
        .chat_completion_stream(messages, options)
        .await
}

/// Chat through a named provider, overriding whatever the config file says
pub async fn chat_completion_routed(
    route: &ChatRoute,
    messages: &[ChatMessage],
    options: &ChatCompletionOptions,
) -> SbResult<ChatMessage> {
    let cfg: Config = confy::load_path(&*CHAT_CONFIG_PATH).unwrap_or_default();

    let base_url = match base_url_of(&route.provider) {
        Some(base_url) => base_url.to_string(),
        None => {
            if cfg.base_url.is_empty() {
                return Err(StockbatchError::NotExists(
                    "PROVIDER_NOT_EXISTS",
                    format!(
                        "Unknown LLM provider '{}' and no base_url is configured",
                        route.provider
                    ),
                ));
            }

            cfg.base_url.clone()
        }
    };

    let api_key = api_key_of(&route.provider).unwrap_or_else(|| cfg.api_key.clone());
    if api_key.is_empty() {
        return Err(StockbatchError::Required(
            "API_KEY_REQUIRED",
            format!("No API key for LLM provider '{}'", route.provider),
        ));
    }

    let provider = OpenAiProvider::new(&base_url, &api_key, &route.model);
    provider.chat_completion(messages, options).await
}

pub async fn config_chat(protocol: &str, options: &HashMap<String, String>) -> SbResult<()> {
    let mut cfg: Config = confy::load_path(&*CHAT_CONFIG_PATH).unwrap_or_default();

    cfg.protocol = Protocol::from_str(protocol)?;

    for (field, name) in [
        (&mut cfg.base_url, "base_url"),
        (&mut cfg.api_key, "api_key"),
        (&mut cfg.model, "model"),
    ] {
        if let Some(value) = options.get(name) {
            *field = value.trim().to_string();
        }

        if field.is_empty() {
            return Err(StockbatchError::Required(
                "OPTION_REQUIRED",
                format!("Required option '{name}' is missing"),
            ));
        }
    }

    confy::store_path(&*CHAT_CONFIG_PATH, &cfg)?;

    Ok(())
}

mod provider;

static CHAT_CONFIG_PATH: LazyLock<PathBuf> = LazyLock::new(|| APP_DATA_DIR.join("llm-chat.toml"));

fn base_url_of(provider: &str) -> Option<&'static str> {
    match provider.to_lowercase().as_str() {
        "deepseek" => Some("https://api.deepseek.com/v1"),
        "openai" => Some("https://api.openai.com/v1"),
        "dashscope" | "qwen" => Some("https://dashscope.aliyuncs.com/compatible-mode/v1"),
        "moonshot" | "kimi" => Some("https://api.moonshot.cn/v1"),
        _ => None,
    }
}

fn api_key_of(provider: &str) -> Option<String> {
    // e.g. DEEPSEEK_API_KEY, OPENAI_API_KEY
    let env_name = format!("{}_API_KEY", provider.to_uppercase().replace('-', "_"));

    std::env::var(env_name).ok().filter(|s| !s.is_empty())
}

impl Default for ChatCompletionOptions {
    fn default() -> Self {
        Self {
            temperature: LLM_CHAT_TEMPERATURE_DEFAULT,
        }
    }
}

impl ChatCompletionOptions {
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }
}

impl ChatCompletionStream {
    pub fn new(receiver: Receiver<ChatCompletionEvent>) -> Self {
        Self { receiver }
    }

    pub fn close(&mut self) {
        self.receiver.close()
    }

    pub async fn next(&mut self) -> Option<ChatCompletionEvent> {
        self.receiver.recv().await
    }
}
