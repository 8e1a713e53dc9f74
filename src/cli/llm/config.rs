use colored::Colorize;
use stockbatch::{VecOptions, api};

use crate::cli::llm::check_supported;

#[derive(clap::Args)]
pub struct LlmConfigCommand {
    #[arg(
        short = 'O',
        long = "option",
        help = "LLM provider's option, e.g. -O base_url:https://api.deepseek.com/v1 -O api_key:sk-xxx -O model:deepseek-chat"
    )]
    options: Vec<String>,

    #[arg(
        short = 'p',
        long = "protocol",
        help = "LLM provider's protocol, the default value is openai"
    )]
    protocol: Option<String>,

    #[arg(
        short = 't',
        long = "type",
        help = "LLM provider's type, the default value is chat"
    )]
    r#type: Option<String>,
}

impl LlmConfigCommand {
    pub async fn exec(&self) {
        let protocol = self
            .protocol
            .as_deref()
            .unwrap_or(api::LLM_SUPPORTED_PROTOCOLS[0]);
        let r#type = self.r#type.as_deref().unwrap_or(api::LLM_SUPPORTED_TYPES[0]);

        if !check_supported(protocol, &api::LLM_SUPPORTED_PROTOCOLS, "protocol")
            || !check_supported(r#type, &api::LLM_SUPPORTED_TYPES, "type")
        {
            return;
        }

        let options = VecOptions(&self.options).into_map();
        match api::config_llm_chat(protocol, &options).await {
            Ok(_) => {
                println!(
                    "{}",
                    format!("LLM {type} provider '{protocol}' is configured").green()
                );
            }
            Err(err) => {
                println!("{}", err.to_string().red());
            }
        }
    }
}
