use std::io::{Write, stdout};

use colored::Colorize;
use stockbatch::{VecOptions, api, api::*};

use crate::cli::llm::check_supported;

#[derive(clap::Args)]
pub struct LlmTestCommand {
    #[arg(
        short = 'L',
        long = "llm-option",
        help = "Additional option passed to LLM, e.g. -L temperature:0.6"
    )]
    llm_options: Vec<String>,

    #[arg(
        short = 's',
        long = "system",
        help = "System prompt to prepend, none by default"
    )]
    system: Option<String>,

    #[arg(
        short = 't',
        long = "type",
        default_value = "chat",
        help = "LLM provider's type, currently supported types: chat"
    )]
    r#type: String,

    prompt: String,
}

impl LlmTestCommand {
    pub async fn exec(&self) {
        if !check_supported(&self.r#type, &api::LLM_SUPPORTED_TYPES, "type") {
            return;
        }

        let mut options = ChatCompletionOptions::default();
        if let Some(temperature) = VecOptions(&self.llm_options)
            .get("temperature")
            .and_then(|s| s.parse().ok())
        {
            options = options.with_temperature(temperature);
        }

        match api::llm_chat_completion_stream(&self.prompt, self.system.as_deref(), &options).await
        {
            Ok(stream) => {
                render_stream(stream).await;
            }
            Err(err) => {
                println!("{}", err.to_string().red());
            }
        }
    }
}

/// Reasoning deltas print dimmed, then a blank line separates them from the
/// answer once it starts
async fn render_stream(mut stream: ChatCompletionStream) {
    let mut reasoning_open = false;

    while let Some(event) = stream.next().await {
        match event {
            ChatCompletionEvent::Content(delta) => {
                if reasoning_open {
                    reasoning_open = false;
                    print!("\n\n");
                }
                print!("{delta}");
            }
            ChatCompletionEvent::ReasoningContent(delta) => {
                reasoning_open = true;
                print!("{}", delta.bright_black());
            }
            ChatCompletionEvent::Error(err) => {
                println!("{}", err.to_string().red());
                break;
            }
        }

        stdout().flush().unwrap();
    }

    println!();
}
