use colored::Colorize;
use stockbatch::api;

#[derive(clap::Args)]
pub struct InfoCommand;

impl InfoCommand {
    pub async fn exec(&self) {
        let version = api::info::get_version().await;
        println!("Version: {}", version.cyan().bold());

        let route = api::info::get_default_llm_route().await;
        println!(
            "Default LLM: {}",
            format!("{}/{}", route.provider, route.model).cyan()
        );
    }
}
