use clap::Subcommand;

mod analysts;
mod batch;
mod info;
mod llm;

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Analyze a batch of stock/fund symbols concurrently")]
    #[clap(visible_aliases = &["analyze"])]
    Batch(Box<batch::BatchCommand>),

    #[command(about = "Display all available analysts")]
    Analysts(Box<analysts::AnalystsCommand>),

    #[command(subcommand, about = "Configure or test the LLM provider")]
    Llm(llm::LlmCommand),

    #[command(about = "Display version information")]
    Info(Box<info::InfoCommand>),
}
