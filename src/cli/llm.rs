use clap::Subcommand;

mod config;
mod test;

#[derive(Subcommand)]
pub enum LlmCommand {
    #[command(about = "Configure LLM provider")]
    Config(Box<config::LlmConfigCommand>),

    #[command(about = "Test the default LLM provider")]
    Test(Box<test::LlmTestCommand>),
}

impl LlmCommand {
    pub async fn exec(&self) {
        match self {
            LlmCommand::Config(cmd) => {
                cmd.exec().await;
            }
            LlmCommand::Test(cmd) => {
                cmd.exec().await;
            }
        }
    }
}

fn check_supported(value: &str, supported: &[&str], what: &str) -> bool {
    if supported.contains(&value) {
        true
    } else {
        println!(
            "Invalid {what} '{value}', available values: {}",
            supported.join("/")
        );

        false
    }
}
