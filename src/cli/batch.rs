use std::str::FromStr;

use chrono::Local;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use stockbatch::{api, api::*, utils};
use tabled::settings::{Color, Width, measurement::Percent, object::Columns, peaker::Priority};
use tokio::time::Duration;

#[derive(clap::Args)]
pub struct BatchCommand {
    #[arg(
        short = 'a',
        long = "analyst",
        help = "Analyst to include, e.g. -a market -a news, all analysts are used by default"
    )]
    analysts: Vec<String>,

    #[arg(
        short = 'd',
        long = "date",
        help = "The analysis date, e.g. -d 2025-06-01, the default value is today"
    )]
    date: Option<String>,

    #[arg(
        short = 'm',
        long = "market",
        help = "Market type (a-share/hk/us), the default value is us"
    )]
    market: Option<String>,

    #[arg(
        short = 'r',
        long = "depth",
        help = "Research depth from 1 to 5, the default value is 3"
    )]
    depth: Option<u8>,

    #[arg(
        short = 'j',
        long = "jobs",
        help = "Max concurrent analyses, the default value is 4"
    )]
    jobs: Option<usize>,

    #[arg(
        long = "provider",
        help = "Override the LLM provider for this batch, e.g. --provider deepseek"
    )]
    provider: Option<String>,

    #[arg(
        long = "model",
        help = "Override the LLM model for this batch, e.g. --model deepseek-chat"
    )]
    model: Option<String>,

    #[arg(long = "no-sentiment", help = "Skip the market sentiment angle")]
    no_sentiment: bool,

    #[arg(long = "no-risk", help = "Skip the risk assessment angle")]
    no_risk: bool,

    #[arg(
        short = 'p',
        long = "prompt",
        help = "Extra instruction appended to the analysis prompt"
    )]
    prompt: Option<String>,

    #[arg(help = "Symbols to analyze, e.g. \"600036,000001 510300\"")]
    symbols: String,
}

impl BatchCommand {
    pub async fn exec(&self) {
        let analysis_date = if let Some(date_str) = &self.date {
            if utils::datetime::date_from_str(date_str).is_none() {
                println!(
                    "Can not parse '{}' as date, try format like '{}'",
                    date_str.yellow(),
                    Local::now()
                        .date_naive()
                        .format("%Y-%m-%d")
                        .to_string()
                        .green()
                );
                return;
            }

            date_str.clone()
        } else {
            utils::datetime::today().format("%Y-%m-%d").to_string()
        };

        let market_type = if let Some(market_str) = &self.market {
            match MarketType::from_str(market_str) {
                Ok(market_type) => market_type,
                Err(_) => {
                    println!(
                        "Invalid market '{}', available values: a-share/hk/us",
                        market_str.yellow()
                    );
                    return;
                }
            }
        } else {
            MarketType::default()
        };

        let analysts = if self.analysts.is_empty() {
            api::analysts::list().await
        } else {
            match api::parse_analysts(&self.analysts) {
                Ok(analysts) => analysts,
                Err(err) => {
                    println!("{}", err.to_string().red());
                    println!(
                        "[I] Run `{}` command to get analyst list",
                        "stockbatch analysts".green()
                    );
                    return;
                }
            }
        };

        let params = AnalysisParams {
            analysis_date,
            analysts,
            research_depth: self.depth.unwrap_or(3),
            market_type,
            include_sentiment: !self.no_sentiment,
            include_risk_assessment: !self.no_risk,
            custom_prompt: self.prompt.clone(),
        };

        let llm_config = if self.provider.is_some() || self.model.is_some() {
            Some(LlmOverride {
                llm_provider: self.provider.clone(),
                llm_model: self.model.clone(),
            })
        } else {
            None
        };

        let config = BatchConfig {
            max_concurrency: self.jobs.unwrap_or(4).max(1),
            ..BatchConfig::default()
        };
        let controller = api::batch_controller(config);

        let symbols = controller.parse_symbols(&self.symbols);
        if symbols.is_empty() {
            println!("No symbols to analyze");
            return;
        }

        let task_ids = controller.start_batch_analysis(&symbols, &params, llm_config);
        if task_ids.is_empty() {
            println!("{}", "No symbols passed validation".red());
            return;
        }
        if task_ids.len() < symbols.len() {
            println!(
                "{} of {} symbols were rejected by validation",
                (symbols.len() - task_ids.len()).to_string().yellow(),
                symbols.len()
            );
        }

        let bar = ProgressBar::new(task_ids.len() as u64);
        bar.set_style(
            ProgressStyle::with_template("{msg} {wide_bar:.cyan} {pos}/{len} [{elapsed}]").unwrap(),
        );
        bar.set_message("Analyzing");

        let mut records: Vec<CompletionRecord> = vec![];
        loop {
            let status = controller.get_progress_status();
            records.extend(status.drained);
            bar.set_position(records.len() as u64);

            if records.len() >= task_ids.len() {
                break;
            }
            if !status.is_running && status.running_tasks == 0 {
                break;
            }

            tokio::time::sleep(Duration::from_millis(300)).await;
        }
        bar.finish_and_clear();

        records.sort_by(|a, b| a.symbol.cmp(&b.symbol));

        let mut table_data: Vec<Vec<String>> = vec![];
        for record in &records {
            let verdict = match record.status {
                TaskStatus::Completed => match &record.result {
                    Some(report) => {
                        let prospect_symbol = match report.prospect {
                            Prospect::Bullish => "↑",
                            Prospect::Bearish => "↓",
                            Prospect::Neutral => "-",
                        };
                        format!("{prospect_symbol} ({}) {}", report.rating, report.summary)
                    }
                    None => String::new(),
                },
                TaskStatus::Failed => record.error.clone().unwrap_or_default(),
                TaskStatus::Unknown => "Worker terminated without reporting".to_string(),
                _ => String::new(),
            };

            let duration = record
                .duration_secs()
                .map(|secs| format!("{secs:.1}s"))
                .unwrap_or_default();

            table_data.push(vec![
                record.symbol.clone(),
                record.status.to_string(),
                verdict,
                duration,
            ]);
        }

        let mut table = tabled::builder::Builder::from_iter(&table_data).build();
        table.modify(Columns::first(), Color::FG_CYAN);
        table.with((
            Width::wrap(Percent(30)).priority(Priority::max(true)),
            Width::increase(Percent(30)).priority(Priority::min(true)),
        ));
        println!("{table}");

        let log = controller.completion_log();
        if !log.is_empty() {
            let average =
                log.iter().map(|entry| entry.duration_secs).sum::<f64>() / log.len() as f64;
            println!(
                "Completed {} of {} tasks, average duration {}",
                log.len().to_string().green(),
                task_ids.len(),
                format!("{average:.1}s").cyan()
            );
        }
    }
}
