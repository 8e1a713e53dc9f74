use std::str::FromStr;

use serde::Serialize;
use serde_json::Value;

use crate::{
    analyst::Analyst,
    error::{SbResult, StockbatchError},
    symbol::{self, MarketType},
    utils,
};

/// Parameter bundle applied to every symbol of a batch
#[derive(Clone, Debug)]
pub struct AnalysisParams {
    pub analysis_date: String,
    pub analysts: Vec<Analyst>,
    pub research_depth: u8,
    pub market_type: MarketType,
    pub include_sentiment: bool,
    pub include_risk_assessment: bool,
    pub custom_prompt: Option<String>,
}

/// Per-batch override of the process-wide LLM defaults
#[derive(Clone, Debug, Default)]
pub struct LlmOverride {
    pub llm_provider: Option<String>,
    pub llm_model: Option<String>,
}

/// One fully resolved invocation handed to the invoker
#[derive(Clone, Debug)]
pub struct AnalysisRequest {
    pub symbol: String,
    pub params: AnalysisParams,
    pub llm_provider: String,
    pub llm_model: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, strum::Display, strum::EnumString)]
#[strum(ascii_case_insensitive)]
pub enum Prospect {
    Bullish,
    Bearish,
    Neutral,
}

#[derive(Clone, Debug, Serialize)]
pub struct AnalysisReport {
    pub prospect: Prospect,
    pub rating: u64,
    pub summary: String,
}

/// Runs one full analysis for one symbol, potentially for minutes
pub trait AnalysisInvoker: Send + Sync + 'static {
    fn run(
        &self,
        request: &AnalysisRequest,
    ) -> impl std::future::Future<Output = SbResult<AnalysisReport>> + Send;
}

/// Checks a (symbol, params) pair before a task is accepted into a batch
pub trait ParamsValidator: Send + Sync + 'static {
    fn validate(&self, symbol: &str, params: &AnalysisParams) -> SbResult<()>;
}

pub struct DefaultValidator;

impl ParamsValidator for DefaultValidator {
    fn validate(&self, symbol: &str, params: &AnalysisParams) -> SbResult<()> {
        symbol::check_symbol_shape(symbol, params.market_type)?;

        if utils::datetime::date_from_str(&params.analysis_date).is_none() {
            return Err(StockbatchError::Invalid(
                "DATE_INVALID",
                format!("Can not parse '{}' as date", params.analysis_date),
            ));
        }

        if params.analysts.is_empty() {
            return Err(StockbatchError::Required(
                "ANALYSTS_REQUIRED",
                "At least one analyst is required".to_string(),
            ));
        }

        if !(1..=5).contains(&params.research_depth) {
            return Err(StockbatchError::Invalid(
                "DEPTH_INVALID",
                format!(
                    "Research depth {} is out of range 1..=5",
                    params.research_depth
                ),
            ));
        }

        Ok(())
    }
}

impl Default for AnalysisParams {
    fn default() -> Self {
        use strum::IntoEnumIterator;

        Self {
            analysis_date: utils::datetime::today().format("%Y-%m-%d").to_string(),
            analysts: Analyst::iter().collect(),
            research_depth: 3,
            market_type: MarketType::default(),
            include_sentiment: true,
            include_risk_assessment: true,
            custom_prompt: None,
        }
    }
}

impl AnalysisReport {
    pub fn from_json(json_str: &str) -> SbResult<Self> {
        let json: Value = serde_json::from_str(json_str)?;

        let prospect_str = json["prospect"].as_str().ok_or(StockbatchError::Required(
            "PROSPECT_REQUIRED",
            "Missing prospect".to_string(),
        ))?;
        let prospect = Prospect::from_str(prospect_str)?;

        let rating: u64 = json["rating"].as_u64().ok_or(StockbatchError::Required(
            "RATING_REQUIRED",
            "Missing rating".to_string(),
        ))?;

        let summary = json["summary"]
            .as_str()
            .ok_or(StockbatchError::Required(
                "SUMMARY_REQUIRED",
                "Missing summary".to_string(),
            ))?
            .to_string();

        Ok(Self {
            prospect,
            rating,
            summary,
        })
    }
}

pub mod llm_invoker;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_from_json() {
        let json_str = r#"
{
    "prospect": "bullish",
    "rating": 72,
    "summary": "量价配合良好"
}
"#;

        let report = AnalysisReport::from_json(json_str).unwrap();
        assert_eq!(report.prospect, Prospect::Bullish);
        assert_eq!(report.rating, 72);
        assert_eq!(report.summary, "量价配合良好");

        assert!(AnalysisReport::from_json(r#"{"rating": 72}"#).is_err());
    }

    #[test]
    fn test_default_validator() {
        let validator = DefaultValidator;

        let params = AnalysisParams {
            analysis_date: "2025-06-01".to_string(),
            market_type: MarketType::AShare,
            ..AnalysisParams::default()
        };
        assert!(validator.validate("600036", &params).is_ok());
        assert!(validator.validate("AAPL", &params).is_err());

        let bad_date = AnalysisParams {
            analysis_date: "someday".to_string(),
            market_type: MarketType::AShare,
            ..AnalysisParams::default()
        };
        assert!(validator.validate("600036", &bad_date).is_err());

        let bad_depth = AnalysisParams {
            analysis_date: "2025-06-01".to_string(),
            market_type: MarketType::AShare,
            research_depth: 9,
            ..AnalysisParams::default()
        };
        assert!(validator.validate("600036", &bad_depth).is_err());

        let no_analysts = AnalysisParams {
            analysis_date: "2025-06-01".to_string(),
            market_type: MarketType::AShare,
            analysts: vec![],
            ..AnalysisParams::default()
        };
        assert!(validator.validate("600036", &no_analysts).is_err());
    }
}
