use std::str::FromStr;

use crate::error::{SbResult, StockbatchError};

#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    Hash,
    PartialEq,
    strum::Display,
    strum::EnumIter,
    strum::EnumMessage,
    strum::EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum Analyst {
    #[strum(message = "市场技术分析师", serialize = "market")]
    Market,

    #[strum(message = "社交情绪分析师", serialize = "social")]
    Social,

    #[strum(message = "新闻分析师", serialize = "news")]
    News,

    #[strum(message = "基本面分析师", serialize = "fundamentals")]
    Fundamentals,
}

impl Analyst {
    /// The angle this analyst contributes to the LLM prompt
    pub fn focus(&self) -> &'static str {
        match self {
            Analyst::Market => "技术面：价格趋势、均线形态、量价关系、支撑与阻力位",
            Analyst::Social => "情绪面：社交媒体与投资者情绪、市场热度、资金关注度",
            Analyst::News => "消息面：近期新闻事件、公告、行业政策及其影响",
            Analyst::Fundamentals => "基本面：盈利能力、成长性、估值水平、财务健康度",
        }
    }
}

pub fn parse_analysts(keys: &[String]) -> SbResult<Vec<Analyst>> {
    let mut analysts = vec![];

    for key in keys {
        match Analyst::from_str(key) {
            Ok(analyst) => {
                if !analysts.contains(&analyst) {
                    analysts.push(analyst);
                }
            }
            Err(_) => {
                return Err(StockbatchError::NotExists(
                    "ANALYST_NOT_EXISTS",
                    format!("Analyst '{key}' not exists"),
                ));
            }
        }
    }

    Ok(analysts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_analysts() {
        let analysts = parse_analysts(&[
            "market".to_string(),
            "NEWS".to_string(),
            "market".to_string(),
        ])
        .unwrap();
        assert_eq!(analysts, vec![Analyst::Market, Analyst::News]);

        assert!(parse_analysts(&["astrology".to_string()]).is_err());
    }
}
