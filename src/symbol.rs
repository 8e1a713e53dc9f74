use std::{collections::HashSet, sync::LazyLock};

use regex::Regex;

use crate::error::{SbResult, StockbatchError};

#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Eq,
    PartialEq,
    serde::Serialize,
    serde::Deserialize,
    strum::Display,
    strum::EnumIter,
    strum::EnumMessage,
    strum::EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum MarketType {
    #[strum(message = "A股", serialize = "a-share", serialize = "cn")]
    AShare,

    #[strum(message = "港股", serialize = "hk")]
    Hk,

    #[default]
    #[strum(message = "美股", serialize = "us")]
    Us,
}

/// Split free text into normalized symbols, order is unspecified
pub fn parse_symbols(text: &str) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return vec![];
    }

    let mut symbols: HashSet<String> = HashSet::new();
    for token in REGEX_SYMBOL_SEPARATORS.split(text) {
        let symbol = token.trim().to_uppercase();
        if !symbol.is_empty() {
            symbols.insert(symbol);
        }
    }

    symbols.into_iter().collect()
}

pub fn check_symbol_shape(symbol: &str, market_type: MarketType) -> SbResult<()> {
    let valid = match market_type {
        // Stocks and ETF/LOF funds share the 6-digit code space
        MarketType::AShare => REGEX_CODE_CN.is_match(symbol),
        MarketType::Hk => REGEX_CODE_HK.is_match(symbol),
        MarketType::Us => REGEX_CODE_US.is_match(symbol),
    };

    if valid {
        Ok(())
    } else {
        Err(StockbatchError::Invalid(
            "SYMBOL_INVALID",
            format!("Symbol '{symbol}' is not a valid {market_type} code"),
        ))
    }
}

static REGEX_SYMBOL_SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[,;\s\n]+").expect("SYMBOL_SEPARATORS regex is invalid"));
static REGEX_CODE_CN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{6}$").expect("CODE_CN regex is invalid"));
static REGEX_CODE_HK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4,5}$").expect("CODE_HK regex is invalid"));
static REGEX_CODE_US: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{1,5}(\.[A-Z])?$").expect("CODE_US regex is invalid"));
