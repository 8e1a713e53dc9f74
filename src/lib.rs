//! # stockbatch lib

use std::{collections::HashMap, path::PathBuf, sync::LazyLock};

use directories::ProjectDirs;
use rayon::iter::*;

pub mod api;
pub mod error;
pub mod utils;

/// Options that each item is String in <key>:<value> format
pub struct VecOptions<'a>(pub &'a [String]);

pub async fn init() {
    env_logger::Builder::new()
        .parse_filters(std::env::var("LOG").as_deref().unwrap_or("off"))
        .init();
}

static APP_DATA_DIR: LazyLock<PathBuf> =
    LazyLock::new(|| match ProjectDirs::from("", "", env!("CARGO_PKG_NAME")) {
        Some(proj_dirs) => proj_dirs.data_dir().to_path_buf(),
        None => std::env::current_dir()
            .expect("Unable to get current directory!")
            .join("data"),
    });

static CHANNEL_BUFFER_DEFAULT: usize = 64;
static LLM_CHAT_TEMPERATURE_DEFAULT: f64 = 0.6;
static LLM_PROVIDER_DEFAULT: &str = "deepseek";
static LLM_MODEL_DEFAULT: &str = "deepseek-chat";

mod analysis;
mod analyst;
mod batch;
mod llm;
mod symbol;

impl VecOptions<'_> {
    pub fn get(&self, name: &str) -> Option<String> {
        let prefix = format!("{}:", name.to_lowercase());

        self.0
            .par_iter()
            .find_any(|s| s.to_lowercase().starts_with(&prefix))
            .and_then(|s| s.split_once(':'))
            .map(|(_, value)| value.trim().to_string())
    }

    pub fn into_map(self) -> HashMap<String, String> {
        self.0
            .iter()
            .filter_map(|s| s.split_once(':'))
            .map(|(key, value)| (key.to_string(), value.trim().to_string()))
            .collect()
    }
}
