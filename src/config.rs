use std::path::PathBuf;

use anyhow::{Context, Result};
use ::config::{Config, Environment};
use serde::Deserialize;

use crate::parser::fields::{DEFAULT_LABELS, NUMERIC_FIELDS};
use crate::parser::lines::DEFAULT_KEYWORDS;

pub const DEFAULT_ORIGIN: &str = "https://csrc.nist.gov";
const LISTING_PATH: &str =
    "/projects/cryptographic-module-validation-program/validated-modules/search";
const IN_PROCESS_PATH: &str =
    "/Projects/cryptographic-module-validation-program/modules-in-process/modules-in-process-list";

/// Runtime settings, read from `NIST_*` environment variables.
///
/// `NIST_SEARCH_PATH=/all` selects the listing path, `NIST_CONCURRENCY=4`
/// bounds the detail crawl, and so on for every field below.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub origin: String,
    pub search_path: String,
    pub user_agent: String,
    pub timeout_secs: u64,
    pub concurrency: usize,
    pub output_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            origin: DEFAULT_ORIGIN.to_string(),
            search_path: "/all".to_string(),
            user_agent: "NIST-CMVP-Data-Scraper/1.0".to_string(),
            timeout_secs: 30,
            concurrency: 10,
            output_dir: PathBuf::from("api"),
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        Config::builder()
            .add_source(Environment::with_prefix("NIST").try_parsing(true))
            .build()
            .and_then(|c| c.try_deserialize())
            .context("Invalid NIST_* settings")
    }

    pub fn listing_url(&self) -> String {
        format!("{}{}{}", self.origin, LISTING_PATH, self.search_path)
    }

    pub fn in_process_url(&self) -> String {
        format!("{}{}", self.origin, IN_PROCESS_PATH)
    }
}

/// Everything the extraction components need, passed explicitly.
#[derive(Debug, Clone)]
pub struct ExtractConfig {
    /// Prefix for relative link targets.
    pub origin: String,
    /// Lower-case label phrase → canonical field name, tested in order.
    pub label_map: Vec<(String, String)>,
    /// Canonical fields reduced to their first integer token.
    pub numeric_fields: Vec<String>,
    /// Upper-case keyword → category. First match wins, so list order is
    /// specificity order.
    pub keywords: Vec<(String, String)>,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        ExtractConfig::with_origin(DEFAULT_ORIGIN)
    }
}

impl ExtractConfig {
    pub fn with_origin(origin: &str) -> Self {
        ExtractConfig {
            origin: origin.trim_end_matches('/').to_string(),
            label_map: DEFAULT_LABELS
                .iter()
                .map(|(label, field)| (label.to_lowercase(), field.to_string()))
                .collect(),
            numeric_fields: NUMERIC_FIELDS.iter().map(|f| f.to_string()).collect(),
            keywords: DEFAULT_KEYWORDS
                .iter()
                .map(|(kw, category)| (kw.to_uppercase(), category.to_string()))
                .collect(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        ExtractConfig::with_origin(&settings.origin)
    }
}
