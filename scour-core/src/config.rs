//! Configuration for scour

use crate::options::{QueryOptions, ALL_RESULTS};
use crate::sort::{SortDimension, SortDirection, SortModel};
use crate::ScourError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default configuration as TOML
pub const DEFAULT_CONFIG: &str = r#"# Scour Configuration

[search]
# Maximum rows taken from each root (0 = unlimited)
max_results = 500
# Time budget for per-root queries (e.g., "500ms", "3s", or "none" for no limit)
max_query_time = "3s"
# How far back a search without a query looks for recent files
recent_window = "30d"
# Include dot-files and rows flagged hidden
show_hidden = false
# MIME wildcards to restrict results to, e.g. ["image/*", "video/*"]
categories = []
# Worker threads for per-root queries
workers = 4

[sort]
# name | modified | size | type
dimension = "modified"
# ascending | descending
direction = "descending"
"#;

/// Scour configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub sort: SortConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_max_query_time")]
    pub max_query_time: String,
    #[serde(default = "default_recent_window")]
    pub recent_window: String,
    #[serde(default)]
    pub show_hidden: bool,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default = "default_workers")]
    pub workers: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SortConfig {
    #[serde(default)]
    pub dimension: SortDimension,
    #[serde(default)]
    pub direction: SortDirection,
}

// Default value functions
fn default_max_results() -> usize {
    500
}
fn default_max_query_time() -> String {
    "3s".to_string()
}
fn default_recent_window() -> String {
    "30d".to_string()
}
fn default_workers() -> usize {
    4
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
            max_query_time: default_max_query_time(),
            recent_window: default_recent_window(),
            show_hidden: false,
            categories: Vec::new(),
            workers: default_workers(),
        }
    }
}

impl Config {
    /// Load config from a TOML file
    pub fn load(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse config from TOML string. Duration fields are checked here so
    /// a bad value fails at load time.
    pub fn from_toml(content: &str) -> crate::Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| ScourError::ConfigParse(e.to_string()))?;
        config.max_query_time()?;
        config.recent_window()?;
        if config.search.workers == 0 {
            return Err(ScourError::ConfigParse(
                "search.workers must be at least 1".to_string(),
            ));
        }
        Ok(config)
    }

    /// Per-root row cap, with 0 meaning unlimited
    pub fn max_results(&self) -> usize {
        match self.search.max_results {
            0 => ALL_RESULTS,
            n => n,
        }
    }

    /// Time budget, or `None` when set to "none"
    pub fn max_query_time(&self) -> crate::Result<Option<Duration>> {
        let value = self.search.max_query_time.trim();
        if value.eq_ignore_ascii_case("none") {
            return Ok(None);
        }
        parse_config_duration("search.max_query_time", value).map(Some)
    }

    pub fn recent_window(&self) -> crate::Result<Duration> {
        parse_config_duration("search.recent_window", &self.search.recent_window)
    }

    pub fn sort_model(&self) -> SortModel {
        SortModel::new(self.sort.dimension, self.sort.direction)
    }

    /// Query options for a search or listing. The recent window only bounds
    /// searches without a query.
    pub fn query_options(&self, query_is_blank: bool) -> crate::Result<QueryOptions> {
        let mut options = QueryOptions::new()
            .with_max_results(self.max_results())
            .with_show_hidden(self.search.show_hidden)
            .with_categories(self.search.categories.iter().cloned());
        if let Some(budget) = self.max_query_time()? {
            options = options.with_max_query_time(budget);
        }
        if query_is_blank {
            options = options.with_max_last_modified_age(self.recent_window()?);
        }
        Ok(options)
    }
}

fn parse_config_duration(key: &str, value: &str) -> crate::Result<Duration> {
    parse_duration(value)
        .ok_or_else(|| ScourError::ConfigParse(format!("invalid duration for {key}: '{value}'")))
}

/// Parse duration string (e.g., "250ms", "3s", "30m", "1h", "7d")
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    let split = s.find(|c: char| !c.is_ascii_digit())?;
    let (num_str, unit) = s.split_at(split);
    let num: u64 = num_str.parse().ok()?;

    match unit {
        "ms" => Some(Duration::from_millis(num)),
        "s" => Some(Duration::from_secs(num)),
        "m" => Some(Duration::from_secs(num.checked_mul(60)?)),
        "h" => Some(Duration::from_secs(num.checked_mul(3600)?)),
        "d" => Some(Duration::from_secs(num.checked_mul(86400)?)),
        _ => None,
    }
}
