use std::fs;
use std::path::Path;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("config file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Run configuration: the filter lists and limits driving one clipping run.
/// Defaults mirror the press-clipping desk's standing setup; a JSON file
/// and/or CLI flags override them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClippingConfig {
    /// Keywords queried against each source (AND-combined within a query).
    pub keywords: Vec<String>,
    /// News source domains, e.g. "washingtonpost.com".
    pub sources: Vec<String>,
    /// Article languages accepted, as ISO 639-2 codes (OR-combined).
    pub languages: Vec<String>,
    /// Topic terms that disqualify an article, both as a server-side ignore
    /// parameter and as a local title/body content filter.
    pub excluded_topics: Vec<String>,
    /// Byline allow-list; empty means no author restriction.
    pub allowed_authors: Vec<String>,
    /// Maximum articles kept per (keyword, source) combination.
    pub per_source_limit: usize,
    /// Global cap on articles fetched across all combinations.
    pub max_total_articles: usize,
    /// Length of the date window in days, ending today.
    pub days_range: i64,
}

impl Default for ClippingConfig {
    fn default() -> Self {
        Self {
            keywords: vec!["Zelensky".into()],
            sources: vec!["washingtonpost.com".into()],
            languages: vec!["eng".into(), "hin".into()],
            excluded_topics: [
                "hockey",
                "cricket",
                "Bollywood",
                "Hollywood",
                "Box office",
                "Asia Cup",
                "World Cup",
                "football",
                "tennis",
                "badminton",
                "match",
                "Games",
                "sport",
                "Fashion",
                "Kohli",
                "Top News",
            ]
            .iter()
            .map(|t| t.to_string())
            .collect(),
            allowed_authors: vec!["Lizzie Johnson".into(), "Serhiy Morgunov".into()],
            per_source_limit: 5,
            max_total_articles: 10,
            days_range: 1,
        }
    }
}

impl ClippingConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.keywords.is_empty() || self.keywords.iter().any(|k| k.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "keywords must be non-empty and contain no blank entries".into(),
            ));
        }
        if self.sources.is_empty() || self.sources.iter().any(|s| s.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "sources must be non-empty and contain no blank entries".into(),
            ));
        }
        if self.per_source_limit < 1 {
            return Err(ConfigError::Invalid("per_source_limit must be at least 1".into()));
        }
        if self.max_total_articles < 1 {
            return Err(ConfigError::Invalid("max_total_articles must be at least 1".into()));
        }
        if self.days_range < 0 {
            return Err(ConfigError::Invalid("days_range must not be negative".into()));
        }
        Ok(())
    }

    /// Date window `[today - days_range, today]`.
    pub fn date_window(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        (today - Duration::days(self.days_range), today)
    }
}
