//! Application configuration structures.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{AppError, Result};

/// Environment variable that overrides `source.contact`.
pub const CONTACT_ENV: &str = "ARXIV_CONTACT";

/// Smallest gap allowed between two upstream calls.
pub const MIN_REQUEST_INTERVAL_SECS: u64 = 3;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Upstream feed settings
    #[serde(default)]
    pub source: SourceConfig,

    /// Interest signals, lookback window and selection knobs
    #[serde(default)]
    pub profile: InterestProfile,

    /// Main theorem heuristics
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Digest artifact settings
    #[serde(default)]
    pub output: OutputConfig,

    /// Run-to-run id cache
    #[serde(default)]
    pub cache: CacheConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// Any failure is a configuration error: a run must not start on a
    /// guessed profile.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| AppError::config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml(&content)
            .map_err(|e| AppError::config(format!("{}: {e}", path.display())))
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| AppError::config(e.to_string()))
    }

    /// Apply environment overrides (currently only the contact address).
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(contact) = std::env::var(CONTACT_ENV) {
            if !contact.trim().is_empty() {
                self.source.contact = Some(contact);
            }
        }
        self
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        self.source.validate()?;
        self.profile.validate()?;
        self.extraction.validate()?;

        if self.output.filename_prefix.trim().is_empty() {
            return Err(AppError::config("output.filename_prefix is empty"));
        }
        if self.cache.enabled && self.cache.file.trim().is_empty() {
            return Err(AppError::config("cache.file is empty"));
        }
        Ok(())
    }
}

/// Upstream feed settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Query endpoint of the Atom API
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// Topic category polled every run
    #[serde(default = "defaults::category")]
    pub category: String,

    /// Contact address sent in the User-Agent header
    #[serde(default)]
    pub contact: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Minimum gap between two calls, in seconds
    #[serde(default = "defaults::request_interval")]
    pub request_interval_secs: u64,

    /// Additional attempts after a transient failure
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,

    /// Backoff before the first retry; doubled for each further retry
    #[serde(default = "defaults::retry_backoff")]
    pub retry_backoff_ms: u64,

    /// Entries requested per call
    #[serde(default = "defaults::page_size")]
    pub page_size: usize,

    /// Upper bound on entries fetched in one run
    #[serde(default = "defaults::max_fetch")]
    pub max_fetch: usize,

    /// Restrict the query to the lookback window on the server side
    #[serde(default = "defaults::date_filter")]
    pub date_filter: bool,
}

impl SourceConfig {
    /// User-Agent header value carrying the contact address.
    pub fn user_agent(&self) -> Result<String> {
        let contact = self
            .contact
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| {
                AppError::config(format!("source.contact is not set (or export {CONTACT_ENV})"))
            })?;
        Ok(format!(
            "arxiv-digest/{} (contact: {contact})",
            env!("CARGO_PKG_VERSION")
        ))
    }

    fn validate(&self) -> Result<()> {
        self.user_agent()?;
        url::Url::parse(&self.base_url)
            .map_err(|e| AppError::config(format!("source.base_url: {e}")))?;
        if self.category.trim().is_empty() {
            return Err(AppError::config("source.category is empty"));
        }
        if self.timeout_secs == 0 {
            return Err(AppError::config("source.timeout_secs must be > 0"));
        }
        if self.request_interval_secs < MIN_REQUEST_INTERVAL_SECS {
            return Err(AppError::config(format!(
                "source.request_interval_secs must be >= {MIN_REQUEST_INTERVAL_SECS}"
            )));
        }
        if self.page_size == 0 {
            return Err(AppError::config("source.page_size must be > 0"));
        }
        if self.max_fetch == 0 {
            return Err(AppError::config("source.max_fetch must be > 0"));
        }
        Ok(())
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            category: defaults::category(),
            contact: None,
            timeout_secs: defaults::timeout(),
            request_interval_secs: defaults::request_interval(),
            max_retries: defaults::max_retries(),
            retry_backoff_ms: defaults::retry_backoff(),
            page_size: defaults::page_size(),
            max_fetch: defaults::max_fetch(),
            date_filter: defaults::date_filter(),
        }
    }
}

/// A signal term with its weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedTerm {
    pub term: String,

    #[serde(default = "defaults::weight")]
    pub weight: f64,
}

impl WeightedTerm {
    pub fn new(term: impl Into<String>, weight: f64) -> Self {
        Self {
            term: term.into(),
            weight,
        }
    }
}

/// The reader's interest profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterestProfile {
    /// Days before the run date still eligible
    #[serde(default = "defaults::lookback_days")]
    pub lookback_days: u32,

    /// Minimum score to qualify (inclusive)
    #[serde(default = "defaults::threshold")]
    pub threshold: f64,

    /// Number of papers promoted to the detailed tier
    #[serde(default = "defaults::top_n")]
    pub top_n: i64,

    /// Terms matched against title and abstract
    #[serde(default, deserialize_with = "deserialize_terms")]
    pub keywords: Vec<WeightedTerm>,

    /// Names matched against the author list
    #[serde(default, deserialize_with = "deserialize_terms")]
    pub authors: Vec<WeightedTerm>,

    /// Terms matched against category tags
    #[serde(default, deserialize_with = "deserialize_terms")]
    pub categories: Vec<WeightedTerm>,

    /// Papers mentioning any of these are dropped before scoring
    #[serde(default)]
    pub exclude: Vec<String>,

    #[serde(default)]
    pub max_keyword_score: Option<f64>,

    #[serde(default)]
    pub max_author_score: Option<f64>,

    #[serde(default)]
    pub max_category_score: Option<f64>,

    /// Scale applied to each group's sum before its cap
    #[serde(default = "defaults::multiplier")]
    pub keyword_multiplier: f64,

    #[serde(default = "defaults::multiplier")]
    pub author_multiplier: f64,

    #[serde(default = "defaults::multiplier")]
    pub category_multiplier: f64,
}

impl InterestProfile {
    /// Number of detailed entries; anything below one promotes nothing.
    pub fn detailed_limit(&self) -> usize {
        usize::try_from(self.top_n).unwrap_or(0)
    }

    /// Oldest publication date still inside the lookback window.
    pub fn cutoff(&self, today: NaiveDate) -> NaiveDate {
        today
            .checked_sub_days(Days::new(u64::from(self.lookback_days)))
            .unwrap_or(NaiveDate::MIN)
    }

    fn validate(&self) -> Result<()> {
        if !self.threshold.is_finite() {
            return Err(AppError::config("profile.threshold must be finite"));
        }

        let groups = [
            ("keywords", &self.keywords),
            ("authors", &self.authors),
            ("categories", &self.categories),
        ];
        for (name, terms) in groups {
            for t in terms {
                if t.term.trim().is_empty() {
                    return Err(AppError::config(format!("profile.{name} has an empty term")));
                }
                if !t.weight.is_finite() || t.weight < 0.0 {
                    return Err(AppError::config(format!(
                        "profile.{name}.{}: weight must be finite and >= 0",
                        t.term
                    )));
                }
            }
        }

        let caps = [
            ("max_keyword_score", self.max_keyword_score),
            ("max_author_score", self.max_author_score),
            ("max_category_score", self.max_category_score),
        ];
        for (name, cap) in caps {
            if let Some(cap) = cap {
                if !cap.is_finite() || cap < 0.0 {
                    return Err(AppError::config(format!(
                        "profile.{name} must be finite and >= 0"
                    )));
                }
            }
        }

        let multipliers = [
            ("keyword_multiplier", self.keyword_multiplier),
            ("author_multiplier", self.author_multiplier),
            ("category_multiplier", self.category_multiplier),
        ];
        for (name, value) in multipliers {
            if !value.is_finite() || value < 0.0 {
                return Err(AppError::config(format!(
                    "profile.{name} must be finite and >= 0"
                )));
            }
        }

        if self.exclude.iter().any(|t| t.trim().is_empty()) {
            return Err(AppError::config("profile.exclude has an empty term"));
        }
        Ok(())
    }
}

impl Default for InterestProfile {
    fn default() -> Self {
        Self {
            lookback_days: defaults::lookback_days(),
            threshold: defaults::threshold(),
            top_n: defaults::top_n(),
            keywords: Vec::new(),
            authors: Vec::new(),
            categories: Vec::new(),
            exclude: Vec::new(),
            max_keyword_score: None,
            max_author_score: None,
            max_category_score: None,
            keyword_multiplier: defaults::multiplier(),
            author_multiplier: defaults::multiplier(),
            category_multiplier: defaults::multiplier(),
        }
    }
}

/// Main theorem heuristics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Trigger phrases announcing a result
    #[serde(default = "defaults::patterns")]
    pub patterns: Vec<String>,

    /// Longest statement kept, in characters
    #[serde(default = "defaults::max_chars")]
    pub max_chars: usize,

    /// Appended when a statement is cut
    #[serde(default = "defaults::truncation_marker")]
    pub truncation_marker: String,
}

impl ExtractionConfig {
    fn validate(&self) -> Result<()> {
        if self.patterns.iter().all(|p| p.trim().is_empty()) {
            return Err(AppError::config("extraction.patterns is empty"));
        }
        if self.max_chars == 0 {
            return Err(AppError::config("extraction.max_chars must be > 0"));
        }
        Ok(())
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            patterns: defaults::patterns(),
            max_chars: defaults::max_chars(),
            truncation_marker: defaults::truncation_marker(),
        }
    }
}

/// Digest document format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Pdf,
    Text,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Pdf => "pdf",
            OutputFormat::Text => "txt",
        }
    }
}

/// Digest artifact settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving the artifact
    #[serde(default = "defaults::output_dir")]
    pub dir: String,

    #[serde(default = "defaults::filename_prefix")]
    pub filename_prefix: String,

    #[serde(default)]
    pub format: OutputFormat,

    /// Print authors by surname only
    #[serde(default = "defaults::surnames_only")]
    pub surnames_only: bool,

    /// Document heading
    #[serde(default = "defaults::title")]
    pub title: String,
}

impl OutputConfig {
    /// Artifact file name for the given run date.
    pub fn file_name(&self, date: NaiveDate) -> String {
        format!(
            "{}_{}.{}",
            self.filename_prefix,
            date.format("%Y-%m-%d"),
            self.format.extension()
        )
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: defaults::output_dir(),
            filename_prefix: defaults::filename_prefix(),
            format: OutputFormat::default(),
            surnames_only: defaults::surnames_only(),
            title: defaults::title(),
        }
    }
}

/// Run-to-run id cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "defaults::cache_enabled")]
    pub enabled: bool,

    /// Cache file, relative to the storage directory
    #[serde(default = "defaults::cache_file")]
    pub file: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: defaults::cache_enabled(),
            file: defaults::cache_file(),
        }
    }
}

/// Accepted spellings of a term set.
#[derive(Deserialize)]
#[serde(untagged)]
enum TermSet {
    Map(BTreeMap<String, f64>),
    List(Vec<TermEntry>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TermEntry {
    Bare(String),
    Weighted(WeightedTerm),
}

/// Deserialize a term set from either a `{ term = weight }` table or a list
/// of bare terms / `{ term, weight }` tables.
///
/// Terms are deduplicated case-insensitively (first wins) and sorted, so the
/// summation order while scoring never depends on the file layout.
fn deserialize_terms<'de, D>(deserializer: D) -> std::result::Result<Vec<WeightedTerm>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Vec<WeightedTerm> = match TermSet::deserialize(deserializer)? {
        TermSet::Map(map) => map
            .into_iter()
            .map(|(term, weight)| WeightedTerm::new(term, weight))
            .collect(),
        TermSet::List(entries) => entries
            .into_iter()
            .map(|entry| match entry {
                TermEntry::Bare(term) => WeightedTerm::new(term, defaults::weight()),
                TermEntry::Weighted(t) => t,
            })
            .collect(),
    };

    let mut seen = HashSet::new();
    let mut terms: Vec<WeightedTerm> = raw
        .into_iter()
        .map(|t| WeightedTerm::new(t.term.trim(), t.weight))
        .filter(|t| seen.insert(t.term.to_lowercase()))
        .collect();
    terms.sort_by(|a, b| a.term.cmp(&b.term));
    Ok(terms)
}

mod defaults {
    // Source defaults
    pub fn base_url() -> String {
        "https://export.arxiv.org/api/query".into()
    }
    pub fn category() -> String {
        "math.AG".into()
    }
    pub fn timeout() -> u64 {
        60
    }
    pub fn request_interval() -> u64 {
        super::MIN_REQUEST_INTERVAL_SECS
    }
    pub fn max_retries() -> u32 {
        3
    }
    pub fn retry_backoff() -> u64 {
        2000
    }
    pub fn page_size() -> usize {
        200
    }
    pub fn max_fetch() -> usize {
        2000
    }
    pub fn date_filter() -> bool {
        true
    }

    // Profile defaults
    pub fn weight() -> f64 {
        1.0
    }
    pub fn multiplier() -> f64 {
        1.0
    }
    pub fn lookback_days() -> u32 {
        7
    }
    pub fn threshold() -> f64 {
        1.0
    }
    pub fn top_n() -> i64 {
        3
    }

    // Extraction defaults
    pub fn patterns() -> Vec<String> {
        [
            "we prove",
            "main theorem",
            "our main result",
            "we show that",
            "we establish",
            "we obtain",
            "nous montrons",
            "nous démontrons",
            "notre résultat principal",
            "wir zeigen",
            "wir beweisen",
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }
    pub fn max_chars() -> usize {
        400
    }
    pub fn truncation_marker() -> String {
        " [...]".into()
    }

    // Output defaults
    pub fn output_dir() -> String {
        "out".into()
    }
    pub fn filename_prefix() -> String {
        "math_ag_weekly".into()
    }
    pub fn surnames_only() -> bool {
        true
    }
    pub fn title() -> String {
        "math.AG weekly digest".into()
    }

    // Cache defaults
    pub fn cache_enabled() -> bool {
        true
    }
    pub fn cache_file() -> String {
        "cache.json".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.source.contact = Some("reader@example.org".to_string());
        config
    }

    #[test]
    fn validate_default_config_with_contact_ok() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn validate_rejects_missing_contact() {
        let config = Config::default();
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn validate_rejects_interval_below_floor() {
        let mut config = valid_config();
        config.source.request_interval_secs = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_negative_weight() {
        let mut config = valid_config();
        config.profile.keywords = vec![WeightedTerm::new("moduli", -1.0)];
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_nan_cap() {
        let mut config = valid_config();
        config.profile.max_author_score = Some(f64::NAN);
        assert!(config.validate().is_err());
    }

    #[test]
    fn parses_map_and_list_term_sets() {
        let config = Config::from_toml(
            r#"
            [profile]
            threshold = 2.5
            top_n = 5
            keywords = { "stack" = 1.5, "moduli" = 2.0 }
            authors = ["Mumford", { term = "Deligne", weight = 3.0 }]
            "#,
        )
        .unwrap();

        assert_eq!(config.profile.threshold, 2.5);
        assert_eq!(config.profile.detailed_limit(), 5);
        assert_eq!(
            config.profile.keywords,
            vec![
                WeightedTerm::new("moduli", 2.0),
                WeightedTerm::new("stack", 1.5)
            ]
        );
        assert_eq!(
            config.profile.authors,
            vec![
                WeightedTerm::new("Deligne", 3.0),
                WeightedTerm::new("Mumford", 1.0)
            ]
        );
    }

    #[test]
    fn duplicate_terms_keep_first_occurrence() {
        let config = Config::from_toml(
            r#"
            [profile]
            keywords = [{ term = "Moduli", weight = 2.0 }, { term = "moduli", weight = 9.0 }]
            "#,
        )
        .unwrap();
        assert_eq!(config.profile.keywords, vec![WeightedTerm::new("Moduli", 2.0)]);
    }

    #[test]
    fn negative_top_n_promotes_nothing() {
        let config = Config::from_toml("[profile]\ntop_n = -2\n").unwrap();
        assert_eq!(config.profile.detailed_limit(), 0);
    }

    #[test]
    fn negative_lookback_is_a_config_error() {
        let result = Config::from_toml("[profile]\nlookback_days = -1\n");
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn cutoff_subtracts_lookback_days() {
        let profile = InterestProfile {
            lookback_days: 7,
            ..InterestProfile::default()
        };
        let today = NaiveDate::from_ymd_opt(2026, 10, 15).unwrap();
        assert_eq!(
            profile.cutoff(today),
            NaiveDate::from_ymd_opt(2026, 10, 8).unwrap()
        );
    }

    #[test]
    fn file_name_uses_format_extension() {
        let mut output = OutputConfig::default();
        let date = NaiveDate::from_ymd_opt(2026, 10, 15).unwrap();
        assert_eq!(output.file_name(date), "math_ag_weekly_2026-10-15.pdf");
        output.format = OutputFormat::Text;
        assert_eq!(output.file_name(date), "math_ag_weekly_2026-10-15.txt");
    }

    #[test]
    fn load_missing_file_is_config_error() {
        let result = Config::load("/definitely/not/here/config.toml");
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn shipped_config_parses() {
        let mut config = Config::from_toml(include_str!("../../storage/config.toml")).unwrap();
        config.source.contact = Some("reader@example.org".to_string());
        assert!(config.validate().is_ok());
        assert_eq!(config.source.category, "math.AG");
        assert_eq!(config.extraction.patterns, ExtractionConfig::default().patterns);
        assert_eq!(config.profile.category_multiplier, 0.5);
    }

    #[test]
    fn multipliers_default_to_one_and_reject_negatives() {
        let config = Config::from_toml("[profile]\nauthor_multiplier = 2.0\n").unwrap();
        assert_eq!(config.profile.keyword_multiplier, 1.0);
        assert_eq!(config.profile.author_multiplier, 2.0);

        let mut config = valid_config();
        config.profile.category_multiplier = -0.5;
        assert!(config.validate().is_err());
    }
}
