//! Paper records as they move through the pipeline.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// An entry as delivered by the upstream feed, before any validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawEntry {
    pub id: Option<String>,
    pub title: Option<String>,
    pub authors: Vec<String>,
    pub summary: Option<String>,
    pub link: Option<String>,
    pub published: Option<String>,
    pub updated: Option<String>,
    pub categories: Vec<String>,
}

/// A normalized paper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperRecord {
    /// Canonical arXiv identifier (no URL prefix, no version)
    pub id: String,

    pub title: String,

    /// Author names in feed order
    pub authors: Vec<String>,

    #[serde(rename = "abstract")]
    pub abstract_text: String,

    /// Abstract page URL
    pub url: String,

    pub published_date: NaiveDate,

    /// Category tags in feed order
    #[serde(default)]
    pub categories: Vec<String>,
}

impl PaperRecord {
    /// Author surnames, in order.
    ///
    /// `"Last, First"` yields the part before the comma; otherwise the last
    /// word. Dots and commas are stripped and empty results dropped.
    pub fn surnames(&self) -> Vec<String> {
        self.authors
            .iter()
            .filter_map(|name| surname(name))
            .collect()
    }
}

fn surname(name: &str) -> Option<String> {
    let name = name.trim();
    let last = match name.split_once(',') {
        Some((last, _)) => last.trim(),
        None => name.split_whitespace().last()?,
    };
    let cleaned: String = last.chars().filter(|c| !matches!(c, '.' | ',')).collect();
    (!cleaned.is_empty()).then_some(cleaned)
}

/// Which profile signal produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    Keyword,
    Author,
    Category,
}

/// A profile term that matched a paper, kept for explainability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedSignal {
    pub kind: SignalKind,
    pub term: String,
    pub weight: f64,
}

/// A paper with its relevance score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPaper {
    pub paper: PaperRecord,
    pub score: f64,
    pub matched: Vec<MatchedSignal>,
}
