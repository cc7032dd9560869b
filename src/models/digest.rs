//! The digest handed to renderers.

use serde::Serialize;

use super::ScoredPaper;

/// A detailed-tier entry: the paper and its extracted main theorem, if any.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailedEntry {
    pub paper: ScoredPaper,
    pub theorem: Option<String>,
}

/// Final ranked output of one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DigestResult {
    pub detailed: Vec<DetailedEntry>,
    pub title_only: Vec<ScoredPaper>,
    pub is_empty: bool,
}

impl DigestResult {
    /// Build a digest; `is_empty` is derived from the tiers.
    pub fn new(detailed: Vec<DetailedEntry>, title_only: Vec<ScoredPaper>) -> Self {
        let is_empty = detailed.is_empty() && title_only.is_empty();
        Self {
            detailed,
            title_only,
            is_empty,
        }
    }

    /// Digest with nothing to report.
    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new())
    }

    /// Number of listed papers across both tiers.
    pub fn listed_count(&self) -> usize {
        self.detailed.len() + self.title_only.len()
    }
}
