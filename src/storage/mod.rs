//! Storage abstractions: the run-to-run paper cache and artifact files.
//!
//! The cache is a read-through store keyed by paper id. It only saves
//! upstream calls; losing it never changes a digest.
//!
//! ## Directory Structure
//!
//! ```text
//! storage/
//! ├── config.toml           # Digest configuration
//! └── cache.json            # Papers seen inside the lookback window
//! out/
//! └── math_ag_weekly_2026-10-15.pdf
//! ```

pub mod local;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::PaperRecord;

// Re-export for convenience
pub use local::{LocalCache, LocalStorage};
pub use memory::MemoryCache;

/// Date range whose papers are all in the cache.
///
/// Paging may stop at a cached paper only when the coverage reaches back to
/// the start of the window; otherwise older papers could be missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coverage {
    pub since: NaiveDate,
    pub until: NaiveDate,
}

impl Coverage {
    pub fn new(since: NaiveDate, until: NaiveDate) -> Self {
        Self { since, until }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        (self.since..=self.until).contains(&date)
    }

    /// Union with `other` when the two touch or overlap, else `other` alone.
    pub fn merge(self, other: Coverage) -> Coverage {
        let touches = |a: &Coverage, b: &Coverage| {
            a.until.succ_opt().is_none_or(|next| b.since <= next)
        };
        if touches(&self, &other) && touches(&other, &self) {
            Coverage::new(self.since.min(other.since), self.until.max(other.until))
        } else {
            other
        }
    }

    /// What is left after dropping days before `cutoff`.
    pub fn clamp_from(self, cutoff: NaiveDate) -> Option<Coverage> {
        (self.until >= cutoff).then(|| Coverage::new(self.since.max(cutoff), self.until))
    }
}

/// On-disk layout of the cache file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheData {
    /// ISO 8601 timestamp of last update
    pub updated_at: DateTime<Utc>,
    /// Number of cached records
    pub count: usize,
    #[serde(default)]
    pub coverage: Option<Coverage>,
    pub records: Vec<PaperRecord>,
}

impl CacheData {
    pub fn new(records: Vec<PaperRecord>, coverage: Option<Coverage>) -> Self {
        Self {
            updated_at: Utc::now(),
            count: records.len(),
            coverage,
            records,
        }
    }
}

/// Read-through cache of papers already fetched.
#[async_trait]
pub trait PaperCache: Send + Sync {
    /// Whether a paper with this id has been seen.
    async fn contains(&self, id: &str) -> Result<bool>;

    /// Insert or replace a record.
    async fn put(&self, record: PaperRecord) -> Result<()>;

    /// Records published in `[since, until]`, ordered by id.
    async fn records_between(&self, since: NaiveDate, until: NaiveDate) -> Result<Vec<PaperRecord>>;

    /// Drop records published before `cutoff`; returns how many went.
    async fn prune_before(&self, cutoff: NaiveDate) -> Result<usize>;

    /// Number of cached records.
    async fn len(&self) -> Result<usize>;

    /// Dates known to be complete, if any.
    async fn coverage(&self) -> Result<Option<Coverage>>;

    async fn set_coverage(&self, coverage: Option<Coverage>) -> Result<()>;

    /// Persist pending changes.
    async fn flush(&self) -> Result<()>;
}
