//! In-memory paper cache.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::Result;
use crate::models::PaperRecord;
use crate::storage::{Coverage, PaperCache};

/// Cache held in process memory; also the working set of [`LocalCache`].
///
/// [`LocalCache`]: crate::storage::LocalCache
#[derive(Debug, Default)]
pub struct MemoryCache {
    records: Mutex<BTreeMap<String, PaperRecord>>,
    coverage: Mutex<Option<Coverage>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a cache pre-filled with records.
    pub fn with_records(records: impl IntoIterator<Item = PaperRecord>) -> Self {
        let map = records.into_iter().map(|r| (r.id.clone(), r)).collect();
        Self {
            records: Mutex::new(map),
            coverage: Mutex::new(None),
        }
    }

    /// All records, ordered by id.
    pub fn snapshot(&self) -> Vec<PaperRecord> {
        self.lock().values().cloned().collect()
    }

    /// Same as [`MemoryCache::with_records`], with known coverage.
    pub fn with_coverage(records: impl IntoIterator<Item = PaperRecord>, coverage: Option<Coverage>) -> Self {
        let cache = Self::with_records(records);
        *cache.coverage.lock().unwrap_or_else(PoisonError::into_inner) = coverage;
        cache
    }

    pub fn current_coverage(&self) -> Option<Coverage> {
        *self.coverage.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, PaperRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl PaperCache for MemoryCache {
    async fn contains(&self, id: &str) -> Result<bool> {
        Ok(self.lock().contains_key(id))
    }

    async fn put(&self, record: PaperRecord) -> Result<()> {
        self.lock().insert(record.id.clone(), record);
        Ok(())
    }

    async fn records_between(&self, since: NaiveDate, until: NaiveDate) -> Result<Vec<PaperRecord>> {
        Ok(self
            .lock()
            .values()
            .filter(|r| (since..=until).contains(&r.published_date))
            .cloned()
            .collect())
    }

    async fn prune_before(&self, cutoff: NaiveDate) -> Result<usize> {
        let mut records = self.lock();
        let before = records.len();
        records.retain(|_, r| r.published_date >= cutoff);
        Ok(before - records.len())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.lock().len())
    }

    async fn coverage(&self) -> Result<Option<Coverage>> {
        Ok(self.current_coverage())
    }

    async fn set_coverage(&self, coverage: Option<Coverage>) -> Result<()> {
        *self.coverage.lock().unwrap_or_else(PoisonError::into_inner) = coverage;
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}
