//! Local filesystem storage implementation.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── config.toml           # Digest configuration
//! └── cache.json            # Paper cache (see `LocalCache`)
//! ```
//!
//! Every write goes to a temporary sibling first and is renamed into place,
//! so a killed run never leaves a half-written cache or digest behind.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::PaperRecord;
use crate::storage::{CacheData, Coverage, MemoryCache, PaperCache};

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    /// Get the full path for a relative key.
    pub fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    pub async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".tmp");
        let tmp = path.with_file_name(tmp_name);

        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(path)
    }

    /// Write JSON data.
    pub async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<PathBuf> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if file doesn't exist.
    pub async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Read JSON data.
    pub async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

/// Paper cache persisted as one JSON file.
///
/// The file is read once at open and rewritten on [`PaperCache::flush`].
/// An unreadable file is treated as a cold start.
#[derive(Debug)]
pub struct LocalCache {
    storage: LocalStorage,
    key: String,
    records: MemoryCache,
}

impl LocalCache {
    /// Open the cache stored under `key` in `storage`.
    pub async fn open(storage: LocalStorage, key: impl Into<String>) -> Self {
        let key = key.into();
        let records = match storage.read_json::<CacheData>(&key).await {
            Ok(Some(data)) => {
                log::info!("Loaded {} cached papers from {}", data.count, key);
                MemoryCache::with_coverage(data.records, data.coverage)
            }
            Ok(None) => {
                log::info!("No cache at {}; starting cold", storage.path(&key).display());
                MemoryCache::new()
            }
            Err(e) => {
                log::warn!("Ignoring unreadable cache {}: {}", key, e);
                MemoryCache::new()
            }
        };

        Self {
            storage,
            key,
            records,
        }
    }
}

#[async_trait]
impl PaperCache for LocalCache {
    async fn contains(&self, id: &str) -> Result<bool> {
        self.records.contains(id).await
    }

    async fn put(&self, record: PaperRecord) -> Result<()> {
        self.records.put(record).await
    }

    async fn records_between(&self, since: NaiveDate, until: NaiveDate) -> Result<Vec<PaperRecord>> {
        self.records.records_between(since, until).await
    }

    async fn prune_before(&self, cutoff: NaiveDate) -> Result<usize> {
        self.records.prune_before(cutoff).await
    }

    async fn len(&self) -> Result<usize> {
        self.records.len().await
    }

    async fn coverage(&self) -> Result<Option<Coverage>> {
        self.records.coverage().await
    }

    async fn set_coverage(&self, coverage: Option<Coverage>) -> Result<()> {
        self.records.set_coverage(coverage).await
    }

    async fn flush(&self) -> Result<()> {
        let data = CacheData::new(self.records.snapshot(), self.records.current_coverage());
        self.storage.write_json(&self.key, &data).await?;
        log::debug!("Cache: {} papers written to {}", data.count, self.key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(id: &str) -> PaperRecord {
        PaperRecord {
            id: id.to_string(),
            title: "Hodge theory".to_string(),
            authors: vec!["Pierre Deligne".to_string()],
            abstract_text: "We prove it.".to_string(),
            url: format!("https://arxiv.org/abs/{id}"),
            published_date: NaiveDate::from_ymd_opt(2026, 10, 12).unwrap(),
            categories: vec!["math.AG".to_string()],
        }
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        let path = storage.write_bytes("nested/test.txt", b"hello").await.unwrap();
        assert_eq!(path, tmp.path().join("nested/test.txt"));
        let data = storage.read_bytes("nested/test.txt").await.unwrap();
        assert_eq!(data, Some(b"hello".to_vec()));
        assert!(!tmp.path().join("nested/test.txt.tmp").exists());
    }

    #[tokio::test]
    async fn test_read_nonexistent() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        let data = storage.read_bytes("nope.txt").await.unwrap();
        assert!(data.is_none());
    }

    #[tokio::test]
    async fn test_cache_survives_reopen() {
        let tmp = TempDir::new().unwrap();

        let cache = LocalCache::open(LocalStorage::new(tmp.path()), "cache.json").await;
        let week = Coverage::new(
            NaiveDate::from_ymd_opt(2026, 10, 8).unwrap(),
            NaiveDate::from_ymd_opt(2026, 10, 15).unwrap(),
        );
        cache.put(record("2410.00001")).await.unwrap();
        cache.set_coverage(Some(week)).await.unwrap();
        cache.flush().await.unwrap();

        let reopened = LocalCache::open(LocalStorage::new(tmp.path()), "cache.json").await;
        assert!(reopened.contains("2410.00001").await.unwrap());
        assert_eq!(reopened.len().await.unwrap(), 1);
        assert_eq!(reopened.coverage().await.unwrap(), Some(week));
    }

    #[tokio::test]
    async fn test_corrupt_cache_starts_cold() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("cache.json"), b"{ not json").unwrap();

        let cache = LocalCache::open(LocalStorage::new(tmp.path()), "cache.json").await;
        assert_eq!(cache.len().await.unwrap(), 0);
    }
}
