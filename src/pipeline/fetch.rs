// src/pipeline/fetch.rs

//! Fetch stage: paced, retried paging over the upstream feed, backed by the
//! paper cache.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::NaiveDate;

use crate::error::{AppError, Result};
use crate::models::{PaperRecord, RawEntry, SourceConfig};
use crate::services::{FeedQuery, PaperSource, normalize};
use crate::storage::{Coverage, PaperCache};
use crate::utils::http::RequestPacer;

/// Papers inside the lookback window plus fetch statistics.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    /// Window records ordered by id.
    pub records: Vec<PaperRecord>,
    /// Records taken from upstream in this run.
    pub fetched: usize,
    /// Records filled in from the cache.
    pub from_cache: usize,
    /// Entries dropped as malformed.
    pub rejected: usize,
    /// Upstream calls made, retries included.
    pub requests: usize,
}

/// Pages through the upstream feed one paced request at a time.
pub struct Fetcher<'a> {
    source: &'a dyn PaperSource,
    cache: Option<&'a dyn PaperCache>,
    persist_cache: bool,
    config: &'a SourceConfig,
    pacer: RequestPacer,
    requests: usize,
}

impl<'a> Fetcher<'a> {
    pub fn new(source: &'a dyn PaperSource, config: &'a SourceConfig) -> Self {
        Self {
            source,
            cache: None,
            persist_cache: true,
            config,
            pacer: RequestPacer::from_config(config),
            requests: 0,
        }
    }

    /// Read through `cache`: stop paging at the first known paper the cache
    /// covers and take the rest of the window from it.
    pub fn with_cache(mut self, cache: &'a dyn PaperCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// When `false` the cache is only read: nothing is added, pruned or
    /// flushed.
    pub fn persist_cache(mut self, persist: bool) -> Self {
        self.persist_cache = persist;
        self
    }

    /// Collect every paper published in `[cutoff, today]`.
    ///
    /// Paging stops at a short page, at a paper older than `cutoff`, at a
    /// cached paper whose date the cache coverage vouches for, or once
    /// `max_fetch` entries were requested. Papers dated after `today` are
    /// skipped, so a backdated run sees the same window with or without a
    /// cache.
    pub async fn fetch_window(&mut self, cutoff: NaiveDate, today: NaiveDate) -> Result<FetchOutcome> {
        let mut window: BTreeMap<String, PaperRecord> = BTreeMap::new();
        let mut rejected = 0;
        let mut start = 0;
        let mut truncated = false;

        let coverage = match self.cache {
            Some(cache) => cache.coverage().await?,
            None => None,
        };
        // A known paper ends paging only if everything from the cutoff up to
        // its date is already cached.
        let vouches = |date: NaiveDate| coverage.is_some_and(|c| c.since <= cutoff && c.contains(date));

        loop {
            let max_results = self.config.page_size.min(self.config.max_fetch.saturating_sub(start));
            if max_results == 0 {
                truncated = true;
                log::warn!(
                    "Stopped paging at max_fetch = {}; older papers in the window are skipped",
                    self.config.max_fetch
                );
                break;
            }

            let query = FeedQuery {
                category: self.config.category.clone(),
                since: self.config.date_filter.then_some(cutoff),
                until: today,
                start,
                max_results,
            };
            let entries = self.fetch_page(&query).await?;
            let page_len = entries.len();
            start += page_len;

            let normalized = normalize(entries, today);
            rejected += normalized.rejected.len();

            let mut reached_cutoff = false;
            let mut reached_known = false;
            for record in normalized.records {
                if record.published_date < cutoff {
                    reached_cutoff = true;
                    continue;
                }
                if record.published_date > today {
                    continue;
                }
                if let Some(cache) = self.cache {
                    if cache.contains(&record.id).await? {
                        reached_known |= vouches(record.published_date);
                        continue;
                    }
                }
                window.entry(record.id.clone()).or_insert(record);
            }

            log::debug!("Page at {}: {} entries, {} in window so far", query.start, page_len, window.len());

            if reached_known {
                log::info!("Reached papers already cached; filling the window from the cache");
                break;
            }
            if reached_cutoff || page_len < max_results {
                break;
            }
        }

        let fetched = window.len();
        let mut from_cache = 0;

        if let Some(cache) = self.cache {
            for record in cache.records_between(cutoff, today).await? {
                if !window.contains_key(&record.id) {
                    from_cache += 1;
                    window.insert(record.id.clone(), record);
                }
            }

            if self.persist_cache {
                for record in window.values() {
                    cache.put(record.clone()).await?;
                }

                let fetched_range = Coverage::new(cutoff, today);
                let covered = match (truncated, coverage) {
                    (true, old) => old,
                    (false, Some(old)) => Some(old.merge(fetched_range)),
                    (false, None) => Some(fetched_range),
                };
                cache.set_coverage(covered.and_then(|c| c.clamp_from(cutoff))).await?;

                let pruned = cache.prune_before(cutoff).await?;
                if let Err(e) = cache.flush().await {
                    log::warn!("Could not persist cache: {}", e);
                }
                log::debug!("Cache: {} pruned, {} kept", pruned, cache.len().await?);
            } else {
                log::debug!("Cache left untouched");
            }
        }

        log::info!(
            "Fetched {} papers in {} requests ({} from cache, {} malformed)",
            fetched,
            self.requests,
            from_cache,
            rejected
        );

        Ok(FetchOutcome {
            records: window.into_values().collect(),
            fetched,
            from_cache,
            rejected,
            requests: self.requests,
        })
    }

    /// One page, retried with exponential backoff on transient failures.
    async fn fetch_page(&mut self, query: &FeedQuery) -> Result<Vec<RawEntry>> {
        let mut backoff = Duration::from_millis(self.config.retry_backoff_ms);
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            self.pacer.wait().await;
            self.requests += 1;

            match self.source.fetch(query).await {
                Ok(entries) => return Ok(entries),
                Err(e) if e.is_transient() && attempt <= self.config.max_retries => {
                    log::warn!("Upstream attempt {} failed: {}; retrying in {:?}", attempt, e, backoff);
                    tokio::time::sleep(backoff).await;
                    backoff = backoff.saturating_mul(2);
                }
                Err(e) if e.is_transient() => return Err(AppError::upstream(attempt, e)),
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::tests::{ScriptedSource, raw_entry, source_config, status_error};
    use crate::storage::MemoryCache;
    use tokio::time::Instant;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
    }

    fn ids(records: &[PaperRecord]) -> Vec<&str> {
        records.iter().map(|r| r.id.as_str()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_pages_until_short_page() {
        let source = ScriptedSource::new(vec![
            Ok(vec![raw_entry("2410.00004", 14), raw_entry("2410.00003", 13)]),
            Ok(vec![raw_entry("2410.00002", 12)]),
        ]);
        let mut config = source_config();
        config.page_size = 2;

        let started = Instant::now();
        let outcome = Fetcher::new(&source, &config)
            .fetch_window(day(8), day(15))
            .await
            .unwrap();

        assert_eq!(ids(&outcome.records), vec!["2410.00002", "2410.00003", "2410.00004"]);
        assert_eq!(outcome.requests, 2);
        assert!(started.elapsed() >= Duration::from_secs(3));

        let queries = source.queries();
        assert_eq!(queries[1].start, 2);
        assert_eq!(queries[0].since, Some(day(8)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_at_cutoff() {
        let source = ScriptedSource::new(vec![
            Ok(vec![raw_entry("2410.00004", 14), raw_entry("2410.00001", 2)]),
            Ok(vec![raw_entry("2410.00000", 1)]),
        ]);
        let mut config = source_config();
        config.page_size = 2;

        let outcome = Fetcher::new(&source, &config)
            .fetch_window(day(8), day(15))
            .await
            .unwrap();

        assert_eq!(ids(&outcome.records), vec!["2410.00004"]);
        assert_eq!(outcome.requests, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_failures() {
        let source = ScriptedSource::new(vec![
            Err(status_error(503)),
            Ok(vec![raw_entry("2410.00004", 14)]),
        ]);
        let config = source_config();

        let started = Instant::now();
        let outcome = Fetcher::new(&source, &config)
            .fetch_window(day(8), day(15))
            .await
            .unwrap();

        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.requests, 2);
        assert!(started.elapsed() >= Duration::from_millis(config.retry_backoff_ms));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_retries() {
        let source = ScriptedSource::new(vec![
            Err(status_error(503)),
            Err(status_error(502)),
            Err(status_error(503)),
            Ok(vec![raw_entry("2410.00004", 14)]),
        ]);
        let mut config = source_config();
        config.max_retries = 2;

        let err = Fetcher::new(&source, &config)
            .fetch_window(day(8), day(15))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::UpstreamUnavailable { attempts: 3, .. }));
        assert_eq!(source.queries().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_feed_errors_are_not_retried() {
        let source = ScriptedSource::new(vec![Err(AppError::feed("html page"))]);
        let config = source_config();

        let err = Fetcher::new(&source, &config)
            .fetch_window(day(8), day(15))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Feed(_)));
        assert_eq!(source.queries().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_entries_are_skipped() {
        let mut broken = raw_entry("2410.00003", 13);
        broken.title = None;
        let source = ScriptedSource::new(vec![Ok(vec![raw_entry("2410.00004", 14), broken])]);
        let config = source_config();

        let outcome = Fetcher::new(&source, &config)
            .fetch_window(day(8), day(15))
            .await
            .unwrap();

        assert_eq!(ids(&outcome.records), vec!["2410.00004"]);
        assert_eq!(outcome.rejected, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_fills_window() {
        let cached = crate::services::normalizer::normalize_entry(raw_entry("2410.00002", 12), day(15)).unwrap();
        let stale = crate::services::normalizer::normalize_entry(raw_entry("2409.00009", 1), day(15)).unwrap();
        let cache = MemoryCache::with_coverage([cached, stale], Some(Coverage::new(day(1), day(12))));

        let source = ScriptedSource::new(vec![
            Ok(vec![raw_entry("2410.00003", 13), raw_entry("2410.00002", 12)]),
            Ok(vec![raw_entry("2410.00001", 11)]),
        ]);
        let mut config = source_config();
        config.page_size = 2;

        let outcome = Fetcher::new(&source, &config)
            .with_cache(&cache)
            .fetch_window(day(8), day(15))
            .await
            .unwrap();

        assert_eq!(ids(&outcome.records), vec!["2410.00002", "2410.00003"]);
        assert_eq!(outcome.fetched, 1);
        assert_eq!(outcome.from_cache, 1);
        assert_eq!(outcome.requests, 1);

        assert!(cache.contains("2410.00003").await.unwrap());
        assert!(!cache.contains("2409.00009").await.unwrap());
        assert_eq!(cache.current_coverage(), Some(Coverage::new(day(8), day(15))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_uncovered_cache_keeps_paging() {
        let cached = crate::services::normalizer::normalize_entry(raw_entry("2410.00002", 12), day(15)).unwrap();
        let cache = MemoryCache::with_records([cached]);

        let source = ScriptedSource::new(vec![
            Ok(vec![raw_entry("2410.00003", 13), raw_entry("2410.00002", 12)]),
            Ok(vec![raw_entry("2410.00001", 11)]),
        ]);
        let mut config = source_config();
        config.page_size = 2;

        let outcome = Fetcher::new(&source, &config)
            .with_cache(&cache)
            .fetch_window(day(8), day(15))
            .await
            .unwrap();

        assert_eq!(ids(&outcome.records), vec!["2410.00001", "2410.00002", "2410.00003"]);
        assert_eq!(outcome.requests, 2);
        assert_eq!(outcome.from_cache, 1);
        assert_eq!(cache.current_coverage(), Some(Coverage::new(day(8), day(15))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backdated_window_ignores_later_papers() {
        let later = crate::services::normalizer::normalize_entry(raw_entry("2410.00014", 14), day(15)).unwrap();
        let cache = MemoryCache::with_coverage([later], Some(Coverage::new(day(8), day(15))));

        let source = ScriptedSource::new(vec![Ok(vec![
            raw_entry("2410.00014", 14),
            raw_entry("2410.00009", 9),
        ])]);
        let config = source_config();

        let outcome = Fetcher::new(&source, &config)
            .with_cache(&cache)
            .fetch_window(day(3), day(10))
            .await
            .unwrap();

        assert_eq!(ids(&outcome.records), vec!["2410.00009"]);
        assert_eq!(outcome.from_cache, 0);
        assert_eq!(cache.current_coverage(), Some(Coverage::new(day(3), day(15))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_only_cache_is_not_modified() {
        let cached = crate::services::normalizer::normalize_entry(raw_entry("2410.00002", 12), day(15)).unwrap();
        let stale = crate::services::normalizer::normalize_entry(raw_entry("2409.00009", 1), day(15)).unwrap();
        let cache = MemoryCache::with_records([cached, stale]);

        let source = ScriptedSource::new(vec![Ok(vec![raw_entry("2410.00003", 13)])]);
        let config = source_config();

        let outcome = Fetcher::new(&source, &config)
            .with_cache(&cache)
            .persist_cache(false)
            .fetch_window(day(8), day(15))
            .await
            .unwrap();

        assert_eq!(ids(&outcome.records), vec!["2410.00002", "2410.00003"]);
        assert_eq!(cache.len().await.unwrap(), 2);
        assert!(!cache.contains("2410.00003").await.unwrap());
        assert_eq!(cache.current_coverage(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_errors_are_not_retried() {
        let source = ScriptedSource::new(vec![
            Err(status_error(404)),
            Ok(vec![raw_entry("2410.00004", 14)]),
        ]);
        let config = source_config();

        let err = Fetcher::new(&source, &config)
            .fetch_window(day(8), day(15))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Status { status: 404, .. }));
        assert_eq!(source.queries().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_respects_max_fetch() {
        let source = ScriptedSource::new(vec![
            Ok(vec![raw_entry("2410.00004", 14), raw_entry("2410.00003", 13)]),
            Ok(vec![raw_entry("2410.00002", 12)]),
        ]);
        let mut config = source_config();
        config.page_size = 2;
        config.max_fetch = 3;

        let outcome = Fetcher::new(&source, &config)
            .fetch_window(day(8), day(15))
            .await
            .unwrap();

        let queries = source.queries();
        assert_eq!(queries[1].max_results, 1);
        assert_eq!(outcome.records.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_truncated_fetch_keeps_old_coverage() {
        let cache = MemoryCache::new();
        let source = ScriptedSource::new(vec![Ok(vec![raw_entry("2410.00004", 14), raw_entry("2410.00003", 13)])]);
        let mut config = source_config();
        config.page_size = 2;
        config.max_fetch = 2;

        Fetcher::new(&source, &config)
            .with_cache(&cache)
            .fetch_window(day(8), day(15))
            .await
            .unwrap();

        assert_eq!(cache.len().await.unwrap(), 2);
        assert_eq!(cache.current_coverage(), None);
    }
}
