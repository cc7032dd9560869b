// src/pipeline/run.rs

//! One complete digest run.

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::Result;
use crate::models::Config;
use crate::rendering::{DigestMeta, renderer_for};
use crate::services::{PaperSource, TheoremExtractor};
use crate::storage::{LocalStorage, PaperCache};
use crate::utils::sha256_hex;

use super::{Fetcher, build_digest};

/// Per-invocation settings not found in the configuration file.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Run date; the lookback window ends here.
    pub today: NaiveDate,
    /// Rank and render, but write nothing: no artifact, no cache update.
    pub dry_run: bool,
}

/// Machine-readable result of a run, printed by the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub date: NaiveDate,
    pub since: NaiveDate,
    pub fetched: usize,
    pub from_cache: usize,
    pub rejected: usize,
    pub requests: usize,
    pub listed: usize,
    pub detailed: usize,
    pub title_only: usize,
    /// Written artifact; `None` on a dry run.
    pub artifact: Option<String>,
    pub sha256: String,
}

/// Fetch, rank, render and write one digest.
///
/// The document is rendered completely in memory before anything is
/// written, so a failing run leaves no artifact behind.
pub async fn run_digest(
    config: &Config,
    source: &dyn PaperSource,
    cache: Option<&dyn PaperCache>,
    options: RunOptions,
) -> Result<RunSummary> {
    let extractor = TheoremExtractor::new(&config.extraction)?;
    let today = options.today;
    let since = config.profile.cutoff(today);

    log::info!(
        "[STEP 1/3] Fetching {} papers submitted {} to {}",
        config.source.category,
        since,
        today
    );
    let mut fetcher = Fetcher::new(source, &config.source).persist_cache(!options.dry_run);
    if let Some(cache) = cache {
        fetcher = fetcher.with_cache(cache);
    }
    let fetched = fetcher.fetch_window(since, today).await?;

    log::info!("[STEP 2/3] Ranking {} papers", fetched.records.len());
    let digest = build_digest(&fetched.records, &config.profile, &extractor, today);

    log::info!("[STEP 3/3] Rendering {:?} digest", config.output.format);
    let meta = DigestMeta::from_output(&config.output, &config.source.category, since, today);
    let bytes = renderer_for(config.output.format).render(&digest, &meta)?;
    let sha256 = sha256_hex(&bytes);

    let artifact = if options.dry_run {
        log::info!("Dry run: {} bytes rendered, nothing written", bytes.len());
        None
    } else {
        let storage = LocalStorage::new(&config.output.dir);
        let path = storage
            .write_bytes(&config.output.file_name(today), &bytes)
            .await?;
        log::info!("Digest written to {}", path.display());
        Some(path.display().to_string())
    };

    Ok(RunSummary {
        date: today,
        since,
        fetched: fetched.fetched,
        from_cache: fetched.from_cache,
        rejected: fetched.rejected,
        requests: fetched.requests,
        listed: digest.listed_count(),
        detailed: digest.detailed.len(),
        title_only: digest.title_only.len(),
        artifact,
        sha256,
    })
}
