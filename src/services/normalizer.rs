// src/services/normalizer.rs

//! Record normalizer.
//!
//! Turns raw feed entries into [`PaperRecord`]s. Entries missing an id,
//! title or link are rejected individually; the rest of the batch is kept.

use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate};
use regex::Regex;

use crate::error::{AppError, Result};
use crate::models::{PaperRecord, RawEntry};

static VERSION_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"v\d+$").expect("version suffix pattern is valid"));

/// Records kept and entries rejected by one normalization pass.
#[derive(Debug, Default)]
pub struct Normalized {
    pub records: Vec<PaperRecord>,
    pub rejected: Vec<AppError>,
    pub duplicates: usize,
}

/// Normalize a batch of raw entries.
///
/// Duplicate ids are dropped, first occurrence wins. `today` is used as the
/// publication date of entries carrying no parseable timestamp.
pub fn normalize(entries: Vec<RawEntry>, today: NaiveDate) -> Normalized {
    let mut out = Normalized::default();
    let mut seen = HashSet::new();

    for (index, entry) in entries.into_iter().enumerate() {
        match normalize_entry(entry, today) {
            Ok(record) => {
                if seen.insert(record.id.clone()) {
                    out.records.push(record);
                } else {
                    log::debug!("Dropping duplicate entry {}", record.id);
                    out.duplicates += 1;
                }
            }
            Err(error) => {
                log::warn!("Skipping feed entry #{index}: {error}");
                out.rejected.push(error);
            }
        }
    }

    out
}

/// Normalize a single entry.
pub fn normalize_entry(entry: RawEntry, today: NaiveDate) -> Result<PaperRecord> {
    let raw_id = entry.id.as_deref().map(str::trim).unwrap_or_default();
    if raw_id.is_empty() {
        return Err(AppError::malformed("<unknown>", "missing id"));
    }
    let id = canonical_id(raw_id);

    let title = entry
        .title
        .as_deref()
        .map(collapse_whitespace)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::malformed(&id, "missing title"))?;

    let url = entry
        .link
        .as_deref()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .ok_or_else(|| AppError::malformed(&id, "missing link"))?;
    let url = url::Url::parse(url)
        .map_err(|e| AppError::malformed(&id, format!("invalid link {url:?}: {e}")))?
        .to_string();

    let published_date = parse_date(entry.published.as_deref())
        .or_else(|| parse_date(entry.updated.as_deref()))
        .unwrap_or_else(|| {
            log::debug!("Entry {id} has no usable timestamp; dating it {today}");
            today
        });

    let authors = entry
        .authors
        .iter()
        .map(|a| collapse_whitespace(a))
        .filter(|a| !a.is_empty())
        .collect();

    let categories = entry
        .categories
        .iter()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect();

    Ok(PaperRecord {
        id,
        title,
        authors,
        abstract_text: entry.summary.as_deref().map(collapse_whitespace).unwrap_or_default(),
        url,
        published_date,
        categories,
    })
}

/// Canonical form of an arXiv identifier.
///
/// `http://arxiv.org/abs/2410.01234v2` and `2410.01234v1` both become
/// `2410.01234`; old-style ids keep their archive prefix (`math/0501001`).
pub fn canonical_id(raw: &str) -> String {
    let raw = raw.trim();
    let tail = raw
        .split_once("/abs/")
        .map(|(_, tail)| tail)
        .unwrap_or(raw)
        .trim_end_matches('/');
    VERSION_SUFFIX.replace(tail, "").into_owned()
}

/// UTC calendar date of an RFC 3339 timestamp.
fn parse_date(value: Option<&str>) -> Option<NaiveDate> {
    let value = value?.trim();
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.naive_utc().date())
        .ok()
        .or_else(|| NaiveDate::parse_from_str(value, "%Y-%m-%d").ok())
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
