// src/pipeline/digest.rs

//! Score, rank, split and extract: everything between the fetched window and
//! the renderer. No I/O happens here.

use chrono::NaiveDate;

use crate::models::{DetailedEntry, DigestResult, InterestProfile, PaperRecord};
use crate::services::{Scorer, TheoremExtractor, select};

/// Build the digest for `records` as of `today`.
pub fn build_digest(
    records: &[PaperRecord],
    profile: &InterestProfile,
    extractor: &TheoremExtractor,
    today: NaiveDate,
) -> DigestResult {
    let scored = Scorer::new(profile).score_all(records, today);
    let selection = select(scored, profile.threshold, profile.detailed_limit());

    let detailed: Vec<DetailedEntry> = selection
        .detailed
        .into_iter()
        .map(|paper| {
            let theorem = extractor.extract(&paper.paper.abstract_text, None);
            if theorem.is_none() {
                log::debug!("No main result found in {}", paper.paper.id);
            }
            DetailedEntry { paper, theorem }
        })
        .collect();

    let digest = DigestResult::new(detailed, selection.title_only);
    log::info!(
        "Digest: {} detailed, {} title-only",
        digest.detailed.len(),
        digest.title_only.len()
    );
    digest
}
