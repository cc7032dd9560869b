// src/services/selector.rs

//! Threshold filter, ranking and tier split.

use std::cmp::Ordering;

use crate::models::ScoredPaper;

/// Survivors split into the two output tiers, both in rank order.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Selection {
    pub detailed: Vec<ScoredPaper>,
    pub title_only: Vec<ScoredPaper>,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.detailed.is_empty() && self.title_only.is_empty()
    }
}

/// Rank order: score descending, then newer first, then id ascending.
///
/// Scores are finite (weights and caps are validated), so `total_cmp`
/// agrees with numeric order and the whole comparison is a total order.
pub fn rank_order(a: &ScoredPaper, b: &ScoredPaper) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.paper.published_date.cmp(&a.paper.published_date))
        .then_with(|| a.paper.id.cmp(&b.paper.id))
}

/// Keep papers scoring at least `threshold`, rank them and promote the first
/// `top_n` to the detailed tier.
pub fn select(scored: Vec<ScoredPaper>, threshold: f64, top_n: usize) -> Selection {
    let candidates = scored.len();
    let mut survivors: Vec<ScoredPaper> = scored
        .into_iter()
        .filter(|p| p.score >= threshold)
        .collect();
    survivors.sort_by(rank_order);

    log::info!(
        "{} of {} candidates reached threshold {}",
        survivors.len(),
        candidates,
        threshold
    );

    let title_only = survivors.split_off(top_n.min(survivors.len()));
    Selection {
        detailed: survivors,
        title_only,
    }
}
