// src/services/scoring.rs

//! Relevance scoring against the interest profile.
//!
//! A paper's score is the sum of the weights of every profile term it
//! matches, grouped by signal kind, each group optionally capped:
//!
//! - keywords: case-insensitive substring of title or abstract
//! - authors: case-insensitive exact or substring match on any author name
//! - categories: case-insensitive substring of any category tag
//!
//! Papers outside the lookback window or mentioning an excluded term never
//! reach the scorer.

use chrono::NaiveDate;

use crate::models::{InterestProfile, MatchedSignal, PaperRecord, ScoredPaper, SignalKind, WeightedTerm};

/// Scores papers for one profile.
#[derive(Debug, Clone)]
pub struct Scorer<'a> {
    profile: &'a InterestProfile,
    keywords: Vec<(String, &'a WeightedTerm)>,
    authors: Vec<(String, &'a WeightedTerm)>,
    categories: Vec<(String, &'a WeightedTerm)>,
    exclude: Vec<String>,
}

impl<'a> Scorer<'a> {
    pub fn new(profile: &'a InterestProfile) -> Self {
        fn lowered(terms: &[WeightedTerm]) -> Vec<(String, &WeightedTerm)> {
            terms.iter().map(|t| (t.term.to_lowercase(), t)).collect()
        }

        Self {
            profile,
            keywords: lowered(&profile.keywords),
            authors: lowered(&profile.authors),
            categories: lowered(&profile.categories),
            exclude: profile.exclude.iter().map(|t| t.to_lowercase()).collect(),
        }
    }

    /// Whether the paper is published in `[today - lookback_days, today]`.
    pub fn in_window(&self, paper: &PaperRecord, today: NaiveDate) -> bool {
        (self.profile.cutoff(today)..=today).contains(&paper.published_date)
    }

    /// Whether the paper mentions an excluded term.
    pub fn is_excluded(&self, paper: &PaperRecord) -> bool {
        if self.exclude.is_empty() {
            return false;
        }
        let title = paper.title.to_lowercase();
        let abstract_text = paper.abstract_text.to_lowercase();
        self.exclude
            .iter()
            .any(|t| title.contains(t) || abstract_text.contains(t))
    }

    /// Score a single paper. Depends only on the paper and the profile.
    pub fn score(&self, paper: &PaperRecord) -> ScoredPaper {
        let title = paper.title.to_lowercase();
        let abstract_text = paper.abstract_text.to_lowercase();
        let authors: Vec<String> = paper.authors.iter().map(|a| a.to_lowercase()).collect();
        let categories: Vec<String> = paper.categories.iter().map(|c| c.to_lowercase()).collect();

        let mut matched = Vec::new();

        let keyword_score = sum_group(
            &self.keywords,
            SignalKind::Keyword,
            self.profile.keyword_multiplier,
            self.profile.max_keyword_score,
            &mut matched,
            |term| title.contains(term) || abstract_text.contains(term),
        );
        let author_score = sum_group(
            &self.authors,
            SignalKind::Author,
            self.profile.author_multiplier,
            self.profile.max_author_score,
            &mut matched,
            |term| authors.iter().any(|a| a == term || a.contains(term)),
        );
        let category_score = sum_group(
            &self.categories,
            SignalKind::Category,
            self.profile.category_multiplier,
            self.profile.max_category_score,
            &mut matched,
            |term| categories.iter().any(|c| c.contains(term)),
        );

        ScoredPaper {
            paper: paper.clone(),
            score: keyword_score + author_score + category_score,
            matched,
        }
    }

    /// Filter papers to the candidate pool and score them, preserving input
    /// order.
    pub fn score_all(&self, papers: &[PaperRecord], today: NaiveDate) -> Vec<ScoredPaper> {
        let mut out_of_window = 0usize;
        let mut excluded = 0usize;

        let scored: Vec<ScoredPaper> = papers
            .iter()
            .filter(|p| {
                let keep = self.in_window(p, today);
                if !keep {
                    out_of_window += 1;
                }
                keep
            })
            .filter(|p| {
                let keep = !self.is_excluded(p);
                if !keep {
                    log::debug!("Excluded {} ({})", p.id, p.title);
                    excluded += 1;
                }
                keep
            })
            .map(|p| self.score(p))
            .collect();

        log::info!(
            "Scored {} candidates ({} outside lookback window, {} excluded)",
            scored.len(),
            out_of_window,
            excluded
        );
        scored
    }
}

/// Sum the weights of matching terms in declaration order, scale, then cap.
fn sum_group(
    terms: &[(String, &WeightedTerm)],
    kind: SignalKind,
    multiplier: f64,
    cap: Option<f64>,
    matched: &mut Vec<MatchedSignal>,
    is_match: impl Fn(&str) -> bool,
) -> f64 {
    let mut total = 0.0;
    for (lowered, term) in terms {
        if is_match(lowered.as_str()) {
            total += term.weight;
            matched.push(MatchedSignal {
                kind,
                term: term.term.clone(),
                weight: term.weight,
            });
        }
    }
    let total = total * multiplier;
    match cap {
        Some(cap) => total.min(cap),
        None => total,
    }
}
