// src/services/mod.rs

//! Core services: normalization, scoring, selection, theorem extraction,
//! and the arXiv feed client.

pub mod arxiv;
pub mod normalizer;
pub mod scoring;
pub mod selector;
pub mod theorem;

pub use arxiv::{ArxivSource, FeedQuery, PaperSource, parse_atom};
pub use normalizer::{Normalized, canonical_id, normalize};
pub use scoring::Scorer;
pub use selector::{Selection, rank_order, select};
pub use theorem::TheoremExtractor;
