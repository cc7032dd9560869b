// src/models/mod.rs

//! Domain models for the digest application.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod digest;
mod paper;

// Re-export all public types
pub use config::{
    CONTACT_ENV, CacheConfig, Config, ExtractionConfig, InterestProfile, MIN_REQUEST_INTERVAL_SECS,
    OutputConfig, OutputFormat, SourceConfig, WeightedTerm,
};
pub use digest::{DetailedEntry, DigestResult};
pub use paper::{MatchedSignal, PaperRecord, RawEntry, ScoredPaper, SignalKind};
