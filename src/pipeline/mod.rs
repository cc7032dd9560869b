//! Pipeline entry points for digest runs.
//!
//! - `Fetcher`: paced paging over the upstream feed with the paper cache
//! - `build_digest`: score, rank, split and extract
//! - `run_digest`: one complete run ending in a written artifact

pub mod digest;
pub mod fetch;
pub mod run;

pub use digest::build_digest;
pub use fetch::{FetchOutcome, Fetcher};
pub use run::{RunOptions, RunSummary, run_digest};
