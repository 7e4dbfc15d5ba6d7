//! Transcript Harvester - adaptive concurrent transcript fetching
//!
//! This library orchestrates bulk transcript fetches against a rate-limited
//! remote source: a sliding-window admission controller that retunes itself
//! from success/failure feedback, a bounded worker pool for the blocking
//! fetch calls, a time-boxed result cache, and a per-item retry pipeline
//! that isolates failures to the item that caused them.

pub mod cli;
pub mod config;
pub mod output;
pub mod service;
pub mod source;
pub mod utils;

pub use config::Config;
pub use service::{BatchOutcome, BatchSummary, LimiterStats, TranscriptProvider, TranscriptService};
pub use source::{FetchResult, FetchStatus, TranscriptEntry, TranscriptFetcher};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Error types specific to the harvester
#[derive(thiserror::Error, Debug)]
pub enum HarvestError {
    #[error("invalid video reference: {0}")]
    InvalidVideoId(String),

    #[error("batch too large: {0} videos (limit {1})")]
    BatchTooLarge(usize, usize),

    #[error("configuration error: {0}")]
    Config(String),
}
