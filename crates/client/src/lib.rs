//! Client code for noticefeed.
//!
//! This crate provides the HTTP fetcher with its retry policy, the notice
//! extractors, and RSS feed assembly and checks used by the CLI.

pub mod extract;
pub mod feed;
pub mod fetch;

pub use extract::{CardsExtractor, Extractor, TableExtractor, extractor_for};
pub use feed::{FeedBuilder, FeedSummary, Health, check_health, validate_feed};
pub use fetch::{FetchConfig, FetchResult, Fetcher, HttpFetcher, RetryPolicy, Sleeper, TokioSleeper};
