//! Core types and shared functionality for noticefeed.
//!
//! This crate provides:
//! - Unified error types
//! - Layered configuration and the source list
//! - Notice records and content fingerprints
//! - The per-source cache record and its atomic file store
//! - The change detector

pub mod cache;
pub mod clock;
pub mod config;
pub mod detect;
pub mod error;
pub mod notice;
pub mod persist;

pub use cache::{CacheRecord, CacheStore};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{AppConfig, SourceConfig};
pub use detect::{ChangeDetector, Decision, Detection};
pub use error::Error;
pub use notice::NoticeRecord;
