//! Per-source change-detection state persisted between runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The persisted state of one source.
///
/// Older cache files written by the shell-era scripts used `content_hash`,
/// `last_modified` and `last_check`; those keys are accepted as aliases.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRecord {
    /// Fingerprint of the last published notice set.
    #[serde(default, alias = "content_hash")]
    pub content_fingerprint: Option<String>,

    /// Last-Modified value echoed back as If-Modified-Since.
    #[serde(default, alias = "last_modified")]
    pub conditional_token: Option<String>,

    #[serde(default, alias = "last_check")]
    pub last_forced_refresh_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub last_success_at: Option<DateTime<Utc>>,
}

impl CacheRecord {
    /// True when no cycle has ever published for this source.
    pub fn is_empty(&self) -> bool {
        self.content_fingerprint.is_none()
    }

    /// Record a cycle that ended without publishing.
    pub fn mark_skipped(&mut self, now: DateTime<Utc>) {
        self.last_success_at = Some(now);
    }

    /// Record a cycle that wrote a feed.
    ///
    /// The forced-refresh timer restarts when the cycle was forced, and
    /// starts on the first publish so that a window exists at all.
    pub fn mark_published(
        &mut self, fingerprint: String, conditional_token: Option<String>, forced: bool, now: DateTime<Utc>,
    ) {
        self.content_fingerprint = Some(fingerprint);
        self.conditional_token = conditional_token;
        if forced || self.last_forced_refresh_at.is_none() {
            self.last_forced_refresh_at = Some(now);
        }
        self.last_success_at = Some(now);
    }
}
