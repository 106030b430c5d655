//! Change detection: decide whether a freshly extracted notice set must be
//! republished.
//!
//! ### Decision order
//! 1. Fingerprint the canonicalised notices.
//! 2. `Forced` when the forced-refresh window has elapsed, regardless of
//!    the fingerprint. This guards against silent drift such as a selector
//!    that keeps producing the same wrong content.
//! 3. `Changed` when no fingerprint is cached (first run) or it differs.
//! 4. `Unchanged` otherwise.
//!
//! A "not modified" fetch never reaches the detector.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::cache::{CacheRecord, fingerprint};
use crate::notice::NoticeRecord;

/// Outcome of change detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Changed,
    Unchanged,
    Forced,
}

impl Decision {
    /// Whether the cycle must rebuild and write the feed.
    pub fn publishes(self) -> bool {
        matches!(self, Decision::Changed | Decision::Forced)
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Decision::Changed => "changed",
            Decision::Unchanged => "unchanged",
            Decision::Forced => "forced",
        };
        f.write_str(s)
    }
}

/// A decision together with the fingerprint it was based on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub decision: Decision,
    pub fingerprint: String,
}

/// Stateless change detector configured with the forced-refresh interval.
#[derive(Debug, Clone, Copy)]
pub struct ChangeDetector {
    forced_refresh_interval: Duration,
}

impl ChangeDetector {
    pub fn new(forced_refresh_interval: Duration) -> Self {
        Self { forced_refresh_interval }
    }

    pub fn forced_refresh_interval(&self) -> Duration {
        self.forced_refresh_interval
    }

    /// Whether the forced-refresh window has elapsed at `now`.
    ///
    /// The window only exists once a first publish has started the timer.
    pub fn refresh_due(&self, cache: &CacheRecord, now: DateTime<Utc>) -> bool {
        cache
            .last_forced_refresh_at
            .is_some_and(|last| now - last >= self.forced_refresh_interval)
    }

    pub fn decide(&self, notices: &[NoticeRecord], cache: &CacheRecord, now: DateTime<Utc>) -> Detection {
        let fingerprint = fingerprint(notices);

        let decision = if self.refresh_due(cache, now) {
            Decision::Forced
        } else if cache.content_fingerprint.as_deref() != Some(fingerprint.as_str()) {
            Decision::Changed
        } else {
            Decision::Unchanged
        };

        Detection { decision, fingerprint }
    }
}

impl Default for ChangeDetector {
    fn default() -> Self {
        Self::new(Duration::days(7))
    }
}
