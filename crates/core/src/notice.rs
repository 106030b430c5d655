//! Notice records produced by extractors and consumed by the feed builder.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single scraped notice.
///
/// Identity is the `link`; two records with the same link describe the same
/// notice even if their titles differ.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoticeRecord {
    pub title: String,
    /// Absolute URL, unique within a feed.
    pub link: String,
    pub published: DateTime<Utc>,
    /// True when `published` is the fetch time because no date could be parsed.
    #[serde(default)]
    pub date_inferred: bool,
    pub summary: Option<String>,
    /// Whether `link` points at the notice itself (vs. a synthetic identity).
    #[serde(default = "default_permalink")]
    pub permalink: bool,
}

fn default_permalink() -> bool {
    true
}

impl NoticeRecord {
    /// Create a permalink notice with a parsed publication date.
    pub fn new(title: impl Into<String>, link: impl Into<String>, published: DateTime<Utc>) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            published,
            date_inferred: false,
            summary: None,
            permalink: true,
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        let summary = collapse_whitespace(&summary.into());
        self.summary = if summary.is_empty() { None } else { Some(summary) };
        self
    }

    /// Mark the publication date as a fallback.
    pub fn inferred(mut self) -> Self {
        self.date_inferred = true;
        self
    }

    /// Text used as the feed item description: the summary, or the title when absent.
    pub fn description(&self) -> &str {
        self.summary.as_deref().unwrap_or(&self.title)
    }
}

/// Collapse every run of whitespace to a single space and trim the ends.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  Class\n\t routine   2025 "), "Class routine 2025");
        assert_eq!(collapse_whitespace("   "), "");
    }

    #[test]
    fn test_description_falls_back_to_title() {
        let at = Utc.with_ymd_and_hms(2025, 4, 10, 0, 0, 0).unwrap();
        let notice = NoticeRecord::new("Exam schedule", "https://example.edu/n/1", at);
        assert_eq!(notice.description(), "Exam schedule");

        let notice = notice.with_summary("  Mid-term   exams start Monday ");
        assert_eq!(notice.description(), "Mid-term exams start Monday");
    }

    #[test]
    fn test_blank_summary_is_dropped() {
        let at = Utc.with_ymd_and_hms(2025, 4, 10, 0, 0, 0).unwrap();
        let notice = NoticeRecord::new("t", "https://example.edu/n/1", at).with_summary(" \n ");
        assert!(notice.summary.is_none());
    }
}
