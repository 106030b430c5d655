//! Structural validation and freshness checks of published feeds.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use noticefeed_core::Error;
use rss::Channel;
use rss::validation::Validate;

/// What a structurally valid feed contains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSummary {
    pub items: usize,
    pub newest: Option<DateTime<Utc>>,
}

/// Parse and structurally check a feed file.
///
/// The document must have an `rss` root with a `channel` carrying a
/// title, link and description; every item needs a title or description
/// and a parseable `pubDate` when one is present.
///
/// # Errors
///
/// Returns `Error::CachePersistence` if the file cannot be read and
/// `Error::Serialization` describing the first structural problem found.
pub fn validate_feed(path: &Path) -> Result<FeedSummary, Error> {
    let file = File::open(path).map_err(|e| Error::CachePersistence(format!("{}: {e}", path.display())))?;
    let channel = Channel::read_from(BufReader::new(file))
        .map_err(|e| Error::Serialization(format!("{}: not an RSS document: {e}", path.display())))?;

    let invalid = |what: String| Error::Serialization(format!("{}: {what}", path.display()));

    for (name, value) in [("title", channel.title()), ("link", channel.link()), ("description", channel.description())] {
        if value.trim().is_empty() {
            return Err(invalid(format!("channel is missing <{name}>")));
        }
    }

    let mut newest: Option<DateTime<Utc>> = None;
    for (index, item) in channel.items().iter().enumerate() {
        if item.title().is_none() && item.description().is_none() {
            return Err(invalid(format!("item {index} has neither title nor description")));
        }
        if let Some(raw) = item.pub_date() {
            let published = DateTime::parse_from_rfc2822(raw)
                .map_err(|e| invalid(format!("item {index} has an invalid pubDate '{raw}': {e}")))?
                .with_timezone(&Utc);
            newest = newest.max(Some(published));
        }
    }

    channel.validate().map_err(|e| invalid(e.to_string()))?;

    Ok(FeedSummary { items: channel.items().len(), newest })
}

/// Freshness verdict for one feed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Health {
    Fresh { items: usize, age: Duration },
    Stale { age: Duration, max_age: Duration },
    Empty,
    Missing,
    Invalid(String),
}

impl Health {
    pub fn is_ok(&self) -> bool {
        matches!(self, Health::Fresh { .. })
    }
}

/// Check that the feed at `path` was rewritten within `max_age` of `now`
/// and holds at least one item.
pub fn check_health(path: &Path, max_age: Duration, now: SystemTime) -> Health {
    let modified = match std::fs::metadata(path).and_then(|m| m.modified()) {
        Ok(modified) => modified,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Health::Missing,
        Err(e) => return Health::Invalid(e.to_string()),
    };
    let age = now.duration_since(modified).unwrap_or_default();

    let summary = match validate_feed(path) {
        Ok(summary) => summary,
        Err(e) => return Health::Invalid(e.to_string()),
    };

    if age > max_age {
        Health::Stale { age, max_age }
    } else if summary.items == 0 {
        Health::Empty
    } else {
        Health::Fresh { items: summary.items, age }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::FeedBuilder;
    use chrono::TimeZone;
    use noticefeed_core::NoticeRecord;
    use noticefeed_core::config::default_sources;

    const HOUR: Duration = Duration::from_secs(3600);

    fn write_feed(path: &Path, notices: Vec<NoticeRecord>) {
        let built_at = Utc.with_ymd_and_hms(2025, 4, 12, 0, 0, 0).unwrap();
        FeedBuilder::for_source(&default_sources()[0]).publish(path, notices, built_at).unwrap();
    }

    fn notice() -> NoticeRecord {
        let at = Utc.with_ymd_and_hms(2025, 4, 10, 18, 0, 0).unwrap();
        NoticeRecord::new("Mid-term exam schedule", "https://aust.edu/notice/101", at)
    }

    #[test]
    fn test_validate_published_feed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feed.xml");
        write_feed(&path, vec![notice()]);

        let summary = validate_feed(&path).unwrap();
        assert_eq!(summary.items, 1);
        assert_eq!(summary.newest, Some(notice().published));
    }

    #[test]
    fn test_validate_rejects_missing_channel_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feed.xml");
        std::fs::write(
            &path,
            r#"<?xml version="1.0"?><rss version="2.0"><channel><title>t</title><description>d</description></channel></rss>"#,
        )
        .unwrap();

        let err = validate_feed(&path).unwrap_err();
        assert!(err.to_string().contains("<link>"));
    }

    #[test]
    fn test_validate_rejects_bad_pub_date() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feed.xml");
        std::fs::write(
            &path,
            r#"<rss version="2.0"><channel><title>t</title><link>https://aust.edu/notice</link><description>d</description>
               <item><title>a</title><pubDate>yesterday</pubDate></item></channel></rss>"#,
        )
        .unwrap();

        assert!(matches!(validate_feed(&path), Err(Error::Serialization(msg)) if msg.contains("pubDate")));
    }

    #[test]
    fn test_validate_rejects_non_rss() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feed.xml");
        std::fs::write(&path, "<html><body>oops</body></html>").unwrap();
        assert!(matches!(validate_feed(&path), Err(Error::Serialization(_))));

        let missing = dir.path().join("absent.xml");
        assert!(matches!(validate_feed(&missing), Err(Error::CachePersistence(_))));
    }

    #[test]
    fn test_health_states() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feed.xml");
        assert_eq!(check_health(&path, HOUR, SystemTime::now()), Health::Missing);

        write_feed(&path, vec![notice()]);
        let health = check_health(&path, HOUR, SystemTime::now());
        assert!(health.is_ok(), "{health:?}");

        let later = SystemTime::now() + 2 * HOUR;
        assert!(matches!(check_health(&path, HOUR, later), Health::Stale { .. }));
    }

    #[test]
    fn test_health_empty_feed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feed.xml");
        write_feed(&path, Vec::new());
        assert_eq!(check_health(&path, HOUR, SystemTime::now()), Health::Empty);
    }
}
