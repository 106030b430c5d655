//! Notice extraction from fetched markup.
//!
//! Provides a stable extraction abstraction selected per source.
//!
//! ### Strategies
//! - [`CardsExtractor`]: one container element per notice, with title,
//!   summary, link and date located by CSS selectors inside it.
//! - [`TableExtractor`]: one table row per notice, fields by column index.
//!
//! ### Shared rules
//! - Titles and summaries have their whitespace collapsed; elements without
//!   a title are skipped with a warning.
//! - Relative links are resolved against the page URL. A notice without a
//!   usable link gets a synthetic identity, see [`synthetic_link`].
//! - Dates are site-local calendar days; a notice whose date cannot be read
//!   is stamped with the fetch time and flagged as inferred.
//! - Duplicate links keep their first occurrence.
//! - Markup that yields no notices at all is an [`Error::Extraction`]: the
//!   page structure has most likely changed.
//!
//! Extraction is deterministic for a given body, page URL and fetch time.

pub mod cards;
pub mod dates;
pub mod table;

pub use cards::CardsExtractor;
pub use dates::parse_local_date;
pub use table::TableExtractor;

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use noticefeed_core::config::ExtractorSpec;
use noticefeed_core::notice::collapse_whitespace;
use noticefeed_core::{Error, NoticeRecord};
use scraper::{ElementRef, Selector};
use sha2::{Digest, Sha256};
use url::Url;

/// Turns a fetched page into notice records.
pub trait Extractor: Send + Sync {
    /// Extract notices from `body`, fetched from `page_url` at `fetched_at`.
    fn extract(&self, body: &[u8], page_url: &Url, fetched_at: DateTime<Utc>) -> Result<Vec<NoticeRecord>, Error>;
}

/// Build the extractor a source is configured with.
///
/// # Errors
///
/// Returns `Error::InvalidInput` when a configured selector does not parse.
pub fn extractor_for(spec: &ExtractorSpec, utc_offset_hours: i32) -> Result<Box<dyn Extractor>, Error> {
    Ok(match spec {
        ExtractorSpec::Cards(selectors) => Box::new(CardsExtractor::new(selectors, utc_offset_hours)?),
        ExtractorSpec::Table(layout) => Box::new(TableExtractor::new(layout, utc_offset_hours)?),
    })
}

pub(crate) fn selector(css: &str) -> Result<Selector, Error> {
    Selector::parse(css).map_err(|e| Error::InvalidInput(format!("invalid selector `{css}`: {e}")))
}

/// Whitespace-collapsed text content of an element.
pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

/// Stable identity for a notice that has no link of its own.
///
/// `<page_url>#notice-<first 12 hex of sha256(title|summary)>`, so the same
/// notice maps to the same feed entry on every run.
pub fn synthetic_link(page_url: &Url, title: &str, summary: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update(b"|");
    hasher.update(summary.unwrap_or_default().as_bytes());
    let digest = hex::encode(hasher.finalize());

    let mut url = page_url.clone();
    url.set_fragment(Some(&format!("notice-{}", &digest[..12])));
    url.to_string()
}

/// Notices in page order with duplicate links dropped.
#[derive(Debug, Default)]
pub(crate) struct NoticeSet {
    seen: HashSet<String>,
    notices: Vec<NoticeRecord>,
}

impl NoticeSet {
    pub(crate) fn push(&mut self, notice: NoticeRecord) {
        if self.seen.insert(notice.link.clone()) {
            self.notices.push(notice);
        } else {
            tracing::debug!(link = %notice.link, "duplicate notice link skipped");
        }
    }

    pub(crate) fn into_vec(self) -> Vec<NoticeRecord> {
        self.notices
    }
}

/// Fields scraped for one notice before dates and links are settled.
pub(crate) struct RawNotice {
    pub(crate) title: String,
    pub(crate) summary: Option<String>,
    pub(crate) link: Option<String>,
    pub(crate) published: Option<DateTime<Utc>>,
}

impl RawNotice {
    pub(crate) fn into_record(self, page_url: &Url, fetched_at: DateTime<Utc>) -> NoticeRecord {
        let (link, permalink) = match self.link {
            Some(link) => (link, true),
            None => (synthetic_link(page_url, &self.title, self.summary.as_deref()), false),
        };

        let mut record = match self.published {
            Some(published) => NoticeRecord::new(self.title, link, published),
            None => NoticeRecord::new(self.title, link, fetched_at).inferred(),
        };
        if let Some(summary) = self.summary {
            record = record.with_summary(summary);
        }
        record.permalink = permalink;
        record
    }
}
