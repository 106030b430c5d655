//! RSS 2.0 feed assembly.
//!
//! ### Merge
//! Previously published items are read back from the existing feed file and
//! unioned with the fresh notices by link. A fresh notice replaces the prior
//! entry, except that a fresh notice whose date was inferred keeps the prior
//! published date. The result is sorted newest first (ties by link) and
//! capped at the source's `max_items`.
//!
//! ### Output
//! - Channel title, link, description, optional language and copyright
//! - `atom:link rel="self"` when the feed's public URL is configured
//! - `lastBuildDate` and `generator`
//! - Per item: title, link, description (summary or title), RFC 2822
//!   `pubDate`, and a guid that is a permalink unless the link is synthetic
//!
//! The channel must pass `rss` validation before it is written; the write
//! itself is atomic.

pub mod check;

pub use check::{FeedSummary, Health, check_health, validate_feed};

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use chrono::{DateTime, Utc};
use noticefeed_core::config::FeedMeta;
use noticefeed_core::persist::write_atomic;
use noticefeed_core::{Error, NoticeRecord, SourceConfig};
use rss::extension::atom::{AtomExtension, Link};
use rss::validation::Validate;
use rss::{Channel, ChannelBuilder, GuidBuilder, Item, ItemBuilder};

const GENERATOR: &str = concat!("noticefeed/", env!("CARGO_PKG_VERSION"));

/// Builds and writes the feed of one source.
#[derive(Debug, Clone)]
pub struct FeedBuilder {
    meta: FeedMeta,
    link: String,
    max_items: usize,
}

impl FeedBuilder {
    pub fn new(meta: FeedMeta, link: impl Into<String>, max_items: usize) -> Self {
        Self { meta, link: link.into(), max_items }
    }

    pub fn for_source(source: &SourceConfig) -> Self {
        Self::new(source.feed.clone(), source.feed_link(), source.max_items)
    }

    /// Merge `fresh` into the feed at `path` and atomically rewrite it.
    ///
    /// Returns the number of items written.
    pub fn publish(&self, path: &Path, fresh: Vec<NoticeRecord>, built_at: DateTime<Utc>) -> Result<usize, Error> {
        let prior = read_prior(path);
        let merged = merge(prior, fresh, self.max_items);
        let xml = self.render(&merged, built_at)?;
        write_atomic(path, &xml)?;
        Ok(merged.len())
    }

    /// Serialize `notices` as a pretty-printed RSS document.
    ///
    /// # Errors
    ///
    /// Returns `Error::Serialization` when a record or the channel metadata
    /// violates the feed's required fields.
    pub fn render(&self, notices: &[NoticeRecord], built_at: DateTime<Utc>) -> Result<Vec<u8>, Error> {
        if self.meta.title.trim().is_empty() {
            return Err(Error::Serialization("channel title is empty".into()));
        }

        let items = notices.iter().map(to_item).collect::<Result<Vec<_>, _>>()?;

        let mut channel = ChannelBuilder::default()
            .title(self.meta.title.clone())
            .link(self.link.clone())
            .description(self.meta.description.clone())
            .language(self.meta.language.clone())
            .copyright(self.meta.copyright.clone())
            .last_build_date(built_at.to_rfc2822())
            .generator(GENERATOR.to_string())
            .items(items)
            .build();

        if let Some(self_url) = &self.meta.self_url {
            let link = Link {
                href: self_url.clone(),
                rel: "self".into(),
                mime_type: Some("application/rss+xml".into()),
                ..Default::default()
            };
            channel.set_atom_ext(AtomExtension { links: vec![link] });
        }

        channel
            .validate()
            .map_err(|e| Error::Serialization(format!("RSS validation failed: {e}")))?;

        channel
            .pretty_write_to(Vec::new(), b' ', 2)
            .map_err(|e| Error::Serialization(format!("failed to write RSS: {e}")))
    }
}

fn to_item(notice: &NoticeRecord) -> Result<Item, Error> {
    if notice.title.trim().is_empty() {
        return Err(Error::Serialization(format!("notice {} has an empty title", notice.link)));
    }
    if notice.link.trim().is_empty() {
        return Err(Error::Serialization(format!("notice '{}' has no link", notice.title)));
    }

    let guid = GuidBuilder::default()
        .value(notice.link.clone())
        .permalink(notice.permalink)
        .build();

    Ok(ItemBuilder::default()
        .title(notice.title.clone())
        .link(notice.link.clone())
        .description(notice.description().to_string())
        .pub_date(notice.published.to_rfc2822())
        .guid(guid)
        .build())
}

/// Read back the items of a previously published feed.
///
/// A missing file yields no items; an unreadable one is logged and ignored
/// so a damaged feed is replaced rather than blocking publication.
pub fn read_prior(path: &Path) -> Vec<NoticeRecord> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "could not open previous feed, starting fresh");
            return Vec::new();
        }
    };

    match Channel::read_from(BufReader::new(file)) {
        Ok(channel) => channel.items().iter().filter_map(from_item).collect(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "could not parse previous feed, starting fresh");
            Vec::new()
        }
    }
}

fn from_item(item: &Item) -> Option<NoticeRecord> {
    let title = item.title().filter(|t| !t.trim().is_empty())?;
    let link = item.link().or_else(|| item.guid().map(|g| g.value()))?;
    let published = item
        .pub_date()
        .and_then(|d| DateTime::parse_from_rfc2822(d).ok())
        .map(|d| d.with_timezone(&Utc));
    let Some(published) = published else {
        tracing::debug!(link, "previous item without a readable pubDate dropped");
        return None;
    };

    let mut notice = NoticeRecord::new(title, link, published);
    if let Some(description) = item.description().filter(|d| *d != title) {
        notice = notice.with_summary(description);
    }
    notice.permalink = item.guid().is_none_or(|g| g.is_permalink());
    Some(notice)
}

/// Union `prior` and `fresh` by link, newest first, capped at `max_items`.
pub fn merge(prior: Vec<NoticeRecord>, fresh: Vec<NoticeRecord>, max_items: usize) -> Vec<NoticeRecord> {
    let mut by_link: HashMap<String, NoticeRecord> =
        prior.into_iter().map(|n| (n.link.clone(), n)).collect();

    for mut notice in fresh {
        if notice.date_inferred
            && let Some(previous) = by_link.get(&notice.link)
        {
            notice.published = previous.published;
            notice.date_inferred = previous.date_inferred;
        }
        by_link.insert(notice.link.clone(), notice);
    }

    let mut merged: Vec<_> = by_link.into_values().collect();
    merged.sort_by(|a, b| b.published.cmp(&a.published).then_with(|| a.link.cmp(&b.link)));
    merged.truncate(max_items);
    merged
}
