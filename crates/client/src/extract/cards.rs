//! Card-layout notice boards: one container element per notice.

use chrono::{DateTime, Utc};
use noticefeed_core::config::{CardSelectors, DateSource};
use noticefeed_core::{Error, NoticeRecord};
use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::{Extractor, NoticeSet, RawNotice, element_text, parse_local_date, selector};
use crate::fetch::resolve_link;

enum DateSelectors {
    None,
    Text(Selector),
    Parts { day: Selector, month: Selector, year: Selector },
}

/// Extracts notices laid out as repeated cards.
pub struct CardsExtractor {
    item_css: String,
    item: Selector,
    title: Selector,
    summary: Option<Selector>,
    link: Selector,
    date: DateSelectors,
    date_formats: Vec<String>,
    utc_offset_hours: i32,
}

impl CardsExtractor {
    pub fn new(selectors: &CardSelectors, utc_offset_hours: i32) -> Result<Self, Error> {
        let date = match &selectors.date {
            DateSource::None => DateSelectors::None,
            DateSource::Text { selector: css } => DateSelectors::Text(selector(css)?),
            DateSource::Parts { day, month, year } => {
                DateSelectors::Parts { day: selector(day)?, month: selector(month)?, year: selector(year)? }
            }
        };

        Ok(Self {
            item_css: selectors.item.clone(),
            item: selector(&selectors.item)?,
            title: selector(&selectors.title)?,
            summary: selectors.summary.as_deref().map(selector).transpose()?,
            link: selector(&selectors.link)?,
            date,
            date_formats: selectors.date_formats.clone(),
            utc_offset_hours,
        })
    }

    fn first_text(card: ElementRef<'_>, selector: &Selector) -> Option<String> {
        card.select(selector).next().map(element_text).filter(|text| !text.is_empty())
    }

    fn date_text(&self, card: ElementRef<'_>) -> Option<String> {
        match &self.date {
            DateSelectors::None => None,
            DateSelectors::Text(sel) => Self::first_text(card, sel),
            DateSelectors::Parts { day, month, year } => {
                let day = Self::first_text(card, day)?;
                let month = Self::first_text(card, month)?;
                let year = Self::first_text(card, year)?;
                Some(format!("{month} {day} {year}"))
            }
        }
    }

    fn scrape(&self, card: ElementRef<'_>, page_url: &Url) -> Option<RawNotice> {
        let title = Self::first_text(card, &self.title)?;
        let summary = self.summary.as_ref().and_then(|sel| Self::first_text(card, sel));
        let link = card
            .select(&self.link)
            .find_map(|a| a.attr("href"))
            .and_then(|href| resolve_link(page_url, href));

        let published = match self.date_text(card) {
            Some(text) => {
                let parsed = parse_local_date(&text, &self.date_formats, self.utc_offset_hours);
                if parsed.is_none() {
                    tracing::warn!(title = %title, date = %text, "unparseable notice date, using fetch time");
                }
                parsed
            }
            None => {
                if !matches!(self.date, DateSelectors::None) {
                    tracing::warn!(title = %title, "notice date not found, using fetch time");
                }
                None
            }
        };

        Some(RawNotice { title, summary, link, published })
    }
}

impl Extractor for CardsExtractor {
    fn extract(&self, body: &[u8], page_url: &Url, fetched_at: DateTime<Utc>) -> Result<Vec<NoticeRecord>, Error> {
        let html = String::from_utf8_lossy(body);
        let document = Html::parse_document(&html);

        let mut found = 0usize;
        let mut notices = NoticeSet::default();
        for card in document.select(&self.item) {
            found += 1;
            match self.scrape(card, page_url) {
                Some(raw) => notices.push(raw.into_record(page_url, fetched_at)),
                None => tracing::warn!(index = found, "notice element without a title skipped"),
            }
        }

        if found == 0 {
            return Err(Error::Extraction(format!("no elements match `{}`", self.item_css)));
        }

        let notices = notices.into_vec();
        if notices.is_empty() {
            return Err(Error::Extraction(format!("{found} `{}` element(s) but none has a title", self.item_css)));
        }

        tracing::debug!(elements = found, notices = notices.len(), "cards extracted");
        Ok(notices)
    }
}
