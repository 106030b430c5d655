//! Tabular notice boards: one row per notice.

use chrono::{DateTime, Utc};
use noticefeed_core::config::TableLayout;
use noticefeed_core::{Error, NoticeRecord};
use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::{Extractor, NoticeSet, RawNotice, element_text, parse_local_date, selector};
use crate::fetch::resolve_link;

/// Extracts notices from the rows of the first matching table.
pub struct TableExtractor {
    layout: TableLayout,
    table: Selector,
    row: Selector,
    cell: Selector,
    anchor: Selector,
    utc_offset_hours: i32,
}

impl TableExtractor {
    pub fn new(layout: &TableLayout, utc_offset_hours: i32) -> Result<Self, Error> {
        Ok(Self {
            layout: layout.clone(),
            table: selector(&layout.table)?,
            row: selector("tr")?,
            cell: selector("td")?,
            anchor: selector("a[href]")?,
            utc_offset_hours,
        })
    }

    fn scrape(&self, cells: &[ElementRef<'_>], page_url: &Url) -> Option<RawNotice> {
        let title = element_text(cells[self.layout.title_column]);
        if title.is_empty() {
            return None;
        }

        let date = element_text(cells[self.layout.date_column]);
        let published = parse_local_date(&date, &self.layout.date_formats, self.utc_offset_hours);
        if published.is_none() {
            tracing::warn!(title = %title, date = %date, "unparseable notice date, using fetch time");
        }

        let link = cells[self.layout.link_column]
            .select(&self.anchor)
            .find_map(|a| a.attr("href"))
            .and_then(|href| resolve_link(page_url, href));

        Some(RawNotice { title, summary: None, link, published })
    }
}

impl Extractor for TableExtractor {
    fn extract(&self, body: &[u8], page_url: &Url, fetched_at: DateTime<Utc>) -> Result<Vec<NoticeRecord>, Error> {
        let html = String::from_utf8_lossy(body);
        let document = Html::parse_document(&html);

        let table = document
            .select(&self.table)
            .next()
            .ok_or_else(|| Error::Extraction(format!("no element matches `{}`", self.layout.table)))?;

        let min_cells = self.layout.min_cells();
        let mut rows = 0usize;
        let mut notices = NoticeSet::default();
        for row in table.select(&self.row).skip(self.layout.header_rows) {
            rows += 1;
            let cells: Vec<_> = row.select(&self.cell).collect();
            if cells.len() < min_cells {
                tracing::debug!(row = rows, cells = cells.len(), min_cells, "short table row skipped");
                continue;
            }
            match self.scrape(&cells, page_url) {
                Some(raw) => notices.push(raw.into_record(page_url, fetched_at)),
                None => tracing::warn!(row = rows, "table row without a title skipped"),
            }
        }

        let notices = notices.into_vec();
        if notices.is_empty() {
            return Err(Error::Extraction(format!("table `{}` has no notice rows ({rows} scanned)", self.layout.table)));
        }

        tracing::debug!(rows, notices = notices.len(), "table extracted");
        Ok(notices)
    }
}
