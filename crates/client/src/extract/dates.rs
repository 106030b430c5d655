//! Site-local publication dates.

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use noticefeed_core::notice::collapse_whitespace;

/// Parse a calendar date as local midnight at `utc_offset_hours` and convert to UTC.
///
/// Formats are `chrono` strftime patterns tried in order; the first that
/// parses wins. Returns `None` if none matches or the offset is out of range.
pub fn parse_local_date(text: &str, formats: &[String], utc_offset_hours: i32) -> Option<DateTime<Utc>> {
    let text = collapse_whitespace(text);
    if text.is_empty() {
        return None;
    }

    let offset = FixedOffset::east_opt(utc_offset_hours.checked_mul(3600)?)?;
    let date = formats.iter().find_map(|fmt| NaiveDate::parse_from_str(&text, fmt).ok())?;
    let local = offset.from_local_datetime(&date.and_hms_opt(0, 0, 0)?).single()?;

    Some(local.with_timezone(&Utc))
}
