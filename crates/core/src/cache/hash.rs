//! Content fingerprints over canonicalised notice sets.

use sha2::{Digest, Sha256};

use crate::notice::{NoticeRecord, collapse_whitespace};

/// Render the canonical, order-independent text form of a notice set.
///
/// One line per notice (`link \t title \t summary \t date`), whitespace
/// collapsed, lines sorted. Inferred dates render as `-` so a fetch-time
/// fallback never changes the fingerprint.
pub fn canonical_form(notices: &[NoticeRecord]) -> String {
    let mut lines: Vec<String> = notices
        .iter()
        .map(|n| {
            let date = if n.date_inferred { "-".to_string() } else { n.published.format("%Y-%m-%d").to_string() };
            format!(
                "{}\t{}\t{}\t{}",
                n.link.trim(),
                collapse_whitespace(&n.title),
                collapse_whitespace(n.summary.as_deref().unwrap_or("")),
                date
            )
        })
        .collect();
    lines.sort();
    lines.dedup();
    lines.join("\n")
}

/// Compute the content fingerprint of a notice set (SHA-256, lowercase hex).
pub fn fingerprint(notices: &[NoticeRecord]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_form(notices).as_bytes());
    hex::encode(hasher.finalize())
}
