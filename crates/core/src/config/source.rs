//! Per-source configuration: where to fetch, how to extract, where to publish.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// One notice board to syndicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Stable identifier used in logs and the `--source` filter.
    pub id: String,

    /// Page to fetch.
    pub url: String,

    /// Cache record name; defaults to `id`.
    #[serde(default)]
    pub cache_key: Option<String>,

    /// Feed file, relative to `output_dir` unless absolute.
    pub output: PathBuf,

    pub feed: FeedMeta,

    pub extractor: ExtractorSpec,

    /// Offset of the site's local time, used for date-only notices.
    #[serde(default)]
    pub utc_offset_hours: i32,

    #[serde(default = "default_forced_refresh_days")]
    pub forced_refresh_days: u32,

    /// Maximum number of items retained in the feed.
    #[serde(default = "default_max_items")]
    pub max_items: usize,

    /// Age after which `health` reports the feed as stale.
    #[serde(default = "default_health_max_age_hours")]
    pub health_max_age_hours: u64,

    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_forced_refresh_days() -> u32 {
    7
}

fn default_max_items() -> usize {
    50
}

fn default_health_max_age_hours() -> u64 {
    24
}

impl SourceConfig {
    pub fn cache_key(&self) -> &str {
        self.cache_key.as_deref().unwrap_or(&self.id)
    }

    pub fn forced_refresh_interval(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.forced_refresh_days))
    }

    /// Channel link: the configured one, or the source page itself.
    pub fn feed_link(&self) -> &str {
        self.feed.link.as_deref().unwrap_or(&self.url)
    }
}

/// Channel-level metadata of the published feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedMeta {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub copyright: Option<String>,
    /// Public URL of the feed itself, emitted as `atom:link rel="self"`.
    #[serde(default)]
    pub self_url: Option<String>,
}

/// Extraction strategy, selected per source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtractorSpec {
    /// One container element per notice.
    Cards(CardSelectors),
    /// One table row per notice.
    Table(TableLayout),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardSelectors {
    pub item: String,
    pub title: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default = "default_link_selector")]
    pub link: String,
    #[serde(default)]
    pub date: DateSource,
    #[serde(default = "default_card_date_formats")]
    pub date_formats: Vec<String>,
}

fn default_link_selector() -> String {
    "a".into()
}

fn default_card_date_formats() -> Vec<String> {
    vec!["%b %d %Y".into(), "%B %d %Y".into()]
}

/// Where a card's publication date comes from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "from", rename_all = "snake_case")]
pub enum DateSource {
    #[default]
    None,
    /// A single element holding the whole date.
    Text { selector: String },
    /// Separate day / month / year elements, assembled as `"{month} {day} {year}"`.
    Parts { day: String, month: String, year: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableLayout {
    #[serde(default = "default_table_selector")]
    pub table: String,
    #[serde(default = "default_header_rows")]
    pub header_rows: usize,
    #[serde(default = "default_title_column")]
    pub title_column: usize,
    #[serde(default = "default_date_column")]
    pub date_column: usize,
    #[serde(default = "default_link_column")]
    pub link_column: usize,
    #[serde(default = "default_table_date_formats")]
    pub date_formats: Vec<String>,
}

fn default_table_selector() -> String {
    "table".into()
}

fn default_header_rows() -> usize {
    1
}

fn default_title_column() -> usize {
    1
}

fn default_date_column() -> usize {
    2
}

fn default_link_column() -> usize {
    3
}

fn default_table_date_formats() -> Vec<String> {
    vec!["%d-%m-%Y".into(), "%Y-%m-%d".into()]
}

impl Default for TableLayout {
    fn default() -> Self {
        Self {
            table: default_table_selector(),
            header_rows: default_header_rows(),
            title_column: default_title_column(),
            date_column: default_date_column(),
            link_column: default_link_column(),
            date_formats: default_table_date_formats(),
        }
    }
}

impl TableLayout {
    /// Minimum number of cells a row needs to be considered a notice.
    pub fn min_cells(&self) -> usize {
        self.title_column.max(self.date_column).max(self.link_column) + 1
    }
}

/// Delay growth between attempts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backoff {
    /// `base * k` before attempt `k + 1`.
    #[default]
    Linear,
    /// `base * 2^(k-1)` before attempt `k + 1`.
    Exponential,
}

/// Attempt count and the explicit retryable-status classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default)]
    pub backoff: Backoff,
    /// Statuses that are retried.
    #[serde(default = "default_retry_statuses")]
    pub retry_statuses: Vec<u16>,
    /// Also retry every other 4xx.
    #[serde(default)]
    pub retry_client_errors: bool,
}

fn default_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    5_000
}

fn default_retry_statuses() -> Vec<u16> {
    vec![408, 425, 429, 500, 502, 503, 504]
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            base_delay_ms: default_base_delay_ms(),
            backoff: Backoff::default(),
            retry_statuses: default_retry_statuses(),
            retry_client_errors: false,
        }
    }
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    /// Whether a non-success, non-304 status should be retried.
    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retry_statuses.contains(&status) || (self.retry_client_errors && (400..500).contains(&status))
    }
}

/// The two boards the project was started for.
pub fn default_sources() -> Vec<SourceConfig> {
    vec![
        SourceConfig {
            id: "aust".into(),
            url: "https://aust.edu/notice".into(),
            cache_key: None,
            output: PathBuf::from("feed.xml"),
            feed: FeedMeta {
                title: "AUST Notice Board Updates".into(),
                description: "Latest notices from the Ahsanullah University of Science and Technology notice board."
                    .into(),
                link: None,
                language: Some("en".into()),
                copyright: None,
                self_url: None,
            },
            extractor: ExtractorSpec::Cards(CardSelectors {
                item: "div.card-info".into(),
                title: "h6.news_title_homepage".into(),
                summary: Some("p.news_excerpt".into()),
                link: default_link_selector(),
                date: DateSource::Parts { day: "p.day".into(), month: "p.month".into(), year: "p.year".into() },
                date_formats: default_card_date_formats(),
            }),
            utc_offset_hours: 6,
            forced_refresh_days: default_forced_refresh_days(),
            max_items: default_max_items(),
            health_max_age_hours: 6,
            retry: RetryConfig::default(),
        },
        SourceConfig {
            id: "shed-scholarship".into(),
            url: "https://shed.gov.bd/site/view/scholarship/%E0%A6%B6%E0%A6%BF%E0%A6%95%E0%A7%8D%E0%A6%B7%E0%A6%BE%E0%A6%AC%E0%A7%83%E0%A6%A4%E0%A7%8D%E0%A6%A4%E0%A6%BF-%E0%A6%AC%E0%A6%BF%E0%A6%9C%E0%A7%8D%E0%A6%9E%E0%A6%AA%E0%A7%8D%E0%A6%A4%E0%A6%BF".into(),
            cache_key: None,
            output: PathBuf::from("shed_scholarship_feed.xml"),
            feed: FeedMeta {
                title: "Bangladesh MoE Scholarship Notices".into(),
                description: "Latest scholarship notices from the Secondary and Higher Education Division, \
                              Ministry of Education, Bangladesh."
                    .into(),
                link: None,
                language: Some("bn-BD".into()),
                copyright: Some("Ministry of Education, Bangladesh".into()),
                self_url: None,
            },
            extractor: ExtractorSpec::Table(TableLayout::default()),
            utc_offset_hours: 6,
            forced_refresh_days: default_forced_refresh_days(),
            max_items: default_max_items(),
            health_max_age_hours: 25,
            retry: RetryConfig::default(),
        },
    ]
}
