//! One source, one cycle.
//!
//! ### States
//! `Start → Fetching → (Skipped | Extracting) → Detecting → (Publishing | Skipped) → Done`,
//! with `Failed` reachable from every non-terminal state.
//!
//! - `Start`: load the cache record (absent or corrupt → empty).
//! - `Fetching`: conditional GET through the retry policy. The stored token
//!   is withheld when a forced refresh is due. "Not modified" → `Skipped`.
//! - `Extracting`: run the source's extractor over the body.
//! - `Detecting`: fingerprint and decide; `Unchanged` → `Skipped`.
//! - `Publishing`: merge and atomically write the feed, then the cache.
//!
//! `Skipped` and `Done` persist the cache record; `Failed` leaves both the
//! cache and the feed exactly as they were.

use std::fmt;
use std::path::PathBuf;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use noticefeed_client::fetch::canonicalize;
use noticefeed_client::{FeedBuilder, Fetcher, RetryPolicy, Sleeper, extractor_for};
use noticefeed_core::{CacheRecord, CacheStore, ChangeDetector, Clock, Decision, Detection, Error, NoticeRecord, SourceConfig};

/// Non-terminal stage a cycle was in when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    Fetching,
    Extracting,
    Detecting,
    Publishing,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Start => "start",
            Stage::Fetching => "fetching",
            Stage::Extracting => "extracting",
            Stage::Detecting => "detecting",
            Stage::Publishing => "publishing",
        };
        f.write_str(s)
    }
}

/// Why a cycle ended without publishing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotModified,
    Unchanged,
}

/// Terminal state of a cycle.
#[derive(Debug)]
pub enum Outcome {
    Done { decision: Decision, items: usize },
    Skipped(SkipReason),
    Failed { stage: Stage, error: Error },
}

impl Outcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed { .. })
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Done { decision, items } => write!(f, "DONE ({decision}, {items} items)"),
            Outcome::Skipped(SkipReason::NotModified) => f.write_str("SKIPPED (not modified)"),
            Outcome::Skipped(SkipReason::Unchanged) => f.write_str("SKIPPED (unchanged)"),
            Outcome::Failed { stage, error } => write!(f, "FAILED at {stage}: {error}"),
        }
    }
}

enum State {
    Start,
    Fetching { cache: CacheRecord },
    Extracting { cache: CacheRecord, body: Bytes, token: Option<String> },
    Detecting { cache: CacheRecord, notices: Vec<NoticeRecord>, token: Option<String> },
    Publishing { cache: CacheRecord, notices: Vec<NoticeRecord>, detection: Detection, token: Option<String> },
    Skipped { cache: CacheRecord, reason: SkipReason },
    Terminal(Outcome),
}

/// Everything one cycle touches.
pub struct Cycle<'a> {
    pub source: &'a SourceConfig,
    pub feed_path: PathBuf,
    pub store: &'a CacheStore,
    pub fetcher: &'a dyn Fetcher,
    pub sleeper: &'a dyn Sleeper,
    pub clock: &'a dyn Clock,
}

impl Cycle<'_> {
    /// Drive the state machine to a terminal state.
    pub async fn run(&self) -> Outcome {
        let detector = ChangeDetector::new(self.source.forced_refresh_interval());
        let now = self.clock.now();
        let mut state = State::Start;

        loop {
            state = match state {
                State::Start => match self.store.load(self.source.cache_key()) {
                    Ok(cache) => State::Fetching { cache },
                    Err(error) => self.fail(Stage::Start, error),
                },
                State::Fetching { cache } => self.fetch(cache, &detector, now).await,
                State::Extracting { cache, body, token } => self.extract(cache, &body, token, now),
                State::Detecting { cache, notices, token } => {
                    let detection = detector.decide(&notices, &cache, now);
                    tracing::info!(source = %self.source.id, decision = %detection.decision, notices = notices.len(), "change detection");
                    if detection.decision.publishes() {
                        State::Publishing { cache, notices, detection, token }
                    } else {
                        State::Skipped { cache, reason: SkipReason::Unchanged }
                    }
                }
                State::Publishing { cache, notices, detection, token } => {
                    self.publish(cache, notices, detection, token, now)
                }
                State::Skipped { mut cache, reason } => {
                    cache.mark_skipped(now);
                    let stage = match reason {
                        SkipReason::NotModified => Stage::Fetching,
                        SkipReason::Unchanged => Stage::Detecting,
                    };
                    match self.store.save(self.source.cache_key(), &cache) {
                        Ok(()) => State::Terminal(Outcome::Skipped(reason)),
                        Err(error) => self.fail(stage, error),
                    }
                }
                State::Terminal(outcome) => return outcome,
            };
        }
    }

    async fn fetch(&self, cache: CacheRecord, detector: &ChangeDetector, now: DateTime<Utc>) -> State {
        let url = match canonicalize(&self.source.url) {
            Ok(url) => url,
            Err(e) => return self.fail(Stage::Fetching, Error::InvalidUrl(e.to_string())),
        };

        let token = if detector.refresh_due(&cache, now) {
            tracing::info!(source = %self.source.id, "forced refresh due, requesting unconditionally");
            None
        } else {
            cache.conditional_token.clone()
        };

        let policy = RetryPolicy::new(self.source.retry.clone());
        let result = policy
            .execute(&self.source.id, self.sleeper, |_| self.fetcher.fetch(&url, token.as_deref()))
            .await;

        match result {
            Ok(fetched) => match fetched.body {
                None => {
                    tracing::info!(source = %self.source.id, status = fetched.status, "not modified");
                    State::Skipped { cache, reason: SkipReason::NotModified }
                }
                Some(body) => {
                    tracing::info!(source = %self.source.id, status = fetched.status, bytes = body.len(), fetch_ms = fetched.fetch_ms, "fetched");
                    State::Extracting { cache, body, token: fetched.conditional_token }
                }
            },
            Err(error) => self.fail(Stage::Fetching, error),
        }
    }

    fn extract(&self, cache: CacheRecord, body: &[u8], token: Option<String>, now: DateTime<Utc>) -> State {
        let page_url = match canonicalize(&self.source.url) {
            Ok(url) => url,
            Err(e) => return self.fail(Stage::Extracting, Error::InvalidUrl(e.to_string())),
        };

        let notices = extractor_for(&self.source.extractor, self.source.utc_offset_hours)
            .and_then(|extractor| extractor.extract(body, &page_url, now));

        match notices {
            Ok(notices) => State::Detecting { cache, notices, token },
            Err(error) => self.fail(Stage::Extracting, error),
        }
    }

    fn publish(
        &self, mut cache: CacheRecord, notices: Vec<NoticeRecord>, detection: Detection, token: Option<String>,
        now: DateTime<Utc>,
    ) -> State {
        let builder = FeedBuilder::for_source(self.source);
        let items = match builder.publish(&self.feed_path, notices, now) {
            Ok(items) => items,
            Err(error) => return self.fail(Stage::Publishing, error),
        };

        let forced = detection.decision == Decision::Forced;
        cache.mark_published(detection.fingerprint, token, forced, now);
        if let Err(error) = self.store.save(self.source.cache_key(), &cache) {
            return self.fail(Stage::Publishing, error);
        }

        tracing::info!(source = %self.source.id, decision = %detection.decision, items, path = %self.feed_path.display(), "feed published");
        State::Terminal(Outcome::Done { decision: detection.decision, items })
    }

    fn fail(&self, stage: Stage, error: Error) -> State {
        if matches!(error, Error::Extraction(_)) {
            tracing::error!(
                source = %self.source.id,
                stage = %stage,
                alert = "content-structure",
                error = %error,
                "page structure no longer matches the extractor"
            );
        } else {
            tracing::error!(source = %self.source.id, stage = %stage, code = error.code(), error = %error, "cycle failed");
        }
        State::Terminal(Outcome::Failed { stage, error })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use noticefeed_client::FetchResult;
    use noticefeed_core::FixedClock;
    use noticefeed_core::cache::fingerprint;
    use noticefeed_core::config::default_sources;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;
    use std::time::Duration;
    use url::Url;

    pub(crate) const AUST_PAGE: &str = r#"
        <html><body>
          <div class="card-info"><a href="/notice/201">
            <p class="day">11</p><p class="month">Apr</p><p class="year">2025</p>
            <h6 class="news_title_homepage">Class test routine</h6>
            <p class="news_excerpt">Routine for spring semester.</p>
          </a></div>
          <div class="card-info"><a href="/notice/202">
            <p class="day">12</p><p class="month">Apr</p><p class="year">2025</p>
            <h6 class="news_title_homepage">Eid holidays</h6>
          </a></div>
        </body></html>
    "#;

    pub(crate) const LAST_MODIFIED: &str = "Sat, 12 Apr 2025 04:00:00 GMT";

    /// Replays scripted responses per URL and records the tokens it was sent.
    #[derive(Default)]
    pub(crate) struct StubFetcher {
        responses: Mutex<HashMap<String, VecDeque<Result<FetchResult, Error>>>>,
        pub(crate) tokens: Mutex<Vec<Option<String>>>,
    }

    impl StubFetcher {
        pub(crate) fn respond(&self, url: &str, response: Result<FetchResult, Error>) {
            self.responses.lock().unwrap().entry(url.to_string()).or_default().push_back(response);
        }

        pub(crate) fn page(&self, url: &str, html: &str) {
            self.respond(
                url,
                Ok(FetchResult {
                    url: Url::parse(url).unwrap(),
                    status: 200,
                    body: Some(Bytes::from(html.to_string())),
                    conditional_token: Some(LAST_MODIFIED.into()),
                    fetch_ms: 1,
                }),
            );
        }

        pub(crate) fn not_modified(&self, url: &str) {
            self.respond(
                url,
                Ok(FetchResult {
                    url: Url::parse(url).unwrap(),
                    status: 304,
                    body: None,
                    conditional_token: Some(LAST_MODIFIED.into()),
                    fetch_ms: 1,
                }),
            );
        }
    }

    #[async_trait]
    impl Fetcher for StubFetcher {
        async fn fetch(&self, url: &Url, conditional_token: Option<&str>) -> Result<FetchResult, Error> {
            self.tokens.lock().unwrap().push(conditional_token.map(str::to_string));
            self.responses
                .lock()
                .unwrap()
                .get_mut(url.as_str())
                .and_then(VecDeque::pop_front)
                .unwrap_or_else(|| Err(Error::Network(format!("no scripted response for {url}"))))
        }
    }

    #[derive(Default)]
    pub(crate) struct NoSleep;

    #[async_trait]
    impl Sleeper for NoSleep {
        async fn sleep(&self, _duration: Duration) {}
    }

    pub(crate) fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 12, 6, 0, 0).unwrap()
    }

    fn aust() -> SourceConfig {
        let mut source = default_sources().remove(0);
        source.retry.base_delay_ms = 1;
        source
    }

    struct Harness {
        dir: tempfile::TempDir,
        store: CacheStore,
        fetcher: StubFetcher,
        clock: FixedClock,
    }

    impl Harness {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let store = CacheStore::new(dir.path().join("cache"));
            Self { dir, store, fetcher: StubFetcher::default(), clock: FixedClock::new(now()) }
        }

        fn feed_path(&self) -> PathBuf {
            self.dir.path().join("feed.xml")
        }

        async fn run(&self, source: &SourceConfig) -> Outcome {
            let cycle = Cycle {
                source,
                feed_path: self.feed_path(),
                store: &self.store,
                fetcher: &self.fetcher,
                sleeper: &NoSleep,
                clock: &self.clock,
            };
            cycle.run().await
        }
    }

    fn prior_notices() -> Vec<NoticeRecord> {
        vec![
            NoticeRecord::new("Admission circular", "https://aust.edu/notice/150", now() - chrono::Duration::days(20)),
            NoticeRecord::new("Library closure", "https://aust.edu/notice/160", now() - chrono::Duration::days(10)),
        ]
    }

    #[tokio::test]
    async fn test_new_content_publishes_and_merges() {
        let h = Harness::new();
        let mut source = aust();
        source.max_items = 3;
        FeedBuilder::for_source(&source)
            .publish(&h.feed_path(), prior_notices(), now() - chrono::Duration::days(10))
            .unwrap();
        h.store
            .save("aust", &CacheRecord { content_fingerprint: Some("old".into()), ..Default::default() })
            .unwrap();
        h.fetcher.page("https://aust.edu/notice", AUST_PAGE);

        let outcome = h.run(&source).await;
        assert!(matches!(outcome, Outcome::Done { decision: Decision::Changed, items: 3 }), "{outcome}");

        let feed = noticefeed_client::feed::read_prior(&h.feed_path());
        let links: Vec<_> = feed.iter().map(|n| n.link.as_str()).collect();
        assert_eq!(
            links,
            vec!["https://aust.edu/notice/202", "https://aust.edu/notice/201", "https://aust.edu/notice/160"]
        );

        let cache = h.store.load("aust").unwrap();
        let extracted = extractor_for(&source.extractor, source.utc_offset_hours)
            .unwrap()
            .extract(AUST_PAGE.as_bytes(), &Url::parse("https://aust.edu/notice").unwrap(), now())
            .unwrap();
        assert_eq!(cache.content_fingerprint, Some(fingerprint(&extracted)));
        assert_eq!(cache.conditional_token.as_deref(), Some(LAST_MODIFIED));
        assert_eq!(cache.last_success_at, Some(now()));
        assert_eq!(cache.last_forced_refresh_at, Some(now()));
    }

    #[tokio::test]
    async fn test_not_modified_skips_without_writes() {
        let h = Harness::new();
        let before = CacheRecord {
            content_fingerprint: Some("abc".into()),
            conditional_token: Some(LAST_MODIFIED.into()),
            last_forced_refresh_at: Some(now() - chrono::Duration::days(1)),
            last_success_at: Some(now() - chrono::Duration::hours(1)),
        };
        h.store.save("aust", &before).unwrap();
        h.fetcher.not_modified("https://aust.edu/notice");

        let outcome = h.run(&aust()).await;
        assert!(matches!(outcome, Outcome::Skipped(SkipReason::NotModified)), "{outcome}");

        assert_eq!(h.fetcher.tokens.lock().unwrap().as_slice(), &[Some(LAST_MODIFIED.to_string())]);
        assert!(!h.feed_path().exists());

        let after = h.store.load("aust").unwrap();
        assert_eq!(after.content_fingerprint, before.content_fingerprint);
        assert_eq!(after.last_forced_refresh_at, before.last_forced_refresh_at);
        assert_eq!(after.last_success_at, Some(now()));
    }

    #[tokio::test]
    async fn test_unchanged_content_skips_feed_write() {
        let h = Harness::new();
        h.fetcher.page("https://aust.edu/notice", AUST_PAGE);
        h.fetcher.page("https://aust.edu/notice", AUST_PAGE);

        assert!(matches!(h.run(&aust()).await, Outcome::Done { decision: Decision::Changed, .. }));
        let written = std::fs::read(h.feed_path()).unwrap();
        let first = h.store.load("aust").unwrap();

        h.clock.advance(chrono::Duration::hours(6));
        let outcome = h.run(&aust()).await;
        assert!(matches!(outcome, Outcome::Skipped(SkipReason::Unchanged)), "{outcome}");

        assert_eq!(std::fs::read(h.feed_path()).unwrap(), written);
        let second = h.store.load("aust").unwrap();
        assert_eq!(second.content_fingerprint, first.content_fingerprint);
        assert_eq!(second.last_forced_refresh_at, first.last_forced_refresh_at);
        assert_eq!(second.last_success_at, Some(now() + chrono::Duration::hours(6)));
    }

    #[tokio::test]
    async fn test_forced_refresh_omits_token_and_republishes() {
        let h = Harness::new();
        h.fetcher.page("https://aust.edu/notice", AUST_PAGE);
        h.fetcher.page("https://aust.edu/notice", AUST_PAGE);
        assert!(matches!(h.run(&aust()).await, Outcome::Done { .. }));

        h.clock.advance(chrono::Duration::days(7));
        let outcome = h.run(&aust()).await;
        assert!(matches!(outcome, Outcome::Done { decision: Decision::Forced, .. }), "{outcome}");

        let tokens = h.fetcher.tokens.lock().unwrap().clone();
        assert_eq!(tokens, vec![None, None]);

        let cache = h.store.load("aust").unwrap();
        assert_eq!(cache.last_forced_refresh_at, Some(now() + chrono::Duration::days(7)));
    }

    #[tokio::test]
    async fn test_extraction_failure_leaves_state_untouched() {
        let h = Harness::new();
        let before = CacheRecord { content_fingerprint: Some("abc".into()), ..Default::default() };
        h.store.save("aust", &before).unwrap();
        h.fetcher.page("https://aust.edu/notice", "<html><body><main>redesigned</main></body></html>");

        let outcome = h.run(&aust()).await;
        assert!(
            matches!(outcome, Outcome::Failed { stage: Stage::Extracting, error: Error::Extraction(_) }),
            "{outcome}"
        );
        assert_eq!(h.store.load("aust").unwrap(), before);
        assert!(!h.feed_path().exists());
    }

    #[tokio::test]
    async fn test_exhausted_fetch_fails_without_cache_mutation() {
        let h = Harness::new();
        for _ in 0..3 {
            h.fetcher.respond("https://aust.edu/notice", Err(Error::HttpStatus { status: 503, retryable: true }));
        }

        let outcome = h.run(&aust()).await;
        assert!(
            matches!(outcome, Outcome::Failed { stage: Stage::Fetching, error: Error::FetchExhausted { attempts: 3, .. } }),
            "{outcome}"
        );
        assert_eq!(h.fetcher.tokens.lock().unwrap().len(), 3);
        assert!(!h.store.path_for("aust").exists());
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failure() {
        let h = Harness::new();
        h.fetcher.respond("https://aust.edu/notice", Err(Error::FetchTimeout("slow".into())));
        h.fetcher.page("https://aust.edu/notice", AUST_PAGE);

        let outcome = h.run(&aust()).await;
        assert!(matches!(outcome, Outcome::Done { decision: Decision::Changed, items: 2 }), "{outcome}");
    }

    #[test]
    fn test_outcome_display() {
        let failed = Outcome::Failed { stage: Stage::Extracting, error: Error::Extraction("no cards".into()) };
        assert_eq!(failed.to_string(), "FAILED at extracting: EXTRACT_FAILED: no cards");
        assert!(failed.is_failed());
        assert_eq!(Outcome::Skipped(SkipReason::Unchanged).to_string(), "SKIPPED (unchanged)");
    }
}
