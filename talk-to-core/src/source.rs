//! Calendar sources: fetching one feed into a timeline.

use async_trait::async_trait;
use futures::future::try_join_all;
use tracing::debug;

use crate::error::{TalkToError, TalkToResult};
use crate::event::Timeline;
use crate::ics::{FeedOptions, parse_timeline};

/// Fetches and parses one calendar feed.
#[async_trait]
pub trait CalendarSource: Send + Sync {
    /// Fetch the feed at `url` into events sorted ascending by begin.
    async fn fetch(&self, url: &str, options: &FeedOptions) -> TalkToResult<Timeline>;
}

/// Fetch every url concurrently.
///
/// All or nothing: the first failing source fails the whole round, and the
/// timelines of sources that did succeed are discarded.
pub async fn fetch_all(
    source: &dyn CalendarSource,
    urls: &[String],
    options: &FeedOptions,
) -> TalkToResult<Vec<Timeline>> {
    try_join_all(urls.iter().map(|url| source.fetch(url, options))).await
}

/// Reads feeds over HTTP(S). `webcal://` urls are fetched as `https://`.
#[derive(Clone, Default)]
pub struct HttpCalendarSource {
    http: reqwest::Client,
}

impl HttpCalendarSource {
    pub fn new() -> Self {
        Self::default()
    }
}

/// `webcal` is just a hint to calendar apps; the feed itself is served over https.
fn normalize_url(url: &str) -> String {
    match url.strip_prefix("webcal://") {
        Some(rest) => format!("https://{}", rest),
        None => url.to_string(),
    }
}

#[async_trait]
impl CalendarSource for HttpCalendarSource {
    async fn fetch(&self, url: &str, options: &FeedOptions) -> TalkToResult<Timeline> {
        let fetch_error = |message: String| TalkToError::Fetch {
            url: url.to_string(),
            message,
        };

        let body = self
            .http
            .get(normalize_url(url))
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(|e| fetch_error(e.to_string()))?
            .text()
            .await
            .map_err(|e| fetch_error(e.to_string()))?;

        debug!(url, bytes = body.len(), "fetched feed");

        parse_timeline(&body, options).map_err(|e| fetch_error(e.to_string()))
    }
}
