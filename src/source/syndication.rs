//! Channel feed provider.
//!
//! Every YouTube channel publishes an Atom feed of its latest uploads at a
//! predictable URL. It needs no credentials but only carries the most recent
//! ~15 videos. Parsing goes through [`feed_rs`], which also accepts RSS 2.0.

use std::time::Duration;

use anyhow::Result;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use tracing::{debug, info, warn};

use super::{FeedItem, FeedSource};
use crate::config::Config;
use crate::error::FetchError;
use crate::http;

/// Base URL of the per-channel feed.
pub const FEED_URL: &str = "https://www.youtube.com/feeds/videos.xml";

/// Prefix YouTube puts in front of the video id in `<id>`.
const VIDEO_ID_PREFIX: &str = "yt:video:";

const TIMEOUT: Duration = Duration::from_secs(30);

/// The channel's Atom feed.
pub struct SyndicationSource {
    feed_url: String,
    client: Client,
}

impl SyndicationSource {
    pub fn new(config: &Config) -> Result<Self> {
        let feed_url = format!("{FEED_URL}?channel_id={}", config.youtube_channel_id);
        Ok(Self {
            feed_url,
            client: http::client(TIMEOUT)?,
        })
    }

    /// Parse a feed document into [`FeedItem`]s.
    ///
    /// Pure function (no I/O) so tests can exercise the mapping without the
    /// network. Entries lacking an id or a link are dropped with a warning.
    pub fn parse_feed(body: &[u8]) -> Result<Vec<FeedItem>, FetchError> {
        let feed = feed_rs::parser::parse(body)?;

        if feed.entries.is_empty() {
            if feed.title.is_none() {
                warn!("feed has no title; the channel id may be invalid or the channel has no public videos");
            }
            return Ok(Vec::new());
        }

        let mut items = Vec::with_capacity(feed.entries.len());
        for entry in feed.entries {
            let title = entry
                .title
                .map(|t| t.content)
                .unwrap_or_else(|| "(untitled)".to_string());

            // Prefer the bare video id, fall back to the raw entry id.
            let id = match entry.id.strip_prefix(VIDEO_ID_PREFIX) {
                Some(video_id) if !video_id.is_empty() => video_id.to_string(),
                _ => entry.id.clone(),
            };
            if id.is_empty() {
                warn!(title, "skipping feed entry with no id");
                continue;
            }

            let Some(url) = entry.links.first().map(|l| l.href.clone()) else {
                warn!(title, id, "skipping feed entry with no link");
                continue;
            };

            let description = entry
                .media
                .into_iter()
                .find_map(|m| m.description.map(|d| d.content))
                .or_else(|| entry.summary.map(|s| s.content));

            items.push(FeedItem {
                id,
                title,
                url,
                published_at: entry.published,
                description,
            });
        }
        Ok(items)
    }

    fn download(&self) -> Result<Vec<u8>, FetchError> {
        let response = self.client.get(&self.feed_url).send()?;
        ensure_success(response.status())?;
        Ok(response.bytes()?.to_vec())
    }
}

fn ensure_success(status: StatusCode) -> Result<(), FetchError> {
    debug!(status = status.as_u16(), "feed response");
    if status.is_success() {
        Ok(())
    } else {
        Err(FetchError::Status {
            status: status.as_u16(),
        })
    }
}

/// Run one download and turn its outcome into items. Every failure is
/// logged and becomes an empty list.
pub(crate) fn fetch_with<F>(download: F) -> Vec<FeedItem>
where
    F: FnOnce() -> Result<Vec<u8>, FetchError>,
{
    match download().and_then(|body| SyndicationSource::parse_feed(&body)) {
        Ok(items) if items.is_empty() => {
            warn!("channel feed returned no entries");
            items
        }
        Ok(items) => {
            debug!(count = items.len(), "channel feed entries");
            items
        }
        Err(e) => {
            warn!(error = %e, "failed to fetch or parse channel feed");
            Vec::new()
        }
    }
}

impl FeedSource for SyndicationSource {
    fn name(&self) -> &str {
        "RSS feed"
    }

    fn fetch(&self) -> Vec<FeedItem> {
        info!(url = %self.feed_url, "fetching channel feed");
        fetch_with(|| self.download())
    }
}
