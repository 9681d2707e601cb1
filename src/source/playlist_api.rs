//! YouTube Data API provider.
//!
//! Walks the channel's uploads playlist through `playlistItems.list`, one
//! page at a time. More reliable than the Atom feed and not limited to the
//! latest ~15 uploads, but it needs an API key and spends quota.
//!
//! Any failure part-way through keeps what was already fetched: a page of
//! new videos is more useful than an empty cycle.

use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use super::{FeedItem, FeedSource};
use crate::config::Config;
use crate::error::FetchError;
use crate::http;

/// `playlistItems.list` endpoint.
pub const API_URL: &str = "https://www.googleapis.com/youtube/v3/playlistItems";

/// The API refuses `maxResults` above this.
pub const PAGE_CAP: usize = 50;

/// Pause between page requests.
const PAGE_DELAY: Duration = Duration::from_millis(500);

const TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PlaylistPage {
    #[serde(default)]
    items: Vec<PlaylistItem>,
    next_page_token: Option<String>,
    error: Option<ApiError>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItem {
    #[serde(default)]
    snippet: Snippet,
    #[serde(default)]
    content_details: ContentDetails,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    title: Option<String>,
    description: Option<String>,
    published_at: Option<String>,
    resource_id: Option<ResourceId>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceId {
    video_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContentDetails {
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: Option<i64>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

impl PlaylistItem {
    fn video_id(&self) -> Option<&str> {
        self.content_details
            .video_id
            .as_deref()
            .or_else(|| {
                self.snippet
                    .resource_id
                    .as_ref()
                    .and_then(|r| r.video_id.as_deref())
            })
            .filter(|id| !id.is_empty())
    }

    fn into_feed_item(self) -> Option<FeedItem> {
        let id = self.video_id()?.to_string();
        let published_at = self
            .snippet
            .published_at
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));
        Some(FeedItem {
            url: format!("https://www.youtube.com/watch?v={id}"),
            id,
            title: self
                .snippet
                .title
                .unwrap_or_else(|| "Unknown Title".to_string()),
            published_at,
            description: self.snippet.description.filter(|d| !d.is_empty()),
        })
    }
}

impl PlaylistPage {
    /// Convert the page's items, returning how many had no usable video id.
    fn into_feed_items(self) -> (Vec<FeedItem>, usize) {
        let total = self.items.len();
        let items: Vec<FeedItem> = self
            .items
            .into_iter()
            .filter_map(PlaylistItem::into_feed_item)
            .collect();
        let skipped = total - items.len();
        (items, skipped)
    }
}

// ---------------------------------------------------------------------------
// Pagination
// ---------------------------------------------------------------------------

/// Accumulate pages until `max_results` items are collected or the playlist
/// runs out.
///
/// `fetch_page` receives the page token (if any) and the page size to ask
/// for. When it fails, the items gathered so far are returned.
pub(crate) fn collect_pages<F>(max_results: usize, page_delay: Duration, mut fetch_page: F) -> Vec<FeedItem>
where
    F: FnMut(Option<&str>, usize) -> Result<PlaylistPage, FetchError>,
{
    let mut items: Vec<FeedItem> = Vec::new();
    let mut page_token: Option<String> = None;
    let mut page_no = 0usize;

    while items.len() < max_results {
        let per_page = (max_results - items.len()).min(PAGE_CAP);
        page_no += 1;
        debug!(page = page_no, per_page, token = ?page_token, "requesting playlist page");

        let page = match fetch_page(page_token.as_deref(), per_page) {
            Ok(page) => page,
            Err(e) => {
                warn!(page = page_no, error = %e, kept = items.len(), "API fetch stopped early");
                return items;
            }
        };

        if page.items.is_empty() {
            info!("no more videos available from API");
            break;
        }

        let fetched = page.items.len();
        page_token = page.next_page_token.clone();
        let (mut batch, skipped) = page.into_feed_items();
        if skipped > 0 {
            warn!(page = page_no, skipped, "skipped items with missing video ids");
        }
        items.append(&mut batch);
        info!(fetched, total = items.len(), "fetched playlist page");

        if page_token.is_none() {
            info!("reached end of playlist");
            break;
        }
        if items.len() < max_results {
            thread::sleep(page_delay);
        }
    }

    items.truncate(max_results);
    items
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// The channel's uploads playlist, read through the Data API.
pub struct PlaylistApiSource {
    client: Client,
    api_key: String,
    playlist_id: String,
    max_results: usize,
    no_cache: bool,
}

impl PlaylistApiSource {
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config
            .api_key()
            .ok_or_else(|| anyhow!("youtube_api_key is required for the API provider"))?
            .to_string();
        let playlist_id = config.uploads_playlist_id().ok_or_else(|| {
            anyhow!(
                "invalid channel id '{}': channel ids start with 'UC'",
                config.youtube_channel_id
            )
        })?;
        Ok(Self {
            client: http::client(TIMEOUT)?,
            api_key,
            playlist_id,
            max_results: config.api_max_results(),
            no_cache: config.no_cache,
        })
    }

    fn fetch_page(&self, page_token: Option<&str>, per_page: usize) -> Result<PlaylistPage, FetchError> {
        let mut query: Vec<(&str, String)> = vec![
            ("part", "snippet,contentDetails".to_string()),
            ("playlistId", self.playlist_id.clone()),
            ("maxResults", per_page.to_string()),
            ("key", self.api_key.clone()),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token.to_string()));
        }

        let mut request = self.client.get(API_URL);
        if self.no_cache {
            let stamp = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default();
            debug!(stamp, "cache busting enabled");
            query.push(("_nocache", stamp.to_string()));
            request = request
                .header("Cache-Control", "no-cache, no-store, must-revalidate")
                .header("Pragma", "no-cache")
                .header("Expires", "0");
        }

        let response = request.query(&query).send()?;
        let status = response.status().as_u16();
        let body = response.bytes()?;
        debug!(status, bytes = body.len(), "API response");

        if !(200..300).contains(&status) {
            report_status(status, &body, &self.playlist_id);
            return Err(FetchError::Status { status });
        }
        parse_page(&body)
    }
}

/// Decode a 2xx body, turning an embedded `error` object into an error.
pub(crate) fn parse_page(body: &[u8]) -> Result<PlaylistPage, FetchError> {
    let mut page: PlaylistPage = serde_json::from_slice(body)?;
    if let Some(err) = page.error.take() {
        return Err(FetchError::Api {
            code: err.code.unwrap_or_default(),
            message: err.message.unwrap_or_else(|| "unknown API error".to_string()),
        });
    }
    Ok(page)
}

fn error_detail(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<ErrorEnvelope>(body)
        .ok()
        .and_then(|e| e.error.message)
        .filter(|m| !m.is_empty())
}

fn report_status(status: u16, body: &[u8], playlist_id: &str) {
    match status {
        403 => {
            error!("API request forbidden (HTTP 403): check that the key is valid, the YouTube Data API v3 is enabled and the quota is not exhausted");
            if let Some(detail) = error_detail(body) {
                error!(detail, "API error detail");
            }
        }
        404 => error!(playlist_id, "playlist not found (HTTP 404): check youtube_channel_id"),
        400 => {
            error!("bad API request (HTTP 400)");
            if let Some(detail) = error_detail(body) {
                error!(detail, "API error detail");
            }
        }
        429 => warn!("YouTube API rate limit hit (HTTP 429)"),
        _ => error!(status, "YouTube API returned an error status"),
    }
}

impl FeedSource for PlaylistApiSource {
    fn name(&self) -> &str {
        "YouTube Data API"
    }

    fn fetch(&self) -> Vec<FeedItem> {
        info!(
            playlist_id = %self.playlist_id,
            max_results = self.max_results,
            "fetching videos via YouTube API"
        );
        let items = collect_pages(self.max_results, PAGE_DELAY, |token, per_page| {
            self.fetch_page(token, per_page)
        });
        info!(outcome = "success", count = items.len(), "YouTube API returned videos");
        items
    }
}
