//! Preview image lookup.
//!
//! YouTube serves thumbnails at predictable URLs. Not every resolution exists
//! for every video, and a missing `maxresdefault` comes back as a tiny grey
//! placeholder rather than a 404, so anything under [`MIN_THUMBNAIL_BYTES`]
//! is rejected and the next size is tried.

use std::time::Duration;

use anyhow::Result;
use reqwest::blocking::Client;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::PublishError;
use crate::http;

/// Payloads at or below this size are placeholders, not thumbnails.
pub const MIN_THUMBNAIL_BYTES: usize = 1000;

const TIMEOUT: Duration = Duration::from_secs(10);

/// Something that can download a URL into memory.
pub trait ImageFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, PublishError>;
}

/// [`ImageFetcher`] over HTTP.
pub struct HttpImageFetcher {
    client: Client,
}

impl HttpImageFetcher {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: http::client(TIMEOUT)?,
        })
    }
}

impl ImageFetcher for HttpImageFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, PublishError> {
        let response = self.client.get(url).send()?.error_for_status()?;
        Ok(response.bytes()?.to_vec())
    }
}

/// Pull the video id out of a watch URL (`?v=<id>`), a short link
/// (`youtu.be/<id>`) or a Shorts URL (`/shorts/<id>`).
pub fn video_id_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    let id = if host == "youtu.be" {
        parsed.path_segments()?.next().map(str::to_string)
    } else if host == "youtube.com" || host.ends_with(".youtube.com") {
        let mut segments = parsed.path_segments()?;
        match segments.next() {
            Some("shorts") => segments.next().map(str::to_string),
            _ => parsed
                .query_pairs()
                .find(|(key, _)| key == "v")
                .map(|(_, value)| value.into_owned()),
        }
    } else {
        None
    };
    id.filter(|id| !id.is_empty())
}

/// Thumbnail URLs for `video_id`, highest resolution first.
pub fn candidate_urls(video_id: &str) -> Vec<String> {
    ["maxresdefault", "hqdefault", "mqdefault"]
        .iter()
        .map(|size| format!("https://img.youtube.com/vi/{video_id}/{size}.jpg"))
        .collect()
}

/// Download the first candidate that is larger than a placeholder.
pub fn resolve<F: ImageFetcher + ?Sized>(fetcher: &F, candidates: &[String]) -> Option<Vec<u8>> {
    for url in candidates {
        info!(url, "downloading thumbnail");
        match fetcher.fetch(url) {
            Ok(bytes) if bytes.len() > MIN_THUMBNAIL_BYTES => {
                debug!(url, bytes = bytes.len(), "thumbnail accepted");
                return Some(bytes);
            }
            Ok(bytes) => debug!(url, bytes = bytes.len(), "thumbnail too small, trying next size"),
            Err(e) => warn!(url, error = %e, "thumbnail download failed"),
        }
    }
    warn!("all thumbnail attempts failed");
    None
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// Serves canned bodies; unknown URLs fail like a 404.
    #[derive(Default)]
    pub(crate) struct FakeFetcher {
        pub bodies: HashMap<String, Vec<u8>>,
        pub requested: RefCell<Vec<String>>,
    }

    impl FakeFetcher {
        pub(crate) fn serving(bodies: &[(&str, usize)]) -> Self {
            Self {
                bodies: bodies
                    .iter()
                    .map(|(url, len)| (url.to_string(), vec![0xff; *len]))
                    .collect(),
                requested: RefCell::default(),
            }
        }
    }

    impl ImageFetcher for FakeFetcher {
        fn fetch(&self, url: &str) -> Result<Vec<u8>, PublishError> {
            self.requested.borrow_mut().push(url.to_string());
            self.bodies.get(url).cloned().ok_or(PublishError::Status {
                endpoint: "thumbnail",
                status: 404,
                message: String::new(),
            })
        }
    }

    #[test]
    fn extracts_id_from_watch_url() {
        assert_eq!(
            video_id_from_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42").as_deref(),
            Some("dQw4w9WgXcQ")
        );
    }

    #[test]
    fn watch_id_is_the_v_parameter_not_a_lookalike() {
        assert_eq!(
            video_id_from_url("https://www.youtube.com/watch?dev=1&v=dQw4w9WgXcQ").as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(
            video_id_from_url("https://m.youtube.com/watch?feature=share&v=abc123&dev=1").as_deref(),
            Some("abc123")
        );
    }

    #[test]
    fn extracts_id_from_short_link() {
        assert_eq!(
            video_id_from_url("https://youtu.be/dQw4w9WgXcQ?si=abc").as_deref(),
            Some("dQw4w9WgXcQ")
        );
    }

    #[test]
    fn extracts_id_from_shorts_url() {
        assert_eq!(
            video_id_from_url("https://www.youtube.com/shorts/abc123").as_deref(),
            Some("abc123")
        );
    }

    #[test]
    fn no_id_in_other_urls() {
        assert_eq!(video_id_from_url("https://example.com/watch?v=abc"), None);
        assert_eq!(video_id_from_url("https://www.youtube.com/watch?v="), None);
        assert_eq!(video_id_from_url("https://youtu.be/"), None);
        assert_eq!(video_id_from_url("not a url"), None);
    }

    #[test]
    fn candidates_are_highest_resolution_first() {
        let urls = candidate_urls("abc");
        assert_eq!(
            urls,
            vec![
                "https://img.youtube.com/vi/abc/maxresdefault.jpg",
                "https://img.youtube.com/vi/abc/hqdefault.jpg",
                "https://img.youtube.com/vi/abc/mqdefault.jpg",
            ]
        );
    }

    #[test]
    fn skips_placeholders_until_a_real_image() {
        let urls = candidate_urls("abc");
        let fetcher = FakeFetcher::serving(&[
            (urls[0].as_str(), 800),
            (urls[1].as_str(), MIN_THUMBNAIL_BYTES),
            (urls[2].as_str(), 24_000),
        ]);

        let image = resolve(&fetcher, &urls).unwrap();
        assert_eq!(image.len(), 24_000);
        assert_eq!(*fetcher.requested.borrow(), urls);
    }

    #[test]
    fn stops_at_first_acceptable_image() {
        let urls = candidate_urls("abc");
        let fetcher = FakeFetcher::serving(&[(urls[0].as_str(), 50_000), (urls[1].as_str(), 9_000)]);

        assert_eq!(resolve(&fetcher, &urls).unwrap().len(), 50_000);
        assert_eq!(fetcher.requested.borrow().len(), 1);
    }

    #[test]
    fn gives_up_when_every_candidate_fails() {
        let urls = candidate_urls("abc");
        let fetcher = FakeFetcher::serving(&[(urls[1].as_str(), 10)]);
        assert!(resolve(&fetcher, &urls).is_none());
        assert_eq!(fetcher.requested.borrow().len(), 3);
    }
}
