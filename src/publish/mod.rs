//! Announcing a video on Bluesky.
//!
//! [`BlueskyPublisher`] runs the four steps of a publish: log in, render
//! the text, attach a thumbnail, submit. Only login and submission decide
//! the outcome. A missing thumbnail just means a card without an image.
//!
//! The network sits behind two traits, [`SocialBackend`] and
//! [`ImageFetcher`], so the whole sequence can be driven by fakes in tests.

mod bluesky;
mod template;
mod thumbnail;

pub use bluesky::XrpcClient;
pub use thumbnail::{HttpImageFetcher, ImageFetcher};

use anyhow::Result;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::PublishError;

/// Bluesky's post length limit, in characters.
const MAX_POST_CHARS: usize = 300;

const CARD_DESCRIPTION: &str = "Watch on YouTube";

const THUMBNAIL_MIME: &str = "image/jpeg";

/// Opaque blob reference returned by an upload, embedded verbatim in a post.
pub type Blob = serde_json::Value;

/// Link preview shown under the post text.
#[derive(Debug, Clone)]
pub struct LinkCard {
    pub uri: String,
    pub title: String,
    pub description: String,
    pub thumb: Option<Blob>,
}

#[derive(Debug, Clone)]
pub struct Post {
    pub text: String,
    pub card: LinkCard,
}

/// The remote calls a publish needs.
pub trait SocialBackend {
    fn login(&mut self, identifier: &str, password: &str) -> Result<(), PublishError>;

    fn upload_blob(&mut self, bytes: Vec<u8>, mime_type: &str) -> Result<Blob, PublishError>;

    /// Returns the new post's URI.
    fn create_post(&mut self, post: &Post) -> Result<String, PublishError>;
}

/// Turns one feed item into one post.
pub trait Publisher {
    /// `true` only when the post was accepted by the backend.
    fn publish(&mut self, title: &str, url: &str) -> bool;
}

pub struct BlueskyPublisher<B = XrpcClient, F = HttpImageFetcher> {
    backend: B,
    fetcher: F,
    handle: String,
    password: String,
    template: String,
}

impl BlueskyPublisher {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            XrpcClient::new(&config.bluesky_service)?,
            HttpImageFetcher::new()?,
            config,
        ))
    }
}

impl<B: SocialBackend, F: ImageFetcher> BlueskyPublisher<B, F> {
    pub fn new(backend: B, fetcher: F, config: &Config) -> Self {
        Self {
            backend,
            fetcher,
            handle: config.bluesky_handle.clone(),
            password: config.bluesky_password.clone(),
            template: config.post_template.clone(),
        }
    }

    fn post_text(&self, title: &str, url: &str) -> String {
        let text = match template::render(&self.template, title, url) {
            Ok(text) => text,
            Err(e) => {
                error!(template = %self.template, error = %e, "invalid post_template");
                let text = template::fallback(title);
                warn!(text, "using fallback post text");
                text
            }
        };
        let chars = text.chars().count();
        if chars > MAX_POST_CHARS {
            warn!(chars, "post text exceeds Bluesky's {MAX_POST_CHARS} character limit and may be rejected");
        }
        text
    }

    /// Find, download and upload a thumbnail. `None` on any failure.
    fn thumbnail(&mut self, url: &str) -> Option<Blob> {
        let Some(video_id) = thumbnail::video_id_from_url(url) else {
            warn!(url, "could not extract video id from url");
            return None;
        };
        let candidates = thumbnail::candidate_urls(&video_id);
        let image = thumbnail::resolve(&self.fetcher, &candidates)?;
        match self.backend.upload_blob(image, THUMBNAIL_MIME) {
            Ok(blob) => {
                info!(outcome = "success", "thumbnail uploaded");
                Some(blob)
            }
            Err(e) => {
                error!(error = %e, "failed to upload thumbnail");
                None
            }
        }
    }
}

impl<B: SocialBackend, F: ImageFetcher> Publisher for BlueskyPublisher<B, F> {
    fn publish(&mut self, title: &str, url: &str) -> bool {
        info!(handle = %self.handle, "logging in to Bluesky");
        if let Err(e) = self.backend.login(&self.handle, &self.password) {
            error!(handle = %self.handle, error = %e, "Bluesky login failed");
            if let Some(hint) = e.login_hint() {
                error!("hint: {hint}");
            }
            return false;
        }

        let text = self.post_text(title, url);
        let thumb = self.thumbnail(url);
        if thumb.is_none() {
            warn!("posting without a thumbnail");
        }

        let post = Post {
            text,
            card: LinkCard {
                uri: url.to_string(),
                title: title.to_string(),
                description: CARD_DESCRIPTION.to_string(),
                thumb,
            },
        };
        match self.backend.create_post(&post) {
            Ok(uri) => {
                info!(outcome = "success", title, uri, "posted with preview");
                true
            }
            Err(e) => {
                error!(title, error = %e, "error posting to Bluesky");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::thumbnail::tests::FakeFetcher;
    use super::thumbnail::{candidate_urls, MIN_THUMBNAIL_BYTES};
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Calls {
        logins: usize,
        uploads: Vec<usize>,
        posts: Vec<Post>,
    }

    #[derive(Default)]
    struct FakeBackend {
        calls: Rc<RefCell<Calls>>,
        reject_login: bool,
        reject_upload: bool,
        reject_post: bool,
    }

    fn denied(endpoint: &'static str) -> PublishError {
        PublishError::Status {
            endpoint,
            status: 401,
            message: "denied".into(),
        }
    }

    impl SocialBackend for FakeBackend {
        fn login(&mut self, _: &str, _: &str) -> Result<(), PublishError> {
            self.calls.borrow_mut().logins += 1;
            if self.reject_login {
                return Err(denied("createSession"));
            }
            Ok(())
        }

        fn upload_blob(&mut self, bytes: Vec<u8>, _: &str) -> Result<Blob, PublishError> {
            if self.reject_upload {
                return Err(denied("uploadBlob"));
            }
            self.calls.borrow_mut().uploads.push(bytes.len());
            Ok(json!({ "size": bytes.len() }))
        }

        fn create_post(&mut self, post: &Post) -> Result<String, PublishError> {
            if self.reject_post {
                return Err(denied("createRecord"));
            }
            self.calls.borrow_mut().posts.push(post.clone());
            Ok("at://did:plc:me/app.bsky.feed.post/1".into())
        }
    }

    const URL: &str = "https://www.youtube.com/watch?v=abc";

    fn config(template: &str) -> Config {
        let mut config = Config::from_yaml("bluesky_handle: me.bsky.social\nbluesky_password: pw\n").unwrap();
        config.post_template = template.to_string();
        config
    }

    fn publisher(backend: FakeBackend, fetcher: FakeFetcher, template: &str) -> BlueskyPublisher<FakeBackend, FakeFetcher> {
        BlueskyPublisher::new(backend, fetcher, &config(template))
    }

    #[test]
    fn uses_third_thumbnail_when_first_two_are_placeholders() {
        let urls = candidate_urls("abc");
        let fetcher = FakeFetcher::serving(&[
            (urls[0].as_str(), 500),
            (urls[1].as_str(), MIN_THUMBNAIL_BYTES - 1),
            (urls[2].as_str(), 15_000),
        ]);
        let backend = FakeBackend::default();
        let calls = Rc::clone(&backend.calls);
        let mut publisher = publisher(backend, fetcher, "{title} {url}");

        assert!(publisher.publish("Launch", URL));

        let calls = calls.borrow();
        assert_eq!(calls.uploads, vec![15_000]);
        let card = &calls.posts[0].card;
        assert_eq!(card.thumb, Some(json!({ "size": 15_000 })));
        assert_eq!(card.uri, URL);
        assert_eq!(card.title, "Launch");
        assert_eq!(card.description, "Watch on YouTube");
        assert_eq!(calls.posts[0].text, format!("Launch {URL}"));
    }

    #[test]
    fn missing_thumbnail_still_publishes() {
        let backend = FakeBackend::default();
        let calls = Rc::clone(&backend.calls);
        let mut publisher = publisher(backend, FakeFetcher::default(), "{title}");

        assert!(publisher.publish("Launch", URL));
        let calls = calls.borrow();
        assert!(calls.uploads.is_empty());
        assert!(calls.posts[0].card.thumb.is_none());
    }

    #[test]
    fn failed_upload_still_publishes() {
        let urls = candidate_urls("abc");
        let fetcher = FakeFetcher::serving(&[(urls[0].as_str(), 40_000)]);
        let backend = FakeBackend {
            reject_upload: true,
            ..FakeBackend::default()
        };
        let calls = Rc::clone(&backend.calls);
        let mut publisher = publisher(backend, fetcher, "{title}");

        assert!(publisher.publish("Launch", URL));
        assert!(calls.borrow().posts[0].card.thumb.is_none());
    }

    #[test]
    fn url_without_video_id_skips_thumbnail() {
        let fetcher = FakeFetcher::default();
        let backend = FakeBackend::default();
        let calls = Rc::clone(&backend.calls);
        let mut publisher = publisher(backend, fetcher, "{title}");

        assert!(publisher.publish("Elsewhere", "https://example.com/post"));
        assert!(publisher.fetcher.requested.borrow().is_empty());
        assert_eq!(calls.borrow().posts.len(), 1);
    }

    #[test]
    fn login_failure_is_terminal() {
        let backend = FakeBackend {
            reject_login: true,
            ..FakeBackend::default()
        };
        let calls = Rc::clone(&backend.calls);
        let mut publisher = publisher(backend, FakeFetcher::default(), "{title}");

        assert!(!publisher.publish("Launch", URL));
        assert_eq!(calls.borrow().logins, 1);
        assert!(calls.borrow().posts.is_empty());
        assert!(publisher.fetcher.requested.borrow().is_empty());
    }

    #[test]
    fn rejected_post_is_a_failure() {
        let backend = FakeBackend {
            reject_post: true,
            ..FakeBackend::default()
        };
        let mut publisher = publisher(backend, FakeFetcher::default(), "{title}");
        assert!(!publisher.publish("Launch", URL));
    }

    #[test]
    fn unknown_placeholder_falls_back_to_default_text() {
        let backend = FakeBackend::default();
        let calls = Rc::clone(&backend.calls);
        let mut publisher = publisher(backend, FakeFetcher::default(), "{channel} uploaded {title}");

        assert!(publisher.publish("Launch", URL));
        assert_eq!(calls.borrow().posts[0].text, "🎬 New video: Launch");
    }

    #[test]
    fn logs_in_on_every_publish() {
        let backend = FakeBackend::default();
        let calls = Rc::clone(&backend.calls);
        let mut publisher = publisher(backend, FakeFetcher::default(), "{title}");

        assert!(publisher.publish("One", URL));
        assert!(publisher.publish("Two", URL));
        assert_eq!(calls.borrow().logins, 2);
    }
}
