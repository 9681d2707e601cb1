//! YAML configuration.
//!
//! The file is read once at startup into a [`Config`] that is then passed by
//! reference to the feed source, the publisher and the poll loop. Numeric
//! settings the user is likely to get wrong (`check_interval_seconds`,
//! `api_max_results`) are read as raw YAML values and resolved while parsing:
//! a bad value is reported once and replaced by its default instead of
//! refusing to start.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use serde_yaml::Value;
use tracing::{debug, warn};

use crate::error::ConfigError;

pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 600;
pub const DEFAULT_API_MAX_RESULTS: usize = 15;
pub const DEFAULT_POST_TEMPLATE: &str = "🎬 New video: {title}";
pub const DEFAULT_SEEN_FILE: &str = "youtube_bluesky_seen.json";
pub const DEFAULT_BLUESKY_SERVICE: &str = "https://bsky.social";

const PLACEHOLDER_CHANNEL_ID: &str = "YOUR_CHANNEL_ID_HERE";
const PLACEHOLDER_HANDLE: &str = "yourhandle.bsky.social";
const PLACEHOLDER_PASSWORD: &str = "your-app-password-here";
const PLACEHOLDER_API_KEY: &str = "YOUR_YOUTUBE_API_KEY_HERE";

/// Annotated template written when the user asks for an example config.
pub const EXAMPLE_CONFIG: &str = r#"# YouTube to Bluesky auto-poster configuration

# Your YouTube channel ID (the part after /channel/ in the channel URL)
youtube_channel_id: "YOUR_CHANNEL_ID_HERE"

# Bluesky credentials. Use an App Password from Bluesky settings.
bluesky_handle: "yourhandle.bsky.social"
bluesky_password: "your-app-password-here"

# Post text. Supported placeholders: {title}, {url}
post_template: "🎬 New video: {title}"

# How often to check for new videos, in seconds
check_interval_seconds: 600

# Where the ids of already announced videos are kept
seen_videos_file: "youtube_bluesky_seen.json"

# Bluesky PDS to talk to
# bluesky_service: "https://bsky.social"

# YouTube Data API (only used with --use-api)
# Get a key at https://console.cloud.google.com/apis/credentials
# youtube_api_key: "YOUR_YOUTUBE_API_KEY_HERE"

# Maximum number of videos to fetch through the API
# api_max_results: 15
"#;

/// Remediation steps printed when an API key is required but missing.
pub const API_KEY_HELP: &str = "\
To get a YouTube API key:
  1. Go to https://console.cloud.google.com/apis/credentials
  2. Create a new project (or select an existing one)
  3. Enable the 'YouTube Data API v3'
  4. Create an API key under 'Credentials'";

fn default_post_template() -> String {
    DEFAULT_POST_TEMPLATE.to_string()
}

fn default_seen_file() -> PathBuf {
    PathBuf::from(DEFAULT_SEEN_FILE)
}

fn default_bluesky_service() -> String {
    DEFAULT_BLUESKY_SERVICE.to_string()
}

fn default_check_interval() -> Duration {
    Duration::from_secs(DEFAULT_CHECK_INTERVAL_SECS)
}

fn default_api_max_results() -> usize {
    DEFAULT_API_MAX_RESULTS
}

/// Positive seconds that fit in a [`Duration`], else the default.
fn resolve_check_interval(raw: &Value) -> Duration {
    if raw.is_null() {
        return default_check_interval();
    }
    match raw.as_f64().filter(|secs| *secs > 0.0).map(Duration::try_from_secs_f64) {
        Some(Ok(interval)) => interval,
        _ => {
            warn!(
                value = ?raw,
                "invalid check_interval_seconds (must be a positive number), using default {DEFAULT_CHECK_INTERVAL_SECS}"
            );
            default_check_interval()
        }
    }
}

fn resolve_api_max_results(raw: &Value) -> usize {
    if raw.is_null() {
        return DEFAULT_API_MAX_RESULTS;
    }
    match raw.as_u64() {
        Some(n) if n >= 1 => usize::try_from(n).unwrap_or(usize::MAX),
        _ => {
            warn!(
                value = ?raw,
                "invalid api_max_results (must be a positive integer), using default {DEFAULT_API_MAX_RESULTS}"
            );
            DEFAULT_API_MAX_RESULTS
        }
    }
}

fn check_interval_from_yaml<'de, D: Deserializer<'de>>(de: D) -> Result<Duration, D::Error> {
    Value::deserialize(de).map(|raw| resolve_check_interval(&raw))
}

fn api_max_results_from_yaml<'de, D: Deserializer<'de>>(de: D) -> Result<usize, D::Error> {
    Value::deserialize(de).map(|raw| resolve_api_max_results(&raw))
}

/// Everything the program needs to know, loaded once and never mutated
/// after startup.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub youtube_channel_id: String,

    #[serde(default)]
    pub bluesky_handle: String,

    #[serde(default)]
    pub bluesky_password: String,

    #[serde(default = "default_post_template")]
    pub post_template: String,

    #[serde(
        rename = "check_interval_seconds",
        default = "default_check_interval",
        deserialize_with = "check_interval_from_yaml"
    )]
    check_interval: Duration,

    #[serde(default = "default_seen_file")]
    pub seen_videos_file: PathBuf,

    #[serde(default)]
    pub youtube_api_key: Option<String>,

    #[serde(default = "default_api_max_results", deserialize_with = "api_max_results_from_yaml")]
    api_max_results: usize,

    #[serde(default = "default_bluesky_service")]
    pub bluesky_service: String,

    /// Fetch through the YouTube Data API instead of the channel feed.
    #[serde(skip)]
    pub use_api: bool,

    /// Ask the API for uncached responses.
    #[serde(skip)]
    pub no_cache: bool,
}

impl Config {
    /// Read and parse the YAML file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), bytes = text.len(), "read configuration file");
        Self::from_yaml(&text).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse configuration text. An empty document yields all defaults.
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        if text.trim().is_empty() {
            warn!("configuration file is empty");
            return serde_yaml::from_str("{}");
        }
        serde_yaml::from_str(text)
    }

    /// Write [`EXAMPLE_CONFIG`] to `path`.
    pub fn write_example(path: &Path) -> Result<(), ConfigError> {
        fs::write(path, EXAMPLE_CONFIG).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Check the settings a run cannot do without.
    ///
    /// Bulk registration never posts, so it only needs the channel (and the
    /// API key when the API is used).
    pub fn validate(&self, will_publish: bool) -> Result<(), ConfigError> {
        let mut missing = Vec::new();

        if is_unset(&self.youtube_channel_id, PLACEHOLDER_CHANNEL_ID) {
            missing.push("youtube_channel_id");
        }
        if will_publish {
            if is_unset(&self.bluesky_handle, PLACEHOLDER_HANDLE) {
                missing.push("bluesky_handle");
            }
            if is_unset(&self.bluesky_password, PLACEHOLDER_PASSWORD) {
                missing.push("bluesky_password");
            }
        }
        if self.use_api && self.api_key().is_none() {
            missing.push("youtube_api_key");
        }

        if !missing.is_empty() {
            debug!(?missing, "configuration validation failed");
            return Err(ConfigError::Missing(missing));
        }

        if self.use_api && self.uploads_playlist_id().is_none() {
            return Err(ConfigError::ChannelId(self.youtube_channel_id.clone()));
        }

        Ok(())
    }

    /// The configured API key, ignoring blanks and the example placeholder.
    pub fn api_key(&self) -> Option<&str> {
        self.youtube_api_key
            .as_deref()
            .filter(|key| !is_unset(key, PLACEHOLDER_API_KEY))
    }

    /// Uploads playlist of the channel: `UC…` becomes `UU…`.
    pub fn uploads_playlist_id(&self) -> Option<String> {
        self.youtube_channel_id
            .strip_prefix("UC")
            .map(|rest| format!("UU{rest}"))
    }

    /// Time between poll cycles. Anything other than a positive number that
    /// fits a [`Duration`] was replaced by [`DEFAULT_CHECK_INTERVAL_SECS`].
    pub fn check_interval(&self) -> Duration {
        self.check_interval
    }

    /// Upper bound on items fetched through the API. Anything other than a
    /// positive integer was replaced by [`DEFAULT_API_MAX_RESULTS`].
    pub fn api_max_results(&self) -> usize {
        self.api_max_results
    }
}

fn is_unset(value: &str, placeholder: &str) -> bool {
    let value = value.trim();
    value.is_empty() || value == placeholder
}
