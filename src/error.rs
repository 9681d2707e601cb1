//! Error types for each component.
//!
//! Only [`ConfigError`] is ever fatal; the others are logged and absorbed at
//! the component or cycle boundary.

use std::path::PathBuf;

use thiserror::Error;

/// Problems that stop the process before the poll loop starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("cannot read configuration file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML in {}: {source}", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("missing or placeholder values for: {}", .0.join(", "))]
    Missing(Vec<&'static str>),

    #[error("invalid channel id '{0}': channel ids start with 'UC'")]
    ChannelId(String),

    #[error("cannot write example configuration to {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures while persisting the seen set.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failures talking to a feed provider.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned HTTP {status}")]
    Status { status: u16 },

    #[error("feed parse error: {0}")]
    Parse(#[from] feed_rs::parser::ParseFeedError),

    #[error("malformed response body: {0}")]
    Body(#[from] serde_json::Error),

    #[error("provider error (code {code}): {message}")]
    Api { code: i64, message: String },
}

/// Failures talking to the social network backend.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{endpoint} returned HTTP {status}: {message}")]
    Status {
        endpoint: &'static str,
        status: u16,
        message: String,
    },

    #[error("malformed response body: {0}")]
    Body(#[from] serde_json::Error),

    #[error("not logged in")]
    NoSession,
}

impl PublishError {
    /// A one-line remediation hint for login failures, if one applies.
    pub fn login_hint(&self) -> Option<&'static str> {
        match self {
            Self::Status { status: 401, .. } | Self::Status { status: 400, .. } => Some(
                "check bluesky_handle and bluesky_password; use an App Password, not your main password",
            ),
            Self::Status { status: 429, .. } => {
                Some("you may be rate-limited; wait a few minutes and try again")
            }
            Self::Http(e) if e.is_connect() || e.is_timeout() => {
                Some("network error; check your internet connection")
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_lists_every_field() {
        let err = ConfigError::Missing(vec!["bluesky_handle", "youtube_api_key"]);
        assert_eq!(
            err.to_string(),
            "missing or placeholder values for: bluesky_handle, youtube_api_key"
        );
    }

    #[test]
    fn login_hint_by_status() {
        let bad_auth = PublishError::Status {
            endpoint: "createSession",
            status: 401,
            message: "Invalid identifier or password".into(),
        };
        assert!(bad_auth.login_hint().unwrap().contains("App Password"));

        let limited = PublishError::Status {
            endpoint: "createSession",
            status: 429,
            message: String::new(),
        };
        assert!(limited.login_hint().unwrap().contains("rate-limited"));

        assert!(PublishError::NoSession.login_hint().is_none());
    }
}
