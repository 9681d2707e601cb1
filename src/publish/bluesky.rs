//! Minimal AT Protocol XRPC client: just the three calls a post with a link
//! card needs.

use std::time::Duration;

use anyhow::Result;
use chrono::{SecondsFormat, Utc};
use reqwest::blocking::{Client, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::{Blob, Post, SocialBackend};
use crate::error::PublishError;
use crate::http;

const TIMEOUT: Duration = Duration::from_secs(30);

const CREATE_SESSION: &str = "com.atproto.server.createSession";
const UPLOAD_BLOB: &str = "com.atproto.repo.uploadBlob";
const CREATE_RECORD: &str = "com.atproto.repo.createRecord";

const POST_COLLECTION: &str = "app.bsky.feed.post";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Session {
    access_jwt: String,
    did: String,
}

#[derive(Debug, Deserialize)]
struct XrpcError {
    error: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadBlobOutput {
    blob: Blob,
}

#[derive(Debug, Deserialize)]
struct CreateRecordOutput {
    uri: String,
}

/// Talks to a Bluesky PDS over XRPC.
pub struct XrpcClient {
    client: Client,
    service: String,
    session: Option<Session>,
}

impl XrpcClient {
    pub fn new(service: &str) -> Result<Self> {
        Ok(Self {
            client: http::client(TIMEOUT)?,
            service: service.trim_end_matches('/').to_string(),
            session: None,
        })
    }

    fn endpoint(&self, nsid: &str) -> String {
        format!("{}/xrpc/{nsid}", self.service)
    }

    fn session(&self) -> Result<&Session, PublishError> {
        self.session.as_ref().ok_or(PublishError::NoSession)
    }
}

/// Turn a non-2xx XRPC response into [`PublishError::Status`].
fn check(endpoint: &'static str, response: Response) -> Result<Response, PublishError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    let message = serde_json::from_str::<XrpcError>(&body)
        .ok()
        .and_then(|e| e.message.or(e.error))
        .unwrap_or(body);
    Err(PublishError::Status {
        endpoint,
        status: status.as_u16(),
        message,
    })
}

/// The `app.bsky.feed.post` record for `post`, stamped with `created_at`.
pub fn post_record(post: &Post, created_at: &str) -> Value {
    let mut external = json!({
        "uri": post.card.uri,
        "title": post.card.title,
        "description": post.card.description,
    });
    if let Some(thumb) = &post.card.thumb {
        external["thumb"] = thumb.clone();
    }
    json!({
        "$type": POST_COLLECTION,
        "text": post.text,
        "createdAt": created_at,
        "embed": {
            "$type": "app.bsky.embed.external",
            "external": external,
        },
    })
}

impl SocialBackend for XrpcClient {
    fn login(&mut self, identifier: &str, password: &str) -> Result<(), PublishError> {
        self.session = None;
        let response = self
            .client
            .post(self.endpoint(CREATE_SESSION))
            .json(&json!({ "identifier": identifier, "password": password }))
            .send()?;
        let session: Session = check(CREATE_SESSION, response)?.json()?;
        debug!(did = %session.did, "session created");
        self.session = Some(session);
        Ok(())
    }

    fn upload_blob(&mut self, bytes: Vec<u8>, mime_type: &str) -> Result<Blob, PublishError> {
        let session = self.session()?;
        let response = self
            .client
            .post(self.endpoint(UPLOAD_BLOB))
            .bearer_auth(&session.access_jwt)
            .header(reqwest::header::CONTENT_TYPE, mime_type)
            .body(bytes)
            .send()?;
        let output: UploadBlobOutput = check(UPLOAD_BLOB, response)?.json()?;
        Ok(output.blob)
    }

    fn create_post(&mut self, post: &Post) -> Result<String, PublishError> {
        let session = self.session()?;
        let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let body = json!({
            "repo": session.did,
            "collection": POST_COLLECTION,
            "record": post_record(post, &created_at),
        });
        let response = self
            .client
            .post(self.endpoint(CREATE_RECORD))
            .bearer_auth(&session.access_jwt)
            .json(&body)
            .send()?;
        let output: CreateRecordOutput = check(CREATE_RECORD, response)?.json()?;
        Ok(output.uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publish::LinkCard;

    fn post(thumb: Option<Blob>) -> Post {
        Post {
            text: "🎬 New video: Launch".into(),
            card: LinkCard {
                uri: "https://www.youtube.com/watch?v=abc".into(),
                title: "Launch".into(),
                description: "Watch on YouTube".into(),
                thumb,
            },
        }
    }

    #[test]
    fn record_carries_external_card() {
        let record = post_record(&post(None), "2026-01-01T00:00:00.000Z");
        assert_eq!(record["$type"], "app.bsky.feed.post");
        assert_eq!(record["text"], "🎬 New video: Launch");
        assert_eq!(record["createdAt"], "2026-01-01T00:00:00.000Z");
        assert_eq!(record["embed"]["$type"], "app.bsky.embed.external");
        assert_eq!(
            record["embed"]["external"]["uri"],
            "https://www.youtube.com/watch?v=abc"
        );
        assert_eq!(record["embed"]["external"]["description"], "Watch on YouTube");
        assert!(record["embed"]["external"].get("thumb").is_none());
    }

    #[test]
    fn record_includes_thumb_when_uploaded() {
        let blob = json!({
            "$type": "blob",
            "ref": { "$link": "bafkreib" },
            "mimeType": "image/jpeg",
            "size": 24000
        });
        let record = post_record(&post(Some(blob.clone())), "2026-01-01T00:00:00.000Z");
        assert_eq!(record["embed"]["external"]["thumb"], blob);
    }

    #[test]
    fn endpoints_ignore_trailing_slash() {
        let client = XrpcClient::new("https://bsky.social/").unwrap();
        assert_eq!(
            client.endpoint(CREATE_SESSION),
            "https://bsky.social/xrpc/com.atproto.server.createSession"
        );
    }

    #[test]
    fn calls_before_login_fail() {
        let mut client = XrpcClient::new("https://bsky.social").unwrap();
        assert!(matches!(
            client.create_post(&post(None)),
            Err(PublishError::NoSession)
        ));
    }
}
