//! Feed providers.
//!
//! This module defines the [`FeedSource`] trait and the common [`FeedItem`]
//! type. There are two providers: the channel's public Atom feed
//! ([`SyndicationSource`]) and the YouTube Data API uploads playlist
//! ([`PlaylistApiSource`]). One of them is chosen at startup by
//! [`from_config`] and used for the life of the process.

mod feed_item;
mod playlist_api;
mod syndication;

pub use feed_item::FeedItem;
pub use playlist_api::PlaylistApiSource;
pub use syndication::SyndicationSource;

#[cfg(test)]
pub(crate) use feed_item::make_item;

use anyhow::Result;

use crate::config::Config;

/// Trait that every feed provider implements.
///
/// `fetch` never fails: transport errors, bad status codes and malformed
/// bodies are logged inside the provider and turn into an empty or partial
/// list. The poll loop treats "nothing fetched" and "fetch failed" alike and
/// simply tries again next cycle.
pub trait FeedSource {
    /// Human-readable label used in log lines.
    fn name(&self) -> &str;

    /// Fetch the current batch of items. Order is not significant.
    fn fetch(&self) -> Vec<FeedItem>;
}

/// Build the provider selected by `config.use_api`.
pub fn from_config(config: &Config) -> Result<Box<dyn FeedSource>> {
    let source: Box<dyn FeedSource> = if config.use_api {
        Box::new(PlaylistApiSource::new(config)?)
    } else {
        Box::new(SyndicationSource::new(config)?)
    };
    Ok(source)
}
