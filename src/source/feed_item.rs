//! The item shape shared by both feed providers.
//!
//! Each provider converts its native entries into `FeedItem`s so the poll
//! loop never needs to know where an item came from.

use chrono::{DateTime, Utc};
use std::cmp::Ordering;

/// A single video, normalised from either provider.
///
/// Identity is the `id` alone: two items with the same id are the same video
/// even if title or url differ between fetches.
///
/// ## Sorting
///
/// `FeedItem` implements [`Ord`] for **reverse-chronological** ordering so
/// log output lists newest videos first. Nothing relies on this order for
/// correctness.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct FeedItem {
    /// Provider-assigned video id; the de-duplication key.
    pub id: String,

    /// Video title.
    pub title: String,

    /// Watch URL. Also the target of the preview card.
    pub url: String,

    /// Upload time, if the provider reported a parseable one.
    pub published_at: Option<DateTime<Utc>>,

    /// Video description.
    pub description: Option<String>,
}

// ---------------------------------------------------------------------------
// Ordering: reverse chronological (newest first)
// ---------------------------------------------------------------------------

impl Ord for FeedItem {
    fn cmp(&self, other: &Self) -> Ordering {
        // `None` < `Some(_)`, so undated items sink to the bottom.
        other.published_at.cmp(&self.published_at)
    }
}

impl PartialOrd for FeedItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
pub(crate) fn make_item(id: &str, title: &str) -> FeedItem {
    FeedItem {
        id: id.to_string(),
        title: title.to_string(),
        url: format!("https://www.youtube.com/watch?v={id}"),
        published_at: None,
        description: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn dated(id: &str, published_at: Option<DateTime<Utc>>) -> FeedItem {
        FeedItem {
            published_at,
            ..make_item(id, id)
        }
    }

    #[test]
    fn sort_reverse_chronological() {
        let old = dated("1", Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()));
        let mid = dated("2", Some(Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()));
        let new = dated("3", Some(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()));

        let mut items = vec![old, new, mid];
        items.sort();

        let ids: Vec<_> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["3", "2", "1"]);
    }

    #[test]
    fn undated_items_sort_after_dated() {
        let dated_item = dated("1", Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()));
        let undated = dated("2", None);

        let mut items = vec![undated, dated_item];
        items.sort();

        assert_eq!(items[0].id, "1");
        assert_eq!(items[1].id, "2");
    }
}
