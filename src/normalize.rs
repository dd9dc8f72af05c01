//! Normalizes proxy wire shapes into [`DisplayRecord`]s.

use chrono::{DateTime, Utc};

use crate::models::{AggregatorFeed, DigestItem, DisplayRecord, FeedPost, FeedSubscription};
use crate::sanitize::URL_FALLBACK;
use crate::text::estimate_reading_time;

pub const UNTITLED_FEED: &str = "Untitled Feed";
pub const UNTITLED_POST: &str = "Untitled Post";

/// Post title of the placeholder record for a feed with no items.
pub const NO_POSTS_TITLE: &str = "No Posts";

/// Converts a unix-seconds timestamp into a date.
///
/// Zero is the proxy's "date unknown" marker and maps to `None`, as do
/// absent and out-of-range values.
pub fn parse_pub_date(published: Option<i64>) -> Option<DateTime<Utc>> {
    match published {
        None | Some(0) => None,
        Some(secs) => DateTime::from_timestamp(secs, 0),
    }
}

/// Builds a record from a subscription and the latest post fetched for it.
pub fn from_subscription(feed: &FeedSubscription, post: &FeedPost) -> DisplayRecord {
    DisplayRecord {
        feed_title: non_empty_or(feed.title.as_deref(), UNTITLED_FEED),
        feed_url: non_empty_or(feed.html_url.as_deref(), URL_FALLBACK),
        feed_icon: feed.icon_url.clone(),
        post_title: non_empty_or(post.title.as_deref(), UNTITLED_POST),
        post_url: post_url(post),
        pub_date: parse_pub_date(post.published),
        reading_time: Some(estimate_reading_time(summary_text(post))),
    }
}

/// Builds a record from an aggregator feed entry, taking its first item.
///
/// A feed the aggregator returned with no items still yields a record, a
/// "No Posts" placeholder, so the feed remains visible in the roll.
pub fn from_aggregator_feed(feed: &AggregatorFeed) -> DisplayRecord {
    let feed_title = non_empty_or(feed.title.as_deref(), UNTITLED_FEED);
    let feed_url = non_empty_or(feed.html_url.as_deref(), URL_FALLBACK);
    match feed.items.first() {
        Some(post) => DisplayRecord {
            feed_title,
            feed_url,
            feed_icon: feed.icon_url.clone(),
            post_title: non_empty_or(post.title.as_deref(), UNTITLED_POST),
            post_url: post_url(post),
            pub_date: parse_pub_date(post.published),
            reading_time: Some(estimate_reading_time(summary_text(post))),
        },
        None => DisplayRecord {
            feed_title,
            feed_url,
            feed_icon: feed.icon_url.clone(),
            post_title: NO_POSTS_TITLE.to_string(),
            post_url: URL_FALLBACK.to_string(),
            pub_date: None,
            reading_time: None,
        },
    }
}

/// Builds a record from a digest item, which carries its own feed metadata.
pub fn from_digest_item(item: &DigestItem) -> DisplayRecord {
    DisplayRecord {
        feed_title: non_empty_or(item.feed_title.as_deref(), UNTITLED_FEED),
        feed_url: non_empty_or(item.feed_html_url.as_deref(), URL_FALLBACK),
        feed_icon: item.feed_icon_url.clone(),
        post_title: non_empty_or(item.post.title.as_deref(), UNTITLED_POST),
        post_url: post_url(&item.post),
        pub_date: parse_pub_date(item.post.published),
        reading_time: Some(estimate_reading_time(summary_text(&item.post))),
    }
}

fn non_empty_or(value: Option<&str>, fallback: &str) -> String {
    match value {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => fallback.to_string(),
    }
}

fn post_url(post: &FeedPost) -> String {
    post.alternate
        .first()
        .map(|link| link.href.as_str())
        .filter(|href| !href.is_empty())
        .unwrap_or(URL_FALLBACK)
        .to_string()
}

fn summary_text(post: &FeedPost) -> &str {
    post.summary.as_ref().map_or("", |s| s.content.as_str())
}
