use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Category tag attached to a subscription.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Category {
    pub label: String,
}

/// One subscribed feed, as returned by the proxy's subscription listing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedSubscription {
    pub id: String,
    pub title: Option<String>,
    pub html_url: Option<String>,
    pub icon_url: Option<String>,
    #[serde(default)]
    pub categories: Vec<Category>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SubscriptionList {
    #[serde(default)]
    pub subscriptions: Vec<FeedSubscription>,
}

/// Link target of a post; the first alternate is the post's canonical URL.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AlternateLink {
    #[serde(default)]
    pub href: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PostSummary {
    #[serde(default)]
    pub content: String,
}

/// A single post from a feed's stream.
///
/// `published` is a unix timestamp in seconds; zero and absent both mean the
/// feed did not supply a usable date.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FeedPost {
    pub title: Option<String>,
    pub published: Option<i64>,
    #[serde(default)]
    pub alternate: Vec<AlternateLink>,
    pub summary: Option<PostSummary>,
}

/// Stream contents for one feed (`stream/contents/<feed id>?n=1`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StreamContents {
    #[serde(default)]
    pub items: Vec<FeedPost>,
}

/// One feed with its latest items, from the aggregated all-latest endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatorFeed {
    pub id: String,
    pub title: Option<String>,
    pub html_url: Option<String>,
    pub icon_url: Option<String>,
    #[serde(default)]
    pub items: Vec<FeedPost>,
}

/// One page of the feeds-shaped aggregate.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllLatestPage {
    #[serde(default)]
    pub feeds: Vec<AggregatorFeed>,
    #[serde(default)]
    pub page: usize,
    #[serde(default)]
    pub limit: usize,
    #[serde(default)]
    pub total_feeds: usize,
}

/// A post in the digest shape: post fields plus its source-feed metadata.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DigestItem {
    #[serde(flatten)]
    pub post: FeedPost,
    pub feed_id: String,
    pub feed_title: Option<String>,
    pub feed_html_url: Option<String>,
    pub feed_icon_url: Option<String>,
}

/// One page of the digest-shaped aggregate, pre-sorted by the server.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DigestPage {
    #[serde(default)]
    pub items: Vec<DigestItem>,
    #[serde(default)]
    pub page: usize,
    #[serde(default)]
    pub limit: usize,
    #[serde(default)]
    pub total_items: usize,
}

/// A post normalized for display, whatever endpoint it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayRecord {
    pub feed_title: String,
    pub feed_url: String,
    pub feed_icon: Option<String>,
    pub post_title: String,
    pub post_url: String,
    pub pub_date: Option<DateTime<Utc>>,
    pub reading_time: Option<String>,
}

/// A feed that could not be fetched during a fan-out load.
#[derive(Debug, Clone, PartialEq)]
pub struct FailureRecord {
    pub id: String,
    pub title: String,
    pub error: String,
}
