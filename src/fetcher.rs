//! HTTP gateway to the feed-aggregator proxy.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use crate::config::{BlogrollConfig, DEFAULT_BATCH_SIZE};
use crate::error::{BlogrollError, Result};
use crate::models::{
    AllLatestPage, DigestPage, DisplayRecord, FailureRecord, FeedPost, FeedSubscription,
    StreamContents, SubscriptionList,
};
use crate::normalize::{self, UNTITLED_FEED};

const USER_AGENT: &str = "Blogroller/0.1";
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Aggregated route returning one page of feeds with their latest posts.
pub const ALL_LATEST_ENDPOINT: &str = "all-latest";
/// Aggregated route returning one pre-sorted page of posts.
pub const DIGEST_ENDPOINT: &str = "digest";

/// Query for one page of an aggregated route.
#[derive(Debug, Clone, PartialEq)]
pub struct PageQuery {
    pub label: Option<String>,
    pub page: usize,
    pub limit: usize,
    /// Posts requested per feed, "n" on the wire.
    pub posts_per_feed: usize,
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            label: None,
            page: 1,
            limit: DEFAULT_BATCH_SIZE,
            posts_per_feed: 1,
        }
    }
}

/// Outcome of a fan-out load: one record per feed that produced a post,
/// plus the feeds that were tolerated as failures along the way.
#[derive(Debug, Clone, Default)]
pub struct FeedBatch {
    pub feeds_data: Vec<DisplayRecord>,
    pub failed_feeds: Vec<FailureRecord>,
}

/// Access to the proxy's routes, kept as a trait so hosts and tests can
/// substitute their own transport.
#[async_trait]
pub trait FeedGateway: Send + Sync {
    /// Lists the subscriptions carrying the given category label.
    async fn fetch_subscriptions(&self, category_label: &str) -> Result<Vec<FeedSubscription>>;

    /// Fetches a feed's newest post. `Ok(None)` means the feed is reachable
    /// but has nothing datable to show.
    async fn fetch_latest_post(&self, feed_id: &str) -> Result<Option<FeedPost>>;

    async fn fetch_all_latest(&self, query: &PageQuery) -> Result<AllLatestPage>;

    async fn fetch_digest(&self, query: &PageQuery) -> Result<DigestPage>;

    /// Fetches the latest post of every feed, at most `concurrency` requests
    /// in flight. A failed feed never fails the batch; it lands in
    /// `failed_feeds` with its error. Completion order is irrelevant since
    /// callers re-sort the records.
    async fn fetch_feeds_data(&self, feeds: &[FeedSubscription], concurrency: usize) -> FeedBatch {
        // Futures are collected eagerly so the map closure never lives across
        // an await; embedding it in the buffered stream trips
        // rust-lang/rust#89976 inside this boxed async method.
        let futures: Vec<_> = feeds
            .iter()
            .map(|feed| latest_post_for(self, feed))
            .collect();
        let results: Vec<(&FeedSubscription, Result<Option<FeedPost>>)> = stream::iter(futures)
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

        let mut batch = FeedBatch::default();
        for (feed, outcome) in results {
            match outcome {
                Ok(Some(post)) => batch
                    .feeds_data
                    .push(normalize::from_subscription(feed, &post)),
                Ok(None) => batch.failed_feeds.push(FailureRecord {
                    id: feed.id.clone(),
                    title: feed_title(feed),
                    error: "No posts found".to_string(),
                }),
                Err(err) => {
                    warn!("failed to fetch latest post for '{}': {}", feed.id, err);
                    batch.failed_feeds.push(FailureRecord {
                        id: feed.id.clone(),
                        title: feed_title(feed),
                        error: err.to_string(),
                    });
                }
            }
        }
        batch
    }
}

/// Pairs a feed with its fetched latest post. A named async fn rather than an
/// inline async block so the closure in [`FeedGateway::fetch_feeds_data`]
/// type-checks (rust-lang/rust#89976).
async fn latest_post_for<'a, G: FeedGateway + ?Sized>(
    gateway: &G,
    feed: &'a FeedSubscription,
) -> (&'a FeedSubscription, Result<Option<FeedPost>>) {
    (feed, gateway.fetch_latest_post(&feed.id).await)
}

fn feed_title(feed: &FeedSubscription) -> String {
    match feed.title.as_deref() {
        Some(title) if !title.is_empty() => title.to_string(),
        _ => UNTITLED_FEED.to_string(),
    }
}

/// [`FeedGateway`] backed by a live proxy over HTTP.
///
/// The client sends no referrer with its requests; the pages embedding a
/// blogroll should not leak their address to the proxy or the feeds.
pub struct ProxyGateway {
    client: Client,
    config: BlogrollConfig,
}

impl ProxyGateway {
    pub fn new(config: &BlogrollConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .referer(false)
            .build()?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: impl reqwest::IntoUrl) -> Result<T> {
        let url = url.into_url()?;
        debug!("GET {}", url);
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(BlogrollError::Http(response.status().to_string()));
        }
        Ok(response.json().await?)
    }

    fn subscription_url(&self) -> Result<Url> {
        let mut url = parse_endpoint(&self.config.subscription_url)?;
        url.query_pairs_mut().append_pair("output", "json");
        Ok(url)
    }

    fn feed_stream_url(&self, feed_id: &str) -> String {
        format!(
            "{}{}?n=1",
            self.config.feed_base_url,
            urlencoding::encode(feed_id)
        )
    }

    fn page_url(&self, endpoint: &str, query: &PageQuery) -> Result<Url> {
        let mut url = parse_endpoint(&format!("{}{}", self.config.proxy_url, endpoint))?;
        {
            let mut pairs = url.query_pairs_mut();
            if let Some(label) = &query.label {
                pairs.append_pair("label", label);
            }
            pairs.append_pair("page", &query.page.to_string());
            pairs.append_pair("limit", &query.limit.to_string());
            pairs.append_pair("n", &query.posts_per_feed.to_string());
        }
        Ok(url)
    }
}

fn parse_endpoint(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|err| BlogrollError::Config(format!("invalid proxy URL '{raw}': {err}")))
}

/// Keeps the subscriptions whose category list carries `label` exactly,
/// case-sensitively.
fn filter_by_label(
    subscriptions: Vec<FeedSubscription>,
    label: &str,
) -> Vec<FeedSubscription> {
    subscriptions
        .into_iter()
        .filter(|feed| feed.categories.iter().any(|c| c.label == label))
        .collect()
}

#[async_trait]
impl FeedGateway for ProxyGateway {
    async fn fetch_subscriptions(&self, category_label: &str) -> Result<Vec<FeedSubscription>> {
        if category_label.is_empty() {
            return Err(BlogrollError::Config(
                "missing required parameter(s): category_label".to_string(),
            ));
        }
        let list: SubscriptionList = self.get_json(self.subscription_url()?).await?;
        let total = list.subscriptions.len();
        let matching = filter_by_label(list.subscriptions, category_label);
        debug!(
            "{} of {} subscriptions carry label '{}'",
            matching.len(),
            total,
            category_label
        );
        Ok(matching)
    }

    async fn fetch_latest_post(&self, feed_id: &str) -> Result<Option<FeedPost>> {
        if feed_id.is_empty() {
            return Err(BlogrollError::Config(
                "missing required parameter(s): feed_id".to_string(),
            ));
        }
        let contents: StreamContents = self.get_json(self.feed_stream_url(feed_id)).await?;
        let Some(post) = contents.items.into_iter().next() else {
            warn!("no items found for feed '{}'", feed_id);
            return Ok(None);
        };
        if post.published.is_none() {
            warn!("feed '{}' returned a post without a publish date", feed_id);
            return Ok(None);
        }
        Ok(Some(post))
    }

    async fn fetch_all_latest(&self, query: &PageQuery) -> Result<AllLatestPage> {
        self.get_json(self.page_url(ALL_LATEST_ENDPOINT, query)?).await
    }

    async fn fetch_digest(&self, query: &PageQuery) -> Result<DigestPage> {
        self.get_json(self.page_url(DIGEST_ENDPOINT, query)?).await
    }
}
