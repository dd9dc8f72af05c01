//! Widget options and the validated configuration derived from them.

use crate::engine::LoadStrategy;
use crate::error::{BlogrollError, Result};

pub const DEFAULT_CONTAINER_ID: &str = "rss-feed";
pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const DEFAULT_DOCUMENT_CLASS: &str = "blogroll";
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Proxy route listing the account's subscriptions.
pub const SUBSCRIPTION_ENDPOINT: &str = "subscription/list";
/// Proxy route prefix for a single feed's stream, feed id appended.
pub const FEED_ENDPOINT: &str = "stream/contents/";

/// Caller-supplied options. Only the proxy URL and category label are
/// required; everything else has a default.
#[derive(Debug, Clone)]
pub struct BlogrollOptions {
    proxy_url: String,
    category_label: String,
    container_id: String,
    batch_size: usize,
    document_class: String,
    strategy: LoadStrategy,
    concurrency: usize,
}

impl BlogrollOptions {
    pub fn new(proxy_url: impl Into<String>, category_label: impl Into<String>) -> Self {
        Self {
            proxy_url: proxy_url.into(),
            category_label: category_label.into(),
            container_id: DEFAULT_CONTAINER_ID.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            document_class: DEFAULT_DOCUMENT_CLASS.to_string(),
            strategy: LoadStrategy::default(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Id of the host container the roll renders into.
    pub fn with_container_id(mut self, container_id: impl Into<String>) -> Self {
        self.container_id = container_id.into();
        self
    }

    /// Posts revealed per page.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Extra class applied to the container alongside the widget's own.
    pub fn with_document_class(mut self, document_class: impl Into<String>) -> Self {
        self.document_class = document_class.into();
        self
    }

    pub fn with_strategy(mut self, strategy: LoadStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Cap on concurrent per-feed requests during fan-out loads.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }
}

/// Validated configuration with the proxy endpoints already derived.
#[derive(Debug, Clone)]
pub struct BlogrollConfig {
    pub proxy_url: String,
    pub category_label: String,
    pub container_id: String,
    pub batch_size: usize,
    pub document_class: String,
    pub strategy: LoadStrategy,
    pub concurrency: usize,
    pub subscription_url: String,
    pub feed_base_url: String,
}

impl BlogrollConfig {
    /// Validates `options` and derives the proxy endpoint URLs.
    ///
    /// The proxy URL is normalized to end in exactly one slash so endpoint
    /// paths can be appended directly.
    pub fn from_options(options: BlogrollOptions) -> Result<Self> {
        let mut missing = Vec::new();
        if options.proxy_url.is_empty() {
            missing.push("proxy_url");
        }
        if options.category_label.is_empty() {
            missing.push("category_label");
        }
        if !missing.is_empty() {
            return Err(BlogrollError::Config(format!(
                "missing required parameter(s): {}",
                missing.join(", ")
            )));
        }

        if !options.proxy_url.starts_with("http://") && !options.proxy_url.starts_with("https://")
        {
            return Err(BlogrollError::Config(
                "'proxy_url' must be an http:// or https:// URL".to_string(),
            ));
        }

        if options.batch_size == 0 {
            return Err(BlogrollError::Config(
                "'batch_size' must be at least 1".to_string(),
            ));
        }

        let proxy_url = format!("{}/", options.proxy_url.trim_end_matches('/'));
        let subscription_url = format!("{proxy_url}{SUBSCRIPTION_ENDPOINT}");
        let feed_base_url = format!("{proxy_url}{FEED_ENDPOINT}");

        Ok(Self {
            proxy_url,
            category_label: options.category_label,
            container_id: options.container_id,
            batch_size: options.batch_size,
            document_class: options.document_class,
            strategy: options.strategy,
            concurrency: options.concurrency.max(1),
            subscription_url,
            feed_base_url,
        })
    }
}
