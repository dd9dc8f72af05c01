//! Rendering contract and the widget facade.
//!
//! The crate never touches a display technology directly. Hosts hand in a
//! [`FeedSurface`] and the [`Blogroll`] facade drives it: notices while
//! loading or on failure, sanitized items as pages arrive, and a Show More
//! control whose visibility tracks the pagination state.

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{BlogrollConfig, BlogrollOptions, DEFAULT_CONTAINER_ID};
use crate::engine::{AggregationEngine, LoadReport, LoadState, PageReport};
use crate::error::{BlogrollError, Result};
use crate::fetcher::{FeedGateway, ProxyGateway};
use crate::models::DisplayRecord;
use crate::sanitize::{escape_html, validate_url, URL_FALLBACK};
use crate::text::relative_date;

/// Class every blogroll applies to its container, for host styling.
pub const CONTAINER_CLASS: &str = "blogroller-feed-container";

/// Status messages the widget can show in place of items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    Loading,
    NoPosts,
    LoadFailed,
}

impl Notice {
    pub fn message(self) -> &'static str {
        match self {
            Notice::Loading => "Loading latest posts...",
            Notice::NoPosts => "No latest posts available at this time.",
            Notice::LoadFailed => "Failed to load posts. Please try again later.",
        }
    }
}

/// A record with every feed-authored string escaped or validated, safe to
/// hand to any surface.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedItem {
    pub feed_title: String,
    pub feed_url: String,
    pub feed_icon: Option<String>,
    pub post_title: String,
    pub post_url: String,
    pub reading_time: String,
    pub relative_date: String,
}

impl RenderedItem {
    pub fn from_record(record: &DisplayRecord) -> Self {
        Self {
            feed_title: escape_html(&record.feed_title),
            feed_url: validate_url(&record.feed_url, URL_FALLBACK),
            // An icon with a bad URL is dropped rather than pointed at "#".
            feed_icon: record
                .feed_icon
                .as_deref()
                .map(|url| validate_url(url, ""))
                .filter(|url| !url.is_empty()),
            post_title: escape_html(&record.post_title),
            post_url: validate_url(&record.post_url, URL_FALLBACK),
            reading_time: record
                .reading_time
                .clone()
                .unwrap_or_else(|| "N/A".to_string()),
            relative_date: relative_date(record.pub_date),
        }
    }
}

/// What a host must provide for the widget to render into.
pub trait FeedSurface {
    /// Whether the container the widget was configured with exists.
    fn has_container(&self, container_id: &str) -> bool;

    fn add_container_class(&mut self, class: &str);

    /// Replaces the container's content with a status message.
    fn set_notice(&mut self, notice: Notice);

    /// Empties the container.
    fn clear(&mut self);

    fn append_item(&mut self, item: &RenderedItem);

    /// Shows or hides the Show More control. `true` creates the control on
    /// first use; `false` only ever hides an existing one.
    fn set_show_more_visible(&mut self, visible: bool);
}

/// One blogroll wired to a gateway and a surface.
#[derive(Debug)]
pub struct Blogroll<G, S> {
    instance: Uuid,
    engine: AggregationEngine<G>,
    surface: S,
}

impl<G: FeedGateway, S: FeedSurface> Blogroll<G, S> {
    /// Validates `options`, claims the container, and returns the widget
    /// ready for [`Blogroll::load_feeds`]. Nothing is fetched yet.
    pub fn initialize(options: BlogrollOptions, gateway: G, surface: S) -> Result<Self> {
        let config = BlogrollConfig::from_options(options)?;
        Self::with_config(config, gateway, surface)
    }

    fn with_config(config: BlogrollConfig, gateway: G, mut surface: S) -> Result<Self> {
        if !surface.has_container(&config.container_id) {
            return Err(BlogrollError::ContainerNotFound(config.container_id));
        }
        surface.add_container_class(CONTAINER_CLASS);
        surface.add_container_class(&config.document_class);
        let instance = Uuid::new_v4();
        info!(
            "blogroll {} initialized (label '{}', {:?})",
            instance, config.category_label, config.strategy
        );
        Ok(Self {
            instance,
            engine: AggregationEngine::new(gateway, config),
            surface,
        })
    }

    /// Loads and renders the first page. Repeat calls do nothing.
    pub async fn load_feeds(&mut self) {
        if self.engine.state() != LoadState::Initial {
            debug!("blogroll {}: already loaded, ignoring", self.instance);
            return;
        }
        self.surface.set_notice(Notice::Loading);
        let report = self.engine.load_first().await;
        self.render(report);
    }

    /// Reveals the next page. Does nothing unless more is available.
    pub async fn show_more(&mut self) {
        let report = self.engine.load_more().await;
        self.render(report);
    }

    fn render(&mut self, report: LoadReport) {
        match report {
            LoadReport::Ignored | LoadReport::Discarded => {}
            LoadReport::Failed => self.surface.set_notice(Notice::LoadFailed),
            LoadReport::Loaded(page) => self.render_page(page),
        }
    }

    fn render_page(&mut self, page: PageReport) {
        if !page.failures.is_empty() {
            warn!(
                "blogroll {}: {} feed(s) failed to load",
                self.instance,
                page.failures.len()
            );
        }
        if page.state == LoadState::LoadedEmpty {
            self.surface.set_notice(Notice::NoPosts);
            self.surface.set_show_more_visible(false);
            return;
        }
        if page.page == 1 {
            self.surface.clear();
        }
        for record in &page.appended {
            self.surface.append_item(&RenderedItem::from_record(record));
        }
        self.surface
            .set_show_more_visible(page.state == LoadState::LoadedWithMore);
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance
    }

    pub fn state(&self) -> LoadState {
        self.engine.state()
    }

    pub fn current_page(&self) -> usize {
        self.engine.current_page()
    }

    pub fn has_more_feeds(&self) -> bool {
        self.engine.has_more_feeds()
    }

    pub fn config(&self) -> &BlogrollConfig {
        self.engine.config()
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }
}

impl<S: FeedSurface> Blogroll<ProxyGateway, S> {
    /// [`Blogroll::initialize`] wired to the live proxy gateway.
    pub fn connect(options: BlogrollOptions, surface: S) -> Result<Self> {
        let config = BlogrollConfig::from_options(options)?;
        let gateway = ProxyGateway::new(&config)?;
        Self::with_config(config, gateway, surface)
    }
}

/// A [`FeedSurface`] that records what was rendered. Backs the terminal
/// viewer and doubles as the test surface.
#[derive(Debug)]
pub struct MemorySurface {
    container_id: String,
    classes: Vec<String>,
    items: Vec<RenderedItem>,
    notice: Option<Notice>,
    // None means the Show More control was never created.
    show_more: Option<bool>,
}

impl Default for MemorySurface {
    fn default() -> Self {
        Self::new(DEFAULT_CONTAINER_ID)
    }
}

impl MemorySurface {
    pub fn new(container_id: impl Into<String>) -> Self {
        Self {
            container_id: container_id.into(),
            classes: Vec::new(),
            items: Vec::new(),
            notice: None,
            show_more: None,
        }
    }

    pub fn items(&self) -> &[RenderedItem] {
        &self.items
    }

    pub fn notice(&self) -> Option<Notice> {
        self.notice
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn show_more_created(&self) -> bool {
        self.show_more.is_some()
    }

    pub fn show_more_visible(&self) -> bool {
        self.show_more == Some(true)
    }
}

impl FeedSurface for MemorySurface {
    fn has_container(&self, container_id: &str) -> bool {
        self.container_id == container_id
    }

    fn add_container_class(&mut self, class: &str) {
        if !self.classes.iter().any(|c| c == class) {
            self.classes.push(class.to_string());
        }
    }

    fn set_notice(&mut self, notice: Notice) {
        self.items.clear();
        self.notice = Some(notice);
    }

    fn clear(&mut self) {
        self.items.clear();
        self.notice = None;
    }

    fn append_item(&mut self, item: &RenderedItem) {
        self.items.push(item.clone());
    }

    fn set_show_more_visible(&mut self, visible: bool) {
        match self.show_more {
            None if !visible => {}
            _ => self.show_more = Some(visible),
        }
    }
}
