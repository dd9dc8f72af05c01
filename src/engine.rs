//! Aggregation and pagination state for a blogroll.
//!
//! The engine owns the load lifecycle. A load runs in three phases so hosts
//! can drive it however they like: [`AggregationEngine::begin_load`] issues a
//! ticket and moves the roll to [`LoadState::Loading`],
//! [`AggregationEngine::fetch_page`] performs the I/O, and
//! [`AggregationEngine::complete_load`] redeems the ticket against the state.
//! A ticket issued before a [`AggregationEngine::reset`] is redeemed as
//! [`LoadReport::Discarded`], so a stale response can never clobber a roll
//! that has started over. [`AggregationEngine::load_first`] and
//! [`AggregationEngine::load_more`] chain the three phases for the common
//! case.

use tracing::{debug, error, warn};

use crate::config::BlogrollConfig;
use crate::error::Result;
use crate::fetcher::{FeedBatch, FeedGateway, PageQuery};
use crate::models::{AllLatestPage, DigestPage, DisplayRecord, FailureRecord};
use crate::normalize;

/// How the engine obtains a page of records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoadStrategy {
    /// Fetch the subscription list, then every feed's latest post, and page
    /// through the sorted result locally.
    FanOut,
    /// Page through the feeds-shaped aggregate route.
    AllLatest,
    /// Page through the post-shaped aggregate route, pre-sorted by the server.
    #[default]
    Digest,
}

/// Lifecycle of the roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// Nothing loaded yet.
    Initial,
    /// A load is in flight; further load requests are ignored.
    Loading,
    /// The first page came back with no records at all.
    LoadedEmpty,
    /// Records are showing and the server has more.
    LoadedWithMore,
    /// Records are showing and the roll is exhausted.
    LoadedComplete,
    /// A load failed outright. Terminal until [`AggregationEngine::reset`].
    LoadFailed,
}

/// Sorts records newest first, dropping any without a publish date.
///
/// The sort is stable, so records sharing a date keep their relative order,
/// and sorting an already-sorted roll changes nothing.
pub fn sort_feeds_by_date(records: Vec<DisplayRecord>) -> Vec<DisplayRecord> {
    let before = records.len();
    let mut dated: Vec<DisplayRecord> = records
        .into_iter()
        .filter(|record| record.pub_date.is_some())
        .collect();
    let dropped = before - dated.len();
    if dropped > 0 {
        warn!("dropping {} record(s) without a publish date", dropped);
    }
    dated.sort_by(|a, b| b.pub_date.cmp(&a.pub_date));
    dated
}

/// Whether another page is worth requesting, given what the server returned.
///
/// A short page means the server ran out. A full page may still be the last
/// one, which `page * limit < total` catches without an extra request.
pub fn has_more_feeds(
    returned: usize,
    batch_size: usize,
    page: usize,
    limit: usize,
    total: usize,
) -> bool {
    returned == batch_size && page * limit < total
}

/// Authorization for one in-flight load, redeemed exactly once.
#[derive(Debug)]
pub struct LoadTicket {
    seq: u64,
    page: usize,
}

impl LoadTicket {
    pub fn page(&self) -> usize {
        self.page
    }
}

/// Raw result of fetching one page, before any state is applied.
#[derive(Debug)]
pub enum PageData {
    /// Fan-out page 1: the full batch of per-feed results.
    FanOut(Result<FeedBatch>),
    /// Fan-out beyond page 1: served from records already in memory.
    Cached,
    AllLatest(Result<AllLatestPage>),
    Digest(Result<DigestPage>),
}

/// What redeeming a ticket did to the roll.
#[derive(Debug)]
pub enum LoadReport {
    /// The load was refused up front: one was already in flight, or the
    /// roll was not in a state that allows this load.
    Ignored,
    /// The response arrived after a reset and was thrown away.
    Discarded,
    /// The whole load failed; the roll is now [`LoadState::LoadFailed`].
    Failed,
    Loaded(PageReport),
}

/// One page successfully applied to the roll.
#[derive(Debug, Clone)]
pub struct PageReport {
    pub page: usize,
    pub state: LoadState,
    /// Records this page adds to the display, already in display order.
    pub appended: Vec<DisplayRecord>,
    /// Feeds that failed during a fan-out load; empty for aggregate pages.
    pub failures: Vec<FailureRecord>,
}

#[derive(Debug)]
pub struct AggregationEngine<G> {
    gateway: G,
    config: BlogrollConfig,
    state: LoadState,
    current_page: usize,
    has_more: bool,
    load_seq: u64,
    // Fan-out keeps the whole sorted roll and reveals it a slice at a time.
    roll: Vec<DisplayRecord>,
    cursor: usize,
}

impl<G: FeedGateway> AggregationEngine<G> {
    pub fn new(gateway: G, config: BlogrollConfig) -> Self {
        Self {
            gateway,
            config,
            state: LoadState::Initial,
            current_page: 1,
            has_more: false,
            load_seq: 0,
            roll: Vec::new(),
            cursor: 0,
        }
    }

    pub fn config(&self) -> &BlogrollConfig {
        &self.config
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn has_more_feeds(&self) -> bool {
        self.has_more
    }

    /// Loads page 1. Does nothing unless the roll is untouched.
    pub async fn load_first(&mut self) -> LoadReport {
        if self.state != LoadState::Initial {
            debug!("initial load requested in state {:?}, ignoring", self.state);
            return LoadReport::Ignored;
        }
        self.run_load().await
    }

    /// Loads the next page. Does nothing unless the server has more.
    pub async fn load_more(&mut self) -> LoadReport {
        if self.state != LoadState::LoadedWithMore {
            debug!("show-more requested in state {:?}, ignoring", self.state);
            return LoadReport::Ignored;
        }
        self.current_page += 1;
        self.run_load().await
    }

    /// Returns the roll to [`LoadState::Initial`] and invalidates any ticket
    /// still in flight. The recovery path out of [`LoadState::LoadFailed`].
    pub fn reset(&mut self) {
        self.load_seq += 1;
        self.state = LoadState::Initial;
        self.current_page = 1;
        self.has_more = false;
        self.roll.clear();
        self.cursor = 0;
    }

    async fn run_load(&mut self) -> LoadReport {
        match self.begin_load() {
            Some(ticket) => {
                let data = self.fetch_page(&ticket).await;
                self.complete_load(ticket, data)
            }
            None => LoadReport::Ignored,
        }
    }

    /// Starts a load if the state machine allows one.
    pub fn begin_load(&mut self) -> Option<LoadTicket> {
        match self.state {
            LoadState::Loading => {
                debug!("load already in flight, ignoring");
                None
            }
            LoadState::LoadFailed => {
                debug!("roll is in the failed state, reset() to recover");
                None
            }
            _ => {
                self.load_seq += 1;
                self.state = LoadState::Loading;
                Some(LoadTicket {
                    seq: self.load_seq,
                    page: self.current_page,
                })
            }
        }
    }

    /// Fetches the page named by the ticket. No state changes here.
    pub async fn fetch_page(&self, ticket: &LoadTicket) -> PageData {
        match self.config.strategy {
            LoadStrategy::FanOut => {
                if ticket.page == 1 {
                    PageData::FanOut(self.fetch_fanout().await)
                } else {
                    PageData::Cached
                }
            }
            LoadStrategy::AllLatest => {
                PageData::AllLatest(self.gateway.fetch_all_latest(&self.page_query(ticket)).await)
            }
            LoadStrategy::Digest => {
                PageData::Digest(self.gateway.fetch_digest(&self.page_query(ticket)).await)
            }
        }
    }

    /// Applies a fetched page to the roll, unless the ticket went stale.
    pub fn complete_load(&mut self, ticket: LoadTicket, data: PageData) -> LoadReport {
        if ticket.seq != self.load_seq {
            debug!("discarding stale response for page {}", ticket.page);
            return LoadReport::Discarded;
        }
        match data {
            PageData::FanOut(Ok(batch)) => self.apply_fanout(ticket.page, batch),
            PageData::Cached => self.apply_slice(ticket.page, Vec::new()),
            PageData::AllLatest(Ok(page)) => self.apply_all_latest(ticket.page, page),
            PageData::Digest(Ok(page)) => self.apply_digest(ticket.page, page),
            PageData::FanOut(Err(err))
            | PageData::AllLatest(Err(err))
            | PageData::Digest(Err(err)) => {
                error!("failed to load feeds: {}", err);
                self.state = LoadState::LoadFailed;
                self.has_more = false;
                LoadReport::Failed
            }
        }
    }

    fn page_query(&self, ticket: &LoadTicket) -> PageQuery {
        PageQuery {
            label: Some(self.config.category_label.clone()),
            page: ticket.page,
            limit: self.config.batch_size,
            posts_per_feed: 1,
        }
    }

    async fn fetch_fanout(&self) -> Result<FeedBatch> {
        let subscriptions = self
            .gateway
            .fetch_subscriptions(&self.config.category_label)
            .await?;
        Ok(self
            .gateway
            .fetch_feeds_data(&subscriptions, self.config.concurrency)
            .await)
    }

    fn apply_fanout(&mut self, page: usize, batch: FeedBatch) -> LoadReport {
        self.roll = sort_feeds_by_date(batch.feeds_data);
        self.cursor = 0;
        if self.roll.is_empty() {
            self.has_more = false;
            self.state = LoadState::LoadedEmpty;
            return LoadReport::Loaded(PageReport {
                page,
                state: self.state,
                appended: Vec::new(),
                failures: batch.failed_feeds,
            });
        }
        self.apply_slice(page, batch.failed_feeds)
    }

    fn apply_slice(&mut self, page: usize, failures: Vec<FailureRecord>) -> LoadReport {
        let end = (self.cursor + self.config.batch_size).min(self.roll.len());
        let appended = self.roll[self.cursor..end].to_vec();
        self.cursor = end;
        self.has_more = self.cursor < self.roll.len();
        self.state = if self.has_more {
            LoadState::LoadedWithMore
        } else {
            LoadState::LoadedComplete
        };
        LoadReport::Loaded(PageReport {
            page,
            state: self.state,
            appended,
            failures,
        })
    }

    fn apply_all_latest(&mut self, page: usize, data: AllLatestPage) -> LoadReport {
        let returned = data.feeds.len();
        if returned == 0 {
            return self.apply_empty_page(page);
        }
        let records =
            order_page_records(data.feeds.iter().map(normalize::from_aggregator_feed).collect());
        // The server sometimes omits the total; fall back to what it sent.
        let total = if data.total_feeds > 0 {
            data.total_feeds
        } else {
            returned
        };
        self.finish_server_page(page, records, returned, data.page, data.limit, total)
    }

    fn apply_digest(&mut self, page: usize, data: DigestPage) -> LoadReport {
        let returned = data.items.len();
        if returned == 0 {
            return self.apply_empty_page(page);
        }
        // Digest pages arrive pre-sorted across the whole roll; serve as-is.
        let records = data.items.iter().map(normalize::from_digest_item).collect();
        self.finish_server_page(page, records, returned, data.page, data.limit, data.total_items)
    }

    fn apply_empty_page(&mut self, page: usize) -> LoadReport {
        self.has_more = false;
        // An empty later page just means the roll is exhausted; whatever is
        // already showing stays.
        self.state = if page == 1 {
            LoadState::LoadedEmpty
        } else {
            LoadState::LoadedComplete
        };
        LoadReport::Loaded(PageReport {
            page,
            state: self.state,
            appended: Vec::new(),
            failures: Vec::new(),
        })
    }

    fn finish_server_page(
        &mut self,
        page: usize,
        records: Vec<DisplayRecord>,
        returned: usize,
        echoed_page: usize,
        limit: usize,
        total: usize,
    ) -> LoadReport {
        // The paging counters echoed by the server decide whether to offer
        // another page; a response without them offers none.
        self.has_more = echoed_page > 0
            && limit > 0
            && has_more_feeds(returned, self.config.batch_size, echoed_page, limit, total);
        self.state = if self.has_more {
            LoadState::LoadedWithMore
        } else {
            LoadState::LoadedComplete
        };
        LoadReport::Loaded(PageReport {
            page,
            state: self.state,
            appended: records,
            failures: Vec::new(),
        })
    }
}

/// Orders one page of feeds-shaped records: dated records newest first,
/// then the dateless placeholders in their served order. Placeholders are
/// kept visible rather than dropped, unlike a fan-out sort.
fn order_page_records(records: Vec<DisplayRecord>) -> Vec<DisplayRecord> {
    let (mut dated, undated): (Vec<DisplayRecord>, Vec<DisplayRecord>) = records
        .into_iter()
        .partition(|record| record.pub_date.is_some());
    dated.sort_by(|a, b| b.pub_date.cmp(&a.pub_date));
    dated.extend(undated);
    dated
}
