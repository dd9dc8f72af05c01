//! Blogroller renders the latest posts from a set of RSS/Atom feeds,
//! fetched through a feed-aggregator proxy, into a host-provided surface
//! with Show More pagination.
//!
//! The pieces compose left to right: a [`fetcher::FeedGateway`] talks to the
//! proxy, [`normalize`] reduces its wire shapes to display records,
//! [`engine::AggregationEngine`] owns sorting and pagination state, and
//! [`presenter::Blogroll`] drives a [`presenter::FeedSurface`] with the
//! results. The terminal host in [`viewer`] is one such surface.

pub mod config;
pub mod engine;
pub mod error;
pub mod fetcher;
pub mod models;
pub mod normalize;
pub mod presenter;
pub mod sanitize;
pub mod text;
pub mod viewer;

#[cfg(test)]
mod engine_tests;

pub use config::{BlogrollConfig, BlogrollOptions};
pub use engine::{
    has_more_feeds, sort_feeds_by_date, AggregationEngine, LoadReport, LoadState, LoadStrategy,
    LoadTicket, PageData, PageReport,
};
pub use error::{BlogrollError, Result};
pub use fetcher::{FeedBatch, FeedGateway, PageQuery, ProxyGateway};
pub use models::{DisplayRecord, FailureRecord};
pub use presenter::{Blogroll, FeedSurface, MemorySurface, Notice, RenderedItem};
