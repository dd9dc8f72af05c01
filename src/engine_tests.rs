use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::DateTime;

use crate::config::{BlogrollConfig, BlogrollOptions};
use crate::engine::{
    has_more_feeds, sort_feeds_by_date, AggregationEngine, LoadReport, LoadState, LoadStrategy,
    PageReport,
};
use crate::error::{BlogrollError, Result};
use crate::fetcher::{FeedGateway, PageQuery};
use crate::models::{
    AggregatorFeed, AllLatestPage, AlternateLink, DigestItem, DigestPage, DisplayRecord, FeedPost,
    FeedSubscription,
};

fn record(title: &str, published: Option<i64>) -> DisplayRecord {
    DisplayRecord {
        feed_title: format!("{title} feed"),
        feed_url: "https://feeds.example".to_string(),
        feed_icon: None,
        post_title: title.to_string(),
        post_url: format!("https://posts.example/{title}"),
        pub_date: published.and_then(|secs| DateTime::from_timestamp(secs, 0)),
        reading_time: Some("1 min read".to_string()),
    }
}

fn titles(records: &[DisplayRecord]) -> Vec<&str> {
    records.iter().map(|r| r.post_title.as_str()).collect()
}

#[test]
fn test_sort_newest_first_dropping_undated() {
    let sorted = sort_feeds_by_date(vec![
        record("old", Some(100)),
        record("undated", None),
        record("new", Some(300)),
        record("mid", Some(200)),
    ]);
    assert_eq!(titles(&sorted), ["new", "mid", "old"]);
}

#[test]
fn test_sort_is_stable_for_equal_dates() {
    let sorted = sort_feeds_by_date(vec![
        record("a", Some(100)),
        record("b", Some(100)),
        record("c", Some(100)),
    ]);
    assert_eq!(titles(&sorted), ["a", "b", "c"]);
}

#[test]
fn test_sort_is_idempotent() {
    let once = sort_feeds_by_date(vec![
        record("b", Some(200)),
        record("a", Some(100)),
        record("c", Some(300)),
    ]);
    let twice = sort_feeds_by_date(once.clone());
    assert_eq!(once, twice);
}

#[test]
fn test_has_more_arithmetic() {
    // Short page: the server ran out.
    assert!(!has_more_feeds(3, 10, 1, 10, 100));
    // Full page with records beyond it.
    assert!(has_more_feeds(10, 10, 1, 10, 100));
    // Full page that exactly exhausts the total.
    assert!(!has_more_feeds(10, 10, 2, 10, 20));
    assert!(has_more_feeds(10, 10, 2, 10, 21));
    // Two records served one at a time: more after page 1, done after 2.
    assert!(has_more_feeds(1, 1, 1, 1, 2));
    assert!(!has_more_feeds(1, 1, 2, 1, 2));
}

// ---------------------------------------------------------------------------
// Scripted gateway
// ---------------------------------------------------------------------------

enum PostScript {
    Latest(FeedPost),
    Empty,
    Down(String),
}

#[derive(Default)]
struct FakeGateway {
    subscriptions: Vec<FeedSubscription>,
    posts: HashMap<String, PostScript>,
    all_latest_pages: Mutex<VecDeque<Result<AllLatestPage>>>,
    digest_pages: Mutex<VecDeque<Result<DigestPage>>>,
    subscription_calls: Mutex<usize>,
    page_queries: Mutex<Vec<PageQuery>>,
}

#[async_trait]
impl FeedGateway for FakeGateway {
    async fn fetch_subscriptions(&self, _label: &str) -> Result<Vec<FeedSubscription>> {
        *self.subscription_calls.lock().unwrap() += 1;
        Ok(self.subscriptions.clone())
    }

    async fn fetch_latest_post(&self, feed_id: &str) -> Result<Option<FeedPost>> {
        match self.posts.get(feed_id) {
            Some(PostScript::Latest(post)) => Ok(Some(post.clone())),
            Some(PostScript::Empty) => Ok(None),
            Some(PostScript::Down(status)) => Err(BlogrollError::Http(status.clone())),
            None => panic!("unscripted feed '{feed_id}'"),
        }
    }

    async fn fetch_all_latest(&self, query: &PageQuery) -> Result<AllLatestPage> {
        self.page_queries.lock().unwrap().push(query.clone());
        self.all_latest_pages
            .lock()
            .unwrap()
            .pop_front()
            .expect("unscripted all-latest page")
    }

    async fn fetch_digest(&self, query: &PageQuery) -> Result<DigestPage> {
        self.page_queries.lock().unwrap().push(query.clone());
        self.digest_pages
            .lock()
            .unwrap()
            .pop_front()
            .expect("unscripted digest page")
    }
}

fn post(title: &str, published: i64) -> FeedPost {
    FeedPost {
        title: Some(title.to_string()),
        published: (published != 0).then_some(published),
        alternate: vec![AlternateLink {
            href: format!("https://posts.example/{title}"),
        }],
        summary: None,
    }
}

fn digest_page(items: &[(&str, i64)], page: usize, limit: usize, total: usize) -> DigestPage {
    DigestPage {
        items: items
            .iter()
            .map(|(title, published)| DigestItem {
                post: post(title, *published),
                feed_id: format!("feed/{title}"),
                feed_title: Some(format!("{title} feed")),
                feed_html_url: Some("https://feeds.example".to_string()),
                feed_icon_url: None,
            })
            .collect(),
        page,
        limit,
        total_items: total,
    }
}

fn aggregator_feed(title: &str, published: i64) -> AggregatorFeed {
    AggregatorFeed {
        id: format!("feed/{title}"),
        title: Some(title.to_string()),
        html_url: Some("https://feeds.example".to_string()),
        icon_url: None,
        items: if published == 0 {
            Vec::new()
        } else {
            vec![post(title, published)]
        },
    }
}

fn subscription(id: &str) -> FeedSubscription {
    FeedSubscription {
        id: id.to_string(),
        title: Some(format!("{id} feed")),
        html_url: Some("https://feeds.example".to_string()),
        icon_url: None,
        categories: Vec::new(),
    }
}

fn digest_gateway(pages: Vec<Result<DigestPage>>) -> FakeGateway {
    FakeGateway {
        digest_pages: Mutex::new(pages.into()),
        ..Default::default()
    }
}

fn all_latest_gateway(pages: Vec<Result<AllLatestPage>>) -> FakeGateway {
    FakeGateway {
        all_latest_pages: Mutex::new(pages.into()),
        ..Default::default()
    }
}

fn fanout_gateway(ids: &[&str], posts: Vec<(&str, PostScript)>) -> FakeGateway {
    FakeGateway {
        subscriptions: ids.iter().map(|id| subscription(id)).collect(),
        posts: posts
            .into_iter()
            .map(|(id, script)| (id.to_string(), script))
            .collect(),
        ..Default::default()
    }
}

fn engine_with(
    gateway: FakeGateway,
    strategy: LoadStrategy,
    batch_size: usize,
) -> AggregationEngine<FakeGateway> {
    let options = BlogrollOptions::new("https://proxy.example/reader", "favs")
        .with_strategy(strategy)
        .with_batch_size(batch_size)
        .with_concurrency(2);
    AggregationEngine::new(gateway, BlogrollConfig::from_options(options).unwrap())
}

fn expect_loaded(report: LoadReport) -> PageReport {
    match report {
        LoadReport::Loaded(page) => page,
        other => panic!("expected a loaded page, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Digest strategy
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_digest_paginates_until_exhausted() {
    let gateway = digest_gateway(vec![
        Ok(digest_page(&[("e", 500), ("d", 400), ("c", 300), ("b", 200), ("a", 100)], 1, 5, 12)),
        Ok(digest_page(&[("j", 95), ("i", 94), ("h", 93), ("g", 92), ("f", 91)], 2, 5, 12)),
        Ok(digest_page(&[("l", 80), ("k", 70)], 3, 5, 12)),
    ]);
    let mut engine = engine_with(gateway, LoadStrategy::Digest, 5);

    let first = expect_loaded(engine.load_first().await);
    assert_eq!(first.page, 1);
    assert_eq!(first.appended.len(), 5);
    assert_eq!(first.state, LoadState::LoadedWithMore);
    assert!(engine.has_more_feeds());

    let second = expect_loaded(engine.load_more().await);
    assert_eq!(second.page, 2);
    assert_eq!(second.state, LoadState::LoadedWithMore);

    let third = expect_loaded(engine.load_more().await);
    assert_eq!(third.page, 3);
    assert_eq!(third.appended.len(), 2);
    assert_eq!(third.state, LoadState::LoadedComplete);
    assert!(!engine.has_more_feeds());
    assert_eq!(engine.current_page(), 3);

    // Nothing left to request.
    assert!(matches!(engine.load_more().await, LoadReport::Ignored));
}

#[tokio::test]
async fn test_digest_requests_consecutive_pages() {
    let gateway = digest_gateway(vec![
        Ok(digest_page(&[("b", 200), ("a", 100)], 1, 2, 4)),
        Ok(digest_page(&[("d", 90), ("c", 80)], 2, 2, 4)),
    ]);
    let mut engine = engine_with(gateway, LoadStrategy::Digest, 2);
    engine.load_first().await;
    engine.load_more().await;

    let queries = engine.gateway().page_queries.lock().unwrap().clone();
    assert_eq!(queries.len(), 2);
    assert_eq!(queries[0].page, 1);
    assert_eq!(queries[1].page, 2);
    assert!(queries.iter().all(|q| q.label.as_deref() == Some("favs")));
    assert!(queries.iter().all(|q| q.limit == 2));
}

#[tokio::test]
async fn test_digest_preserves_served_order() {
    // The server's global order wins even when page dates look shuffled.
    let gateway = digest_gateway(vec![Ok(digest_page(
        &[("first", 100), ("second", 300), ("third", 200)],
        1,
        5,
        3,
    ))]);
    let mut engine = engine_with(gateway, LoadStrategy::Digest, 5);
    let page = expect_loaded(engine.load_first().await);
    assert_eq!(titles(&page.appended), ["first", "second", "third"]);
}

#[tokio::test]
async fn test_digest_exact_total_boundary() {
    // 2 pages * 5 per page == 10 total: the second full page is the last.
    let gateway = digest_gateway(vec![
        Ok(digest_page(&[("e", 50), ("d", 40), ("c", 30), ("b", 20), ("a", 10)], 1, 5, 10)),
        Ok(digest_page(&[("j", 9), ("i", 8), ("h", 7), ("g", 6), ("f", 5)], 2, 5, 10)),
    ]);
    let mut engine = engine_with(gateway, LoadStrategy::Digest, 5);
    engine.load_first().await;
    let last = expect_loaded(engine.load_more().await);
    assert_eq!(last.state, LoadState::LoadedComplete);
}

#[tokio::test]
async fn test_empty_first_page_is_empty_roll() {
    let gateway = digest_gateway(vec![Ok(digest_page(&[], 1, 5, 0))]);
    let mut engine = engine_with(gateway, LoadStrategy::Digest, 5);
    let page = expect_loaded(engine.load_first().await);
    assert_eq!(page.state, LoadState::LoadedEmpty);
    assert!(page.appended.is_empty());
    assert!(!engine.has_more_feeds());
}

#[tokio::test]
async fn test_empty_later_page_completes_roll() {
    // The total lied; the roll just ends where the server ran out.
    let gateway = digest_gateway(vec![
        Ok(digest_page(&[("b", 200), ("a", 100)], 1, 2, 10)),
        Ok(digest_page(&[], 2, 2, 10)),
    ]);
    let mut engine = engine_with(gateway, LoadStrategy::Digest, 2);
    engine.load_first().await;
    let page = expect_loaded(engine.load_more().await);
    assert_eq!(page.state, LoadState::LoadedComplete);
    assert!(page.appended.is_empty());
}

#[tokio::test]
async fn test_missing_page_counters_mean_no_more() {
    // A response that echoes no paging counters cannot promise more pages.
    let gateway = digest_gateway(vec![Ok(digest_page(&[("b", 200), ("a", 100)], 0, 0, 100))]);
    let mut engine = engine_with(gateway, LoadStrategy::Digest, 2);
    let page = expect_loaded(engine.load_first().await);
    assert_eq!(page.state, LoadState::LoadedComplete);
}

// ---------------------------------------------------------------------------
// All-latest strategy
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_all_latest_resorts_page_and_keeps_placeholders() {
    let gateway = all_latest_gateway(vec![Ok(AllLatestPage {
        feeds: vec![
            aggregator_feed("old", 200),
            aggregator_feed("quiet", 0),
            aggregator_feed("new", 400),
        ],
        page: 1,
        limit: 3,
        total_feeds: 9,
    })]);
    let mut engine = engine_with(gateway, LoadStrategy::AllLatest, 3);
    let page = expect_loaded(engine.load_first().await);

    assert_eq!(titles(&page.appended), ["new", "old", "No Posts"]);
    assert_eq!(page.appended[2].feed_title, "quiet");
    assert_eq!(page.state, LoadState::LoadedWithMore);
}

#[tokio::test]
async fn test_all_latest_total_falls_back_to_returned() {
    // With no total advertised, a full page is assumed to be everything.
    let gateway = all_latest_gateway(vec![Ok(AllLatestPage {
        feeds: vec![aggregator_feed("b", 200), aggregator_feed("a", 100)],
        page: 1,
        limit: 2,
        total_feeds: 0,
    })]);
    let mut engine = engine_with(gateway, LoadStrategy::AllLatest, 2);
    let page = expect_loaded(engine.load_first().await);
    assert_eq!(page.state, LoadState::LoadedComplete);
}

// ---------------------------------------------------------------------------
// Fan-out strategy
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_fanout_slices_sorted_roll_without_refetch() {
    let ids = ["f1", "f2", "f3", "f4", "f5", "f6", "f7"];
    let posts = ids
        .iter()
        .enumerate()
        .map(|(i, id)| (*id, PostScript::Latest(post(id, 1_000 + i as i64))))
        .collect();
    let gateway = fanout_gateway(&ids, posts);
    let mut engine = engine_with(gateway, LoadStrategy::FanOut, 3);

    let first = expect_loaded(engine.load_first().await);
    assert_eq!(titles(&first.appended), ["f7", "f6", "f5"]);
    assert_eq!(first.state, LoadState::LoadedWithMore);

    let second = expect_loaded(engine.load_more().await);
    assert_eq!(titles(&second.appended), ["f4", "f3", "f2"]);

    let third = expect_loaded(engine.load_more().await);
    assert_eq!(titles(&third.appended), ["f1"]);
    assert_eq!(third.state, LoadState::LoadedComplete);

    // Later pages come from memory, not another fan-out.
    assert_eq!(*engine.gateway().subscription_calls.lock().unwrap(), 1);
}

#[tokio::test]
async fn test_fanout_tolerates_partial_failures() {
    let gateway = fanout_gateway(
        &["f1", "f2", "f3", "f4", "f5"],
        vec![
            ("f1", PostScript::Latest(post("f1", 300))),
            ("f2", PostScript::Down("503 Service Unavailable".to_string())),
            ("f3", PostScript::Latest(post("f3", 100))),
            ("f4", PostScript::Empty),
            ("f5", PostScript::Latest(post("f5", 200))),
        ],
    );
    let mut engine = engine_with(gateway, LoadStrategy::FanOut, 10);
    let page = expect_loaded(engine.load_first().await);

    assert_eq!(titles(&page.appended), ["f1", "f5", "f3"]);
    assert_eq!(page.state, LoadState::LoadedComplete);
    assert_eq!(page.failures.len(), 2);

    let errors: Vec<&str> = page.failures.iter().map(|f| f.error.as_str()).collect();
    assert!(errors.contains(&"No posts found"));
    assert!(errors.iter().any(|e| e.contains("503")));
}

#[tokio::test]
async fn test_fanout_drops_undated_posts_from_roll() {
    let gateway = fanout_gateway(
        &["dated", "undated"],
        vec![
            ("dated", PostScript::Latest(post("dated", 100))),
            ("undated", PostScript::Latest(post("undated", 0))),
        ],
    );
    let mut engine = engine_with(gateway, LoadStrategy::FanOut, 10);
    let page = expect_loaded(engine.load_first().await);
    assert_eq!(titles(&page.appended), ["dated"]);
}

#[tokio::test]
async fn test_fanout_with_nothing_to_show_is_empty_roll() {
    let gateway = fanout_gateway(
        &["f1", "f2"],
        vec![
            ("f1", PostScript::Empty),
            ("f2", PostScript::Down("500 Internal Server Error".to_string())),
        ],
    );
    let mut engine = engine_with(gateway, LoadStrategy::FanOut, 10);
    let page = expect_loaded(engine.load_first().await);
    assert_eq!(page.state, LoadState::LoadedEmpty);
    assert_eq!(page.failures.len(), 2);
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_loads_are_ignored_while_one_is_in_flight() {
    let gateway = digest_gateway(vec![Ok(digest_page(&[("a", 100)], 1, 5, 1))]);
    let mut engine = engine_with(gateway, LoadStrategy::Digest, 5);

    let ticket = engine.begin_load().unwrap();
    assert_eq!(engine.state(), LoadState::Loading);
    assert!(engine.begin_load().is_none());
    assert!(matches!(engine.load_more().await, LoadReport::Ignored));

    let data = engine.fetch_page(&ticket).await;
    let page = expect_loaded(engine.complete_load(ticket, data));
    assert_eq!(page.state, LoadState::LoadedComplete);
}

#[tokio::test]
async fn test_failed_roll_stays_failed_until_reset() {
    let gateway = digest_gateway(vec![
        Err(BlogrollError::Http("502 Bad Gateway".to_string())),
        Ok(digest_page(&[("a", 100)], 1, 5, 1)),
    ]);
    let mut engine = engine_with(gateway, LoadStrategy::Digest, 5);

    assert!(matches!(engine.load_first().await, LoadReport::Failed));
    assert_eq!(engine.state(), LoadState::LoadFailed);
    assert!(!engine.has_more_feeds());

    // Terminal: neither kind of load gets through.
    assert!(matches!(engine.load_first().await, LoadReport::Ignored));
    assert!(matches!(engine.load_more().await, LoadReport::Ignored));
    assert!(engine.begin_load().is_none());

    engine.reset();
    assert_eq!(engine.state(), LoadState::Initial);
    let page = expect_loaded(engine.load_first().await);
    assert_eq!(titles(&page.appended), ["a"]);
}

#[tokio::test]
async fn test_stale_response_is_discarded_after_reset() {
    let gateway = digest_gateway(vec![
        Ok(digest_page(&[("stale", 100)], 1, 5, 1)),
        Ok(digest_page(&[("fresh", 200)], 1, 5, 1)),
    ]);
    let mut engine = engine_with(gateway, LoadStrategy::Digest, 5);

    let ticket = engine.begin_load().unwrap();
    let data = engine.fetch_page(&ticket).await;
    engine.reset();

    assert!(matches!(
        engine.complete_load(ticket, data),
        LoadReport::Discarded
    ));
    assert_eq!(engine.state(), LoadState::Initial);

    // The next load starts clean and shows only fresh records.
    let page = expect_loaded(engine.load_first().await);
    assert_eq!(titles(&page.appended), ["fresh"]);
}

#[tokio::test]
async fn test_load_more_ignored_once_complete() {
    let gateway = digest_gateway(vec![Ok(digest_page(&[("a", 100)], 1, 5, 1))]);
    let mut engine = engine_with(gateway, LoadStrategy::Digest, 5);
    engine.load_first().await;
    assert_eq!(engine.state(), LoadState::LoadedComplete);
    assert!(matches!(engine.load_more().await, LoadReport::Ignored));
    assert_eq!(engine.current_page(), 1);
}
