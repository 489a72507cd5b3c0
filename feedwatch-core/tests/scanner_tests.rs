use feedwatch_core::{
    shared_config, AppConfig, FeedConfig, HistoryLog, PostLedger, Scanner, StatusBoard,
};
use reqwest::Client;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn rss(items: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Test Feed</title>
    <link>http://example.com/</link>
    <description>Test description</description>
    {items}
  </channel>
</rss>"#
    )
}

fn item(guid: Option<&str>, title: &str, description: &str) -> String {
    let guid = guid
        .map(|g| format!("<guid>{g}</guid>"))
        .unwrap_or_default();
    format!(
        "<item><title>{title}</title><link>http://example.com/{title}</link>{guid}<description>{description}</description></item>"
    )
}

async fn mount_feed(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/rss+xml")
                .set_body_string(body),
        )
        .mount(server)
        .await;
}

async fn mount_gateway(server: &MockServer, route: &str, status: u16) {
    Mock::given(method("POST"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

async fn posts_to(server: &MockServer, route: &str) -> Vec<wiremock::Request> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|request| request.url.path() == route && request.method.as_str() == "POST")
        .collect()
}

fn feed(server: &MockServer, route: &str, keywords: &[&str]) -> FeedConfig {
    FeedConfig::new(
        format!("{}{route}", server.uri()),
        keywords.iter().map(|k| k.to_string()).collect(),
    )
}

fn scanner(server: &MockServer, feeds: Vec<FeedConfig>) -> Scanner {
    let status = StatusBoard::with_feeds(feeds.iter().map(|feed| feed.url.as_str()));
    let config = AppConfig {
        feeds,
        ntfy_topic: "alerts".into(),
        ntfy_server_address: server.uri(),
        check_interval_minutes: 15,
    };
    Scanner::new(
        shared_config(config),
        Client::new(),
        PostLedger::in_memory(),
        HistoryLog::new(),
        status,
    )
}

#[tokio::test]
async fn matched_post_is_notified_once_across_scans() {
    let server = MockServer::start().await;
    mount_feed(
        &server,
        "/feed",
        rss(&item(Some("1"), "Rocket launch today", "Liftoff at noon")),
    )
    .await;
    mount_gateway(&server, "/alerts", 200).await;

    let feed = feed(&server, "/feed", &["launch"]);
    let scanner = scanner(&server, vec![feed.clone()]);

    scanner.scan_one(&feed).await;
    assert_eq!(posts_to(&server, "/alerts").await.len(), 1);
    assert_eq!(scanner.history().len().await, 1);
    let first = scanner.ledger().entries().await;
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].guid, "1");
    assert!(first[0].entry.notification_sent);
    assert_eq!(first[0].entry.matched_keywords, vec!["launch".to_string()]);

    scanner.scan_one(&feed).await;
    assert_eq!(posts_to(&server, "/alerts").await.len(), 1);
    assert_eq!(scanner.history().len().await, 1);
    assert_eq!(scanner.ledger().entries().await, first);
}

#[tokio::test]
async fn notification_carries_rendered_headers_and_body() {
    let server = MockServer::start().await;
    mount_feed(
        &server,
        "/feed",
        rss(&item(Some("a"), "Launch window", "Details inside")),
    )
    .await;
    mount_gateway(&server, "/alerts", 200).await;

    let feed = feed(&server, "/feed", &["launch", "window", "missing"]);
    let scanner = scanner(&server, vec![feed.clone()]);
    scanner.scan_one(&feed).await;

    let posts = posts_to(&server, "/alerts").await;
    assert_eq!(posts.len(), 1);
    let request = &posts[0];
    let header = |name: &str| {
        request
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(ToOwned::to_owned)
    };
    assert_eq!(header("Title").as_deref(), Some("Launch window"));
    assert_eq!(header("Priority").as_deref(), Some("default"));
    assert_eq!(header("Tags").as_deref(), Some("launch,window"));
    assert_eq!(
        header("Actions").as_deref(),
        Some("view, Open, http://example.com/Launch window")
    );
    assert_eq!(
        String::from_utf8_lossy(&request.body),
        "Details inside\n\nLink: http://example.com/Launch window"
    );
}

#[tokio::test]
async fn broken_feed_does_not_block_siblings() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_feed(
        &server,
        "/good",
        rss(&item(Some("g1"), "Launch confirmed", "All systems go")),
    )
    .await;
    mount_gateway(&server, "/alerts", 200).await;

    let broken = feed(&server, "/broken", &["launch"]);
    let good = feed(&server, "/good", &["launch"]);
    let scanner = scanner(&server, vec![broken.clone(), good.clone()]);

    scanner.scan_all().await;

    let status = scanner.status().snapshot().await;
    let broken_status = &status[&broken.url];
    assert!(broken_status.error.as_deref().is_some_and(|e| !e.is_empty()));
    assert!(!broken_status.is_checking);
    let good_status = &status[&good.url];
    assert!(good_status.error.is_none());
    assert!(!good_status.is_checking);
    assert!(good_status.has_been_checked());

    let history = scanner.history().snapshot().await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].feed_url, good.url);
    assert!(history[0].notification_sent);
}

#[tokio::test]
async fn unparseable_feed_reports_error_in_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/garbage"))
        .respond_with(ResponseTemplate::new(200).set_body_string("this is not a feed"))
        .mount(&server)
        .await;

    let garbage = feed(&server, "/garbage", &["launch"]);
    let scanner = scanner(&server, vec![garbage.clone()]);
    scanner.scan_one(&garbage).await;

    let status = scanner.status().get(&garbage.url).await.expect("status");
    assert!(status.error.is_some());
    assert!(scanner.ledger().is_empty().await);
}

#[tokio::test]
async fn unmatched_posts_are_recorded_without_notification() {
    let server = MockServer::start().await;
    mount_feed(
        &server,
        "/feed",
        rss(&[
            item(Some("m"), "Launch", "match"),
            item(Some("u"), "Gardening tips", "nothing here"),
        ]
        .concat()),
    )
    .await;
    mount_gateway(&server, "/alerts", 200).await;

    let feed = feed(&server, "/feed", &["launch"]);
    let scanner = scanner(&server, vec![feed.clone()]);
    scanner.scan_one(&feed).await;

    let entries = scanner.ledger().entries().await;
    assert_eq!(entries.len(), 2);
    let unmatched = entries.iter().find(|r| r.guid == "u").expect("u recorded");
    assert!(!unmatched.entry.notification_sent);
    assert!(unmatched.entry.matched_keywords.is_empty());
    assert_eq!(posts_to(&server, "/alerts").await.len(), 1);
}

#[tokio::test]
async fn posts_without_guid_are_evaluated_every_scan() {
    let server = MockServer::start().await;
    mount_feed(&server, "/feed", rss(&item(None, "Launch", "no guid"))).await;
    mount_gateway(&server, "/alerts", 200).await;

    let feed = feed(&server, "/feed", &["launch"]);
    let scanner = scanner(&server, vec![feed.clone()]);
    scanner.scan_one(&feed).await;
    scanner.scan_one(&feed).await;

    assert_eq!(posts_to(&server, "/alerts").await.len(), 2);
    assert_eq!(scanner.history().len().await, 2);
    assert!(scanner.ledger().is_empty().await);
}

#[tokio::test]
async fn feed_without_keywords_never_notifies() {
    let server = MockServer::start().await;
    mount_feed(&server, "/feed", rss(&item(Some("1"), "Launch", "body"))).await;
    mount_gateway(&server, "/alerts", 200).await;

    let feed = feed(&server, "/feed", &[]);
    let scanner = scanner(&server, vec![feed.clone()]);
    scanner.scan_one(&feed).await;

    assert!(posts_to(&server, "/alerts").await.is_empty());
    assert!(scanner.history().is_empty().await);
    let entries = scanner.ledger().entries().await;
    assert_eq!(entries.len(), 1);
    assert!(!entries[0].entry.notification_sent);
}

#[tokio::test]
async fn gateway_failure_still_records_history_and_ledger() {
    let server = MockServer::start().await;
    mount_feed(&server, "/feed", rss(&item(Some("x"), "Launch", "body"))).await;
    mount_gateway(&server, "/alerts", 503).await;

    let feed = feed(&server, "/feed", &["launch"]);
    let scanner = scanner(&server, vec![feed.clone()]);
    scanner.scan_one(&feed).await;

    assert_eq!(posts_to(&server, "/alerts").await.len(), 1);
    assert_eq!(scanner.history().len().await, 1);
    assert!(scanner.ledger().is_checked("x").await);
    let status = scanner.status().get(&feed.url).await.expect("status");
    assert!(status.error.is_none());
}

#[tokio::test]
async fn per_feed_topic_overrides_default() {
    let server = MockServer::start().await;
    mount_feed(&server, "/feed", rss(&item(Some("t"), "Launch", "body"))).await;
    mount_gateway(&server, "/rockets", 200).await;

    let mut feed = feed(&server, "/feed", &["launch"]);
    feed.notification_settings.ntfy_topic = Some("rockets".into());
    let scanner = scanner(&server, vec![feed.clone()]);
    scanner.scan_one(&feed).await;

    assert_eq!(posts_to(&server, "/rockets").await.len(), 1);
    assert!(posts_to(&server, "/alerts").await.is_empty());
}

#[tokio::test]
async fn repeated_guid_in_one_payload_is_evaluated_once() {
    let server = MockServer::start().await;
    mount_feed(
        &server,
        "/feed",
        rss(&[
            item(Some("dup"), "Launch one", "first"),
            item(Some("dup"), "Launch two", "second"),
        ]
        .concat()),
    )
    .await;
    mount_gateway(&server, "/alerts", 200).await;

    let feed = feed(&server, "/feed", &["launch"]);
    let scanner = scanner(&server, vec![feed.clone()]);
    scanner.scan_one(&feed).await;

    assert_eq!(posts_to(&server, "/alerts").await.len(), 1);
    let entries = scanner.ledger().entries().await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].entry.title, "Launch one");
}

#[tokio::test]
async fn scan_does_not_restore_status_of_untracked_feed() {
    let server = MockServer::start().await;
    mount_feed(&server, "/feed", rss(&item(Some("r"), "Launch", "body"))).await;
    mount_gateway(&server, "/alerts", 200).await;

    let removed = feed(&server, "/feed", &["launch"]);
    let scanner = scanner(&server, vec![removed.clone()]);
    scanner.status().reconcile(std::iter::empty::<&str>()).await;

    scanner.scan_one(&removed).await;

    assert!(scanner.status().get(&removed.url).await.is_none());
    assert!(scanner.status().snapshot().await.is_empty());
    assert!(scanner.ledger().is_checked("r").await);
}
