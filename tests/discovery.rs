//! Integration tests for feed discovery through the public API.
//!
//! Each test runs its own mock server that plays both the search engine
//! and the sites behind the result links.

use std::time::Duration;

use feedscout::discovery::{
    DiscoveryError, Discoverer, DiscoverySettings, FetchError, DEFAULT_USER_AGENT,
};
use wiremock::matchers::{header, header_regex, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn rss(title: &str) -> String {
    format!(
        r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <title>{title}</title>
    <link>https://example.com/</link>
    <item><guid>a1</guid><title>First</title></item>
    <item><guid>a2</guid><title>Second</title></item>
</channel></rss>"#
    )
}

fn settings(server: &MockServer) -> DiscoverySettings {
    DiscoverySettings {
        search_endpoint: format!("{}/html/", server.uri()),
        block_private_addresses: false,
        request_timeout: Duration::from_secs(10),
        ..DiscoverySettings::default()
    }
}

fn result_page(links: &[String]) -> String {
    let results: String = links
        .iter()
        .map(|link| {
            format!(
                r#"<div class="result"><a class="result__url" href="{link}">{link}</a></div>"#
            )
        })
        .collect();
    format!("<html><body>{results}</body></html>")
}

async fn mount_search(server: &MockServer, links: &[String]) {
    Mock::given(method("GET"))
        .and(path("/html/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(result_page(links)))
        .mount(server)
        .await;
}

async fn mount_body(server: &MockServer, p: &str, status: u16, body: String) {
    Mock::given(method("GET"))
        .and(path(p))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(server)
        .await;
}

// ============================================================================
// Search path
// ============================================================================

#[tokio::test]
async fn test_search_merges_feeds_from_result_pages() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/html/"))
        .and(query_param("q", "rust blogs"))
        .respond_with(ResponseTemplate::new(200).set_body_string(result_page(&[
            format!("{base}/alpha/"),
            format!("{base}/beta.xml"),
        ])))
        .expect(1)
        .mount(&server)
        .await;
    mount_body(
        &server,
        "/alpha/",
        200,
        r#"<html><head><link rel="alternate" type="application/rss+xml" href="/alpha/feed.xml"></head></html>"#
            .to_owned(),
    )
    .await;
    mount_body(&server, "/alpha/feed.xml", 200, rss("Alpha")).await;
    mount_body(&server, "/beta.xml", 200, rss("Beta")).await;

    let discoverer = Discoverer::new(settings(&server)).unwrap();
    let feeds = discoverer.search("rust blogs").await.unwrap();

    assert_eq!(feeds.len(), 2);
    assert_eq!(feeds[&format!("{base}/alpha/feed.xml")].title, "Alpha");
    assert_eq!(feeds[&format!("{base}/beta.xml")].title, "Beta");
    assert_eq!(feeds[&format!("{base}/beta.xml")].articles.len(), 2);
}

#[tokio::test]
async fn test_search_request_sends_browser_user_agent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/html/"))
        .and(header_regex("user-agent", r"^Mozilla/5\.0 "))
        .and(header("user-agent", DEFAULT_USER_AGENT))
        .respond_with(ResponseTemplate::new(200).set_body_string(result_page(&[])))
        .expect(1)
        .mount(&server)
        .await;

    let discoverer = Discoverer::new(settings(&server)).unwrap();
    let feeds = discoverer.search("browser only").await.unwrap();
    assert!(feeds.is_empty());
}

#[tokio::test]
async fn test_search_fetches_at_most_forty_candidates() {
    let server = MockServer::start().await;
    let links: Vec<String> = (0..60)
        .map(|i| format!("{}/site{i}/feed.xml", server.uri()))
        .collect();
    mount_search(&server, &links).await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/site\d+/feed\.xml$"))
        .respond_with(ResponseTemplate::new(200).set_body_string(rss("Site")))
        .expect(40)
        .mount(&server)
        .await;

    let discoverer = Discoverer::new(settings(&server)).unwrap();
    let feeds = discoverer.search("many results").await.unwrap();

    assert_eq!(feeds.len(), 40);
    assert!(feeds.contains_key(&format!("{}/site39/feed.xml", server.uri())));
    assert!(!feeds.contains_key(&format!("{}/site40/feed.xml", server.uri())));
}

#[tokio::test]
async fn test_search_partial_success_drops_errors() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_search(
        &server,
        &[
            format!("{base}/broken"),
            format!("{base}/good.xml"),
            format!("{base}/missing"),
        ],
    )
    .await;
    mount_body(&server, "/broken", 500, String::new()).await;
    mount_body(&server, "/good.xml", 200, rss("Good")).await;
    mount_body(&server, "/missing", 404, String::new()).await;

    let discoverer = Discoverer::new(settings(&server)).unwrap();
    let feeds = discoverer.search("some phrase").await.unwrap();

    assert_eq!(feeds.len(), 1);
    assert!(feeds.contains_key(&format!("{base}/good.xml")));
}

#[tokio::test]
async fn test_search_all_candidates_failing_is_an_error() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_search(&server, &[format!("{base}/one"), format!("{base}/two")]).await;
    mount_body(&server, "/one", 500, String::new()).await;
    mount_body(&server, "/two", 500, String::new()).await;

    let discoverer = Discoverer::new(settings(&server)).unwrap();
    let result = discoverer.search("doomed phrase").await;

    assert!(matches!(
        result,
        Err(DiscoveryError::Fetch(FetchError::Status { status: 500, .. }))
    ));
}

#[tokio::test]
async fn test_search_without_results_is_empty() {
    let server = MockServer::start().await;
    mount_search(&server, &[]).await;

    let discoverer = Discoverer::new(settings(&server)).unwrap();
    let feeds = discoverer.search("nothing matches").await.unwrap();
    assert!(feeds.is_empty());
}

#[tokio::test]
async fn test_search_endpoint_failure_is_reported() {
    let server = MockServer::start().await;
    mount_body(&server, "/html/", 503, String::new()).await;

    let discoverer = Discoverer::new(settings(&server)).unwrap();
    let err = discoverer.search("anything at all").await.unwrap_err();

    assert!(matches!(err, DiscoveryError::SearchFailed(_)));
    assert!(err.to_string().starts_with("executing feed search request"));
}

#[tokio::test]
async fn test_slow_candidate_skipped_at_deadline() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_search(&server, &[format!("{base}/slow.xml"), format!("{base}/fast.xml")]).await;
    Mock::given(method("GET"))
        .and(path("/slow.xml"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(rss("Slow"))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;
    mount_body(&server, "/fast.xml", 200, rss("Fast")).await;

    let discoverer = Discoverer::new(DiscoverySettings {
        pool_timeout: Duration::from_millis(500),
        ..settings(&server)
    })
    .unwrap();

    let started = std::time::Instant::now();
    let feeds = discoverer.search("slow and fast").await.unwrap();

    assert_eq!(feeds.len(), 1);
    assert!(feeds.contains_key(&format!("{base}/fast.xml")));
    assert!(started.elapsed() < Duration::from_secs(4));
}

// ============================================================================
// Direct path
// ============================================================================

#[tokio::test]
async fn test_url_query_discovers_linked_feed() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_body(
        &server,
        "/",
        200,
        format!(r#"<link rel="alternate" type="application/rss+xml" href="{base}/rss">"#),
    )
    .await;
    mount_body(&server, "/rss", 200, rss("Home")).await;

    let discoverer = Discoverer::new(settings(&server)).unwrap();
    let feeds = discoverer.search(&base).await.unwrap();

    assert_eq!(feeds.len(), 1);
    assert_eq!(feeds[&format!("{base}/rss")].title, "Home");
}

#[tokio::test]
async fn test_results_serialize_to_json() {
    let server = MockServer::start().await;
    mount_body(&server, "/feed.xml", 200, rss("Json")).await;

    let discoverer = Discoverer::new(settings(&server)).unwrap();
    let url = format!("{}/feed.xml", server.uri());
    let feeds = discoverer.search(&url).await.unwrap();

    let json = serde_json::to_value(&feeds).unwrap();
    assert_eq!(json[&url]["title"], "Json");
    assert_eq!(json[&url]["format"], "rss2");
    assert_eq!(json[&url]["articles"][0]["guid"], "a1");
}
