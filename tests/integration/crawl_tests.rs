//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and run the
//! orchestrator end-to-end against a temp-file frontier database.

use tempfile::TempDir;
use tokio::sync::mpsc;
use webspider::config::{parse_config, Config};
use webspider::crawler::{CrawlSummary, Orchestrator};
use webspider::state::UrlState;
use webspider::storage::{Frontier, FrontierOptions, RunStatus, SqliteFrontier};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration crawling `seeds` with a database in `dir`
fn create_test_config(dir: &TempDir, seeds: &[String], max_depth: u32, fetch: &str) -> Config {
    let seeds = seeds
        .iter()
        .map(|s| format!("\"{}\"", s))
        .collect::<Vec<_>>()
        .join(", ");
    let db_path = dir.path().join("frontier.db");

    parse_config(&format!(
        r#"
seeds = [{seeds}]

[crawler]
max-depth = {max_depth}
workers = 2
idle-poll-ms = 10

[user-agent]
crawler-name = "TestBot"
crawler-version = "1.0.0"
contact-url = "https://example.com/contact"
contact-email = "test@example.com"

[storage]
database-path = "{}"

[fetch]
timeout-secs = 5
{fetch}
"#,
        db_path.display()
    ))
    .expect("test config should be valid")
}

fn html(body: impl Into<String>) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.into(), "text/html")
}

async fn mount_page(server: &MockServer, route: &str, response: ResponseTemplate, expected: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(response)
        .expect(expected)
        .mount(server)
        .await;
}

/// Seeds the frontier from config and runs to completion
async fn crawl(config: Config) -> CrawlSummary {
    let seeds = config.seeds.clone();
    let orchestrator = Orchestrator::from_config(config).expect("Failed to build orchestrator");
    orchestrator.seed(&seeds).await.expect("Failed to seed");

    let (_tx, rx) = mpsc::channel(1);
    orchestrator
        .run_with_signals(rx)
        .await
        .expect("Crawl should succeed")
}

fn open(config: &Config) -> SqliteFrontier {
    FrontierOptions::from_config(config)
        .open_blocking()
        .expect("Failed to open frontier")
}

/// Mounts a five-page site: two successes, a nested page, a 404 and a JSON feed
async fn mount_site(server: &MockServer) {
    let base = server.uri();

    mount_page(
        server,
        "/",
        html(format!(
            r#"<html><head><title>Home</title></head><body>
            <a href="{base}/page1">Page 1</a>
            <a href="/page2#top">Page 2</a>
            <a href="/missing">Missing</a>
            <a href="/report.pdf">Report</a>
            <a href="mailto:someone@example.com">Mail</a>
            </body></html>"#
        )),
        1,
    )
    .await;

    mount_page(
        server,
        "/page1",
        html(
            r#"<html><head><title>Page 1</title></head><body>
            <a href="/page3">Deeper</a>
            <a href="/">Home</a>
            </body></html>"#,
        ),
        1,
    )
    .await;

    mount_page(
        server,
        "/page2",
        html("<html><head><title>Page 2</title></head><body><p>No links here</p></body></html>"),
        1,
    )
    .await;
}

#[tokio::test]
async fn test_full_crawl_single_domain() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_site(&server).await;
    mount_page(
        &server,
        "/page3",
        html("<html><head><title>Page 3</title></head><body><p>Leaf page</p></body></html>"),
        1,
    )
    .await;
    mount_page(&server, "/missing", ResponseTemplate::new(404), 1).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, &[format!("{}/", base)], 3, "");
    let summary = crawl(config.clone()).await;

    assert_eq!(summary.status, RunStatus::Completed);
    assert_eq!(summary.stats.total, 5);
    assert_eq!(summary.stats.success, 4);
    assert_eq!(summary.stats.failed, 1);
    assert!(summary.stats.is_drained());

    let frontier = open(&config);

    let home = frontier.get(&format!("{}/", base)).unwrap().unwrap();
    assert_eq!(home.state, UrlState::Success);
    assert_eq!(home.title.as_deref(), Some("Home"));
    assert_eq!(home.depth, 0);
    assert!(home.source_url.is_none());

    // Fragment stripped before insertion
    let page2 = frontier.get(&format!("{}/page2", base)).unwrap().unwrap();
    assert_eq!(page2.depth, 1);
    assert_eq!(page2.source_url.as_deref(), Some(home.url.as_str()));

    let page3 = frontier.get(&format!("{}/page3", base)).unwrap().unwrap();
    assert_eq!(page3.depth, 2);

    let missing = frontier.get(&format!("{}/missing", base)).unwrap().unwrap();
    assert_eq!(missing.state, UrlState::Failed);
    assert_eq!(missing.error.as_deref(), Some("HTTP 404"));

    // Denied extension never entered the frontier
    assert!(frontier.get(&format!("{}/report.pdf", base)).unwrap().is_none());

    let run = frontier.get_latest_run().unwrap().unwrap();
    assert_eq!(run.id, summary.run_id);
    assert_eq!(run.status, RunStatus::Completed);
}

#[tokio::test]
async fn test_crawl_with_depth_limit() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_site(&server).await;
    mount_page(&server, "/page3", html("never fetched"), 0).await;
    mount_page(&server, "/missing", ResponseTemplate::new(404), 1).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, &[format!("{}/", base)], 1, "");
    let summary = crawl(config.clone()).await;

    assert_eq!(summary.stats.total, 4);
    assert!(summary.stats.is_drained());

    let frontier = open(&config);
    assert!(frontier.get(&format!("{}/page3", base)).unwrap().is_none());
    for state in UrlState::all_states() {
        for record in frontier.list_by_state(state, 100).unwrap() {
            assert!(record.depth <= 1, "{} at depth {}", record.url, record.depth);
        }
    }
}

#[tokio::test]
async fn test_content_type_handling() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/",
        html(r#"<html><body><a href="/feed">Feed</a><a href="/blank">Blank</a></body></html>"#),
        1,
    )
    .await;
    mount_page(
        &server,
        "/feed",
        ResponseTemplate::new(200).set_body_raw(r#"{"items": [1, 2, 3]}"#, "application/json"),
        1,
    )
    .await;
    mount_page(&server, "/blank", html("<p> </p>"), 1).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, &[format!("{}/", base)], 2, "");
    let summary = crawl(config.clone()).await;

    assert_eq!(summary.stats.success, 1);
    assert_eq!(summary.stats.failed, 2);

    let frontier = open(&config);
    let feed = frontier.get(&format!("{}/feed", base)).unwrap().unwrap();
    assert_eq!(feed.state, UrlState::Failed);
    assert!(feed
        .error
        .as_deref()
        .unwrap()
        .starts_with("Expected HTML, got application/json"));

    let blank = frontier.get(&format!("{}/blank", base)).unwrap().unwrap();
    assert_eq!(blank.error.as_deref(), Some("Empty response body"));
}

#[tokio::test]
async fn test_archive_and_relevance_filter() {
    let server = MockServer::start().await;
    let base = server.uri();

    let home = r#"<html><head><title>Mining news</title></head><body>
        <h1>Geology</h1><a href="/cooking">Recipes</a></body></html>"#;
    mount_page(&server, "/", html(home), 1).await;
    mount_page(
        &server,
        "/cooking",
        html("<html><head><title>Soup</title></head><body><p>Boil water first.</p></body></html>"),
        1,
    )
    .await;

    let dir = TempDir::new().unwrap();
    let archive_dir = dir.path().join("pages");
    let fetch = format!(
        "archive-dir = \"{}\"\ncontent-keywords = [\"mining\", \"geology\"]",
        archive_dir.display()
    );
    let config = create_test_config(&dir, &[format!("{}/", base)], 2, &fetch);
    let summary = crawl(config.clone()).await;

    assert_eq!(summary.stats.success, 1);
    assert_eq!(summary.stats.failed, 1);

    let frontier = open(&config);

    let record = frontier.get(&format!("{}/", base)).unwrap().unwrap();
    let content_ref = record.content_ref.expect("page should be archived");
    assert!(content_ref.starts_with(&archive_dir.display().to_string()));
    assert_eq!(std::fs::read_to_string(&content_ref).unwrap(), home);

    let cooking = frontier.get(&format!("{}/cooking", base)).unwrap().unwrap();
    assert_eq!(cooking.error.as_deref(), Some("content not relevant"));
    assert!(cooking.content_ref.is_none());
}

#[tokio::test]
async fn test_rerun_resumes_and_reset_failed() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_site(&server).await;
    mount_page(
        &server,
        "/page3",
        html("<html><body><p>Leaf page content</p></body></html>"),
        1,
    )
    .await;
    // Fails on the first run, fetched again after the reset
    mount_page(&server, "/missing", ResponseTemplate::new(503), 2).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, &[format!("{}/", base)], 3, "");

    let first = crawl(config.clone()).await;
    assert_eq!(first.stats.failed, 1);

    // Seeds are already known, so nothing is fetched twice
    let second = crawl(config.clone()).await;
    assert_eq!(second.processed, 0);
    assert_eq!(second.stats, first.stats);
    assert!(second.run_id > first.run_id);

    let reset = open(&config).reset_failed(Some("/missing")).unwrap();
    assert_eq!(reset, 1);

    let third = crawl(config.clone()).await;
    assert_eq!(third.processed, 1);
    assert_eq!(third.stats.failed, 1);

    let missing = open(&config)
        .get(&format!("{}/missing", base))
        .unwrap()
        .unwrap();
    assert_eq!(missing.error.as_deref(), Some("HTTP 503"));
}

#[tokio::test]
async fn test_two_orchestrators_share_frontier() {
    let server = MockServer::start().await;
    let base = server.uri();

    let links: String = (0..20)
        .map(|i| format!(r#"<a href="/item/{i}">Item {i}</a>"#))
        .collect();
    mount_page(
        &server,
        "/",
        html(format!("<html><body>{links}</body></html>")),
        1,
    )
    .await;
    for i in 0..20 {
        mount_page(
            &server,
            &format!("/item/{i}"),
            html(format!("<html><body><p>Item number {i}</p></body></html>")),
            1,
        )
        .await;
    }

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, &[format!("{}/", base)], 1, "");

    let seeds = config.seeds.clone();
    let a = Orchestrator::from_config(config.clone()).unwrap();
    let b = Orchestrator::from_config(config.clone()).unwrap();
    a.seed(&seeds).await.unwrap();

    // Let the first orchestrator expand the seed before the second joins
    let (_tx_a, rx_a) = mpsc::channel(1);
    let (_tx_b, rx_b) = mpsc::channel(1);
    let (sa, sb) = tokio::join!(a.run_with_signals(rx_a), async {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        b.run_with_signals(rx_b).await
    });
    let (sa, sb) = (sa.unwrap(), sb.unwrap());

    // Each URL fetched exactly once across both (checked by the mock expectations)
    assert_eq!(sa.processed + sb.processed, 21);

    let stats = open(&config).stats().unwrap();
    assert_eq!(stats.total, 21);
    assert_eq!(stats.success, 21);
    assert!(stats.is_drained());
}
