//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and run crawl jobs
//! end-to-end against a SQLite store.

use seo_crawler::config::{Config, CrawlerConfig, StoreConfig, UserAgentConfig};
use seo_crawler::state::DoctypeClass;
use seo_crawler::storage::JobRecord;
use seo_crawler::{JobOutcome, JobStatus, LinkKind, Orchestrator, SqliteStore, Store};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const OWNER: i64 = 42;

/// Creates a test configuration with no politeness delay and a short probe timeout
fn create_test_config(db_path: &str) -> Config {
    Config {
        crawler: CrawlerConfig {
            probe_timeout_secs: 1,
            page_timeout_secs: 5,
            max_random_delay_ms: 0,
            lookup_backoff_ms: 10,
            ..CrawlerConfig::default()
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        store: StoreConfig {
            database_path: db_path.to_string(),
        },
    }
}

struct Harness {
    _dir: TempDir,
    store: Arc<dyn Store>,
    orchestrator: Orchestrator,
}

impl Harness {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let db_path = dir.path().join("crawl.db");
        let config = create_test_config(db_path.to_str().expect("Non UTF-8 temp path"));

        let store: Arc<dyn Store> =
            Arc::new(SqliteStore::new(&db_path).expect("Failed to open store"));
        let orchestrator =
            Orchestrator::from_config(&config, Arc::clone(&store)).expect("Failed to build orchestrator");

        Self {
            _dir: dir,
            store,
            orchestrator,
        }
    }

    async fn crawl(&self, url: &str) -> (JobOutcome, JobRecord) {
        self.store
            .create_job(OWNER, url)
            .await
            .expect("Failed to create job");
        let outcome = self
            .orchestrator
            .submit(OWNER, url)
            .wait()
            .await
            .expect("Job task panicked");
        let job_id = self
            .store
            .find_job_id(OWNER, url)
            .await
            .expect("Job row missing");
        let job = self.store.get_job(job_id).await.expect("Job row missing");
        (outcome, job)
    }
}

async fn mount_page(server: &MockServer, page_path: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

async fn mount_head(server: &MockServer, link_path: &str, response: ResponseTemplate) {
    Mock::given(method("HEAD"))
        .and(path(link_path))
        .respond_with(response)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_crawl_example_page() {
    let site = MockServer::start().await;
    let external = MockServer::start().await;

    // Same address, different host name: classified as external
    let external_url = format!("http://localhost:{}/", external.address().port());

    mount_page(
        &site,
        "/",
        format!(
            r#"<!DOCTYPE html>
            <html><head><title>Example</title></head>
            <body>
                <h1>Welcome</h1>
                <a href="/about">About</a>
                <a href="{}">Elsewhere</a>
            </body></html>"#,
            external_url
        ),
    )
    .await;
    mount_head(&site, "/about", ResponseTemplate::new(200)).await;
    mount_head(&external, "/", ResponseTemplate::new(200)).await;

    let harness = Harness::new();
    let (outcome, job) = harness.crawl(&format!("{}/", site.uri())).await;

    assert_eq!(outcome.status, JobStatus::Done, "error: {:?}", outcome.error);
    assert_eq!(job.status, JobStatus::Done);

    let summary = &job.summary;
    assert_eq!(summary.doctype, Some(DoctypeClass::Modern));
    assert_eq!(summary.title.as_deref(), Some("Example"));
    assert_eq!(summary.headings.get("h1"), Some(&1));
    assert_eq!(summary.internal_links, 1);
    assert_eq!(summary.external_links, 1);
    assert_eq!(summary.inaccessible_links, 0);
    assert!(!summary.has_login_form);

    let links = harness.store.links_for_job(job.id).await.unwrap();
    assert_eq!(links.len(), 2);
    assert_eq!(links[0].url, format!("{}/about", site.uri()));
    assert_eq!(links[0].kind, LinkKind::Internal);
    assert_eq!(links[0].text, "About");
    assert_eq!(links[1].url, external_url);
    assert_eq!(links[1].kind, LinkKind::External);
    assert!(links.iter().all(|l| l.status_code == 200 && l.reachable));

    let headings = harness.store.headings_for_job(job.id).await.unwrap();
    assert_eq!(headings.len(), 1);
    assert_eq!(headings[0].text, "Welcome");
    assert_eq!(headings[0].order, 1);
}

#[tokio::test]
async fn test_page_fetch_failure_marks_error() {
    let site = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&site)
        .await;

    let harness = Harness::new();
    let (outcome, job) = harness.crawl(&format!("{}/", site.uri())).await;

    assert_eq!(outcome.status, JobStatus::Error);
    assert_eq!(job.status, JobStatus::Error);
    assert_eq!(job.summary.title, None);
    assert!(harness.store.links_for_job(job.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_page_marks_error() {
    // No mocks mounted: wiremock answers 404
    let site = MockServer::start().await;

    let harness = Harness::new();
    let (outcome, job) = harness.crawl(&format!("{}/nothing", site.uri())).await;

    assert_eq!(outcome.status, JobStatus::Error);
    assert_eq!(job.status, JobStatus::Error);
    assert!(outcome.error.unwrap().contains("404"));
}

#[tokio::test]
async fn test_slow_link_times_out() {
    let site = MockServer::start().await;
    mount_page(
        &site,
        "/",
        r#"<!DOCTYPE html><a href="/slow">Slow</a><a href="/fast">Fast</a>"#.to_string(),
    )
    .await;
    mount_head(
        &site,
        "/slow",
        ResponseTemplate::new(200).set_delay(Duration::from_secs(3)),
    )
    .await;
    mount_head(&site, "/fast", ResponseTemplate::new(204)).await;

    let harness = Harness::new();
    let (outcome, job) = harness.crawl(&format!("{}/", site.uri())).await;

    assert_eq!(outcome.status, JobStatus::Done);
    assert_eq!(job.summary.inaccessible_links, 1);

    let links = harness.store.links_for_job(job.id).await.unwrap();
    let slow = links.iter().find(|l| l.url.ends_with("/slow")).unwrap();
    assert_eq!(slow.status_code, 0);
    assert!(!slow.reachable);

    let fast = links.iter().find(|l| l.url.ends_with("/fast")).unwrap();
    assert_eq!(fast.status_code, 204);
    assert!(fast.reachable);
}

#[tokio::test]
async fn test_broken_link_and_login_form() {
    let site = MockServer::start().await;
    mount_page(
        &site,
        "/",
        r##"<!DOCTYPE HTML PUBLIC "-//W3C//DTD HTML 4.01//EN">
        <html><head><title>Sign in</title></head><body>
            <form action="/search"><input type="text" name="q"></form>
            <form action="/session"><input type=password name="pw"></form>
            <a href="/gone">Old page</a>
            <a href="mailto:team@example.com">Mail us</a>
            <a href="#top">Top</a>
        </body></html>"##
            .to_string(),
    )
    .await;
    mount_head(&site, "/gone", ResponseTemplate::new(404)).await;

    let harness = Harness::new();
    let (outcome, job) = harness.crawl(&format!("{}/", site.uri())).await;

    assert_eq!(outcome.status, JobStatus::Done);
    assert_eq!(job.summary.doctype, Some(DoctypeClass::Legacy));
    assert!(job.summary.has_login_form);
    assert_eq!(job.summary.internal_links, 1);
    assert_eq!(job.summary.external_links, 0);
    assert_eq!(job.summary.inaccessible_links, 1);

    let links = harness.store.links_for_job(job.id).await.unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].status_code, 404);
    assert!(!links[0].reachable);
}

#[tokio::test]
async fn test_user_agent_is_sent() {
    let site = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .and(header(
            "user-agent",
            "TestBot/1.0.0 (+https://example.com/contact; test@example.com)",
        ))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<title>UA</title>")
                .insert_header("content-type", "text/html"),
        )
        .mount(&site)
        .await;

    let harness = Harness::new();
    let (outcome, job) = harness.crawl(&format!("{}/", site.uri())).await;

    assert_eq!(outcome.status, JobStatus::Done);
    assert_eq!(job.summary.title.as_deref(), Some("UA"));
}

#[tokio::test]
async fn test_redirect_sets_document_base() {
    let site = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/dir/new"))
        .mount(&site)
        .await;
    mount_page(&site, "/dir/new", r#"<a href="child">Child</a>"#.to_string()).await;
    mount_head(&site, "/dir/child", ResponseTemplate::new(200)).await;

    let harness = Harness::new();
    let (outcome, job) = harness.crawl(&format!("{}/old", site.uri())).await;

    assert_eq!(outcome.status, JobStatus::Done);

    let links = harness.store.links_for_job(job.id).await.unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].url, format!("{}/dir/child", site.uri()));
    assert!(links[0].reachable);
}

#[tokio::test]
async fn test_rerun_replaces_previous_results() {
    let site = MockServer::start().await;
    mount_page(
        &site,
        "/",
        r#"<h1>One</h1><h2>Two</h2><a href="/a">A</a>"#.to_string(),
    )
    .await;
    mount_head(&site, "/a", ResponseTemplate::new(200)).await;

    let harness = Harness::new();
    let url = format!("{}/", site.uri());
    let (_, first) = harness.crawl(&url).await;

    let handles = harness
        .orchestrator
        .rerun(OWNER, &[url.clone()])
        .await
        .unwrap();
    for handle in handles {
        assert_eq!(handle.wait().await.unwrap().status, JobStatus::Done);
    }

    let job_id = harness.store.find_job_id(OWNER, &url).await.unwrap();
    assert_eq!(job_id, first.id);

    let headings = harness.store.headings_for_job(job_id).await.unwrap();
    let orders: Vec<u32> = headings.iter().map(|h| h.order).collect();
    assert_eq!(orders, vec![1, 2]);
    assert_eq!(harness.store.links_for_job(job_id).await.unwrap().len(), 1);
}
