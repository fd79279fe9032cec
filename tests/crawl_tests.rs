//! End-to-end crawl tests
//!
//! These tests run the full crawl loop against wiremock servers: link
//! discovery, origin scoping, prior-sitemap skipping, and the concurrency
//! bound.

use chrono::Utc;
use sitemapper::crawler::{CrawlPhase, LinkKind};
use sitemapper::sitemap::{ChangeFreq, UrlIndex, DEFAULT_PRIORITY};
use sitemapper::{crawl_domain, CrawlOptions, UrlRecord};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

fn html_page(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(format!("<html><body>{}</body></html>", body))
        .insert_header("content-type", "text/html")
}

async fn mount_page(server: &MockServer, at: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(html_page(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_single_page_site() {
    let server = MockServer::start().await;
    mount_page(&server, "/", "no links here").await;

    let seed = format!("{}/", server.uri());
    let sitemap = crawl_domain(&seed, CrawlOptions::new())
        .await
        .expect("crawl failed");

    assert_eq!(sitemap.len(), 1);
    let record = sitemap.get(&seed).expect("seed missing from output");
    assert_eq!(record.priority, DEFAULT_PRIORITY);
}

#[tokio::test]
async fn test_off_origin_links_filtered() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/",
        &format!(
            r#"<a href="{base}/a">a</a>
               <a href="https://other.invalid/b">b</a>
               <a href="/c">c</a>"#
        ),
    )
    .await;
    mount_page(&server, "/a", "leaf").await;
    mount_page(&server, "/c", "leaf").await;

    let seed = format!("{base}/");
    let sitemap = crawl_domain(&seed, CrawlOptions::new())
        .await
        .expect("crawl failed");

    let mut locs: Vec<String> = sitemap.iter().map(|r| r.loc.clone()).collect();
    locs.sort();
    let mut expected = vec![seed.clone(), format!("{base}/a"), format!("{base}/c")];
    expected.sort();
    assert_eq!(locs, expected);
}

#[tokio::test]
async fn test_cyclic_links_terminate() {
    let server = MockServer::start().await;

    mount_page(&server, "/", r#"<a href="/loop">in</a>"#).await;
    mount_page(&server, "/loop", r#"<a href="/">back</a> <a href="/loop">self</a>"#).await;

    let seed = format!("{}/", server.uri());
    let sitemap = tokio::time::timeout(
        Duration::from_secs(30),
        crawl_domain(&seed, CrawlOptions::new()),
    )
    .await
    .expect("crawl did not terminate")
    .expect("crawl failed");

    assert_eq!(sitemap.len(), 2);
}

#[tokio::test]
async fn test_failed_urls_omitted_from_output() {
    let server = MockServer::start().await;

    mount_page(&server, "/", r#"<a href="/missing">gone</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let seed = format!("{}/", server.uri());
    let sitemap = crawl_domain(&seed, CrawlOptions::new())
        .await
        .expect("crawl failed");

    assert_eq!(sitemap.len(), 1);
    assert!(sitemap.get(&format!("{}/missing", server.uri())).is_none());
}

#[tokio::test]
async fn test_non_html_resource_registered_without_parsing() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, "/", r#"<a href="/data.json">data</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/data.json"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"see": "/not-a-page"}"#)
                .insert_header("content-type", "application/json"),
        )
        .mount(&server)
        .await;

    let seed = format!("{base}/");
    let sitemap = crawl_domain(&seed, CrawlOptions::new())
        .await
        .expect("crawl failed");

    assert_eq!(sitemap.len(), 2);
    assert!(sitemap.get(&format!("{base}/data.json")).is_some());
    assert!(sitemap.get(&format!("{base}/not-a-page")).is_none());
}

#[tokio::test]
async fn test_redirect_final_url_registered_once() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, "/", r#"<a href="/old">moved</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(
            ResponseTemplate::new(301).insert_header("location", format!("{base}/new").as_str()),
        )
        .mount(&server)
        .await;
    // The page at the final location links back to itself
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(html_page(r#"<a href="/new">self</a>"#))
        .expect(1)
        .mount(&server)
        .await;

    let seed = format!("{base}/");
    let sitemap = crawl_domain(&seed, CrawlOptions::new())
        .await
        .expect("crawl failed");

    assert!(sitemap.get(&format!("{base}/new")).is_some());
    assert!(sitemap.get(&format!("{base}/old")).is_none());
}

#[tokio::test]
async fn test_prior_sitemap_skip_carries_record_forward() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, "/", r#"<a href="/stable">stable</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/stable"))
        .respond_with(html_page("should never be fetched"))
        .expect(0)
        .mount(&server)
        .await;

    let stable_loc = format!("{base}/stable");
    let mut prior_record = UrlRecord::new(stable_loc.clone());
    prior_record.lastmod = Some((Utc::now() - chrono::Duration::hours(1)).fixed_offset());
    prior_record.changefreq = Some(ChangeFreq::Daily);
    prior_record.priority = 0.5;

    let mut prior = UrlIndex::new();
    prior.insert(stable_loc.clone(), prior_record.clone());

    let interval = chrono::Duration::hours(48);
    let now = Utc::now();
    let options = CrawlOptions::new()
        .with_prior_urls(prior)
        .with_crawl_validator(Box::new(move |_url, prior| match prior {
            Some(record) => {
                if record.priority >= 1.0 {
                    return true;
                }
                match record.lastmod {
                    Some(lastmod) => {
                        now.signed_duration_since(lastmod.with_timezone(&Utc)) >= interval
                    }
                    None => true,
                }
            }
            None => true,
        }));

    let seed = format!("{base}/");
    let sitemap = crawl_domain(&seed, options).await.expect("crawl failed");

    // The skipped URL still appears, carrying its prior metadata
    let carried = sitemap.get(&stable_loc).expect("prior record not carried");
    assert_eq!(carried.priority, 0.5);
    assert_eq!(carried.changefreq, Some(ChangeFreq::Daily));
    assert_eq!(carried.lastmod, prior_record.lastmod);
}

#[tokio::test]
async fn test_priority_one_record_is_refetched_and_updated() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, "/", r#"<a href="/home">home</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/home"))
        .respond_with(
            html_page("fresh content")
                .insert_header("last-modified", "Wed, 01 May 2024 12:30:00 GMT"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let home_loc = format!("{base}/home");
    let mut prior_record = UrlRecord::new(home_loc.clone());
    prior_record.lastmod = Some(Utc::now().fixed_offset());
    prior_record.priority = 1.0;

    let mut prior = UrlIndex::new();
    prior.insert(home_loc.clone(), prior_record);

    let interval = chrono::Duration::hours(48);
    let now = Utc::now();
    let options = CrawlOptions::new()
        .with_prior_urls(prior)
        .with_crawl_validator(Box::new(move |_url, prior| match prior {
            Some(record) => {
                if record.priority >= 1.0 {
                    return true;
                }
                match record.lastmod {
                    Some(lastmod) => {
                        now.signed_duration_since(lastmod.with_timezone(&Utc)) >= interval
                    }
                    None => true,
                }
            }
            None => true,
        }));

    let seed = format!("{base}/");
    let sitemap = crawl_domain(&seed, options).await.expect("crawl failed");

    let updated = sitemap.get(&home_loc).expect("home missing from output");
    // The record was rebuilt from the fresh fetch
    assert_eq!(updated.priority, DEFAULT_PRIORITY);
    assert_eq!(
        updated.lastmod.expect("lastmod missing").to_rfc3339(),
        "2024-05-01T12:30:00+00:00"
    );
}

#[tokio::test]
async fn test_read_link_observer_sees_all_candidates() {
    let server = MockServer::start().await;

    mount_page(
        &server,
        "/",
        r#"<a href="/page">a</a>
           <img src="/pic.png">
           <script src="/app.js"></script>"#,
    )
    .await;
    mount_page(&server, "/page", "leaf").await;

    let seen: Arc<Mutex<Vec<(String, LinkKind)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let options = CrawlOptions::new().with_read_link(Box::new(move |resolved, candidate| {
        sink.lock()
            .unwrap()
            .push((resolved.path().to_string(), candidate.kind));
    }));

    let seed = format!("{}/", server.uri());
    let sitemap = crawl_domain(&seed, options).await.expect("crawl failed");

    let seen = seen.lock().unwrap();
    assert!(seen.contains(&("/page".to_string(), LinkKind::Anchor)));
    assert!(seen.contains(&("/pic.png".to_string(), LinkKind::Image)));
    assert!(seen.contains(&("/app.js".to_string(), LinkKind::Script)));

    // Non-anchor candidates are observed but never crawled
    assert_eq!(sitemap.len(), 2);
}

/// Records the arrival time of every request and delays each response by a
/// fixed amount, so request intervals can be checked for overlap afterwards
struct TimedResponder {
    delay: Duration,
    starts: Arc<Mutex<Vec<Instant>>>,
}

impl Respond for TimedResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        self.starts.lock().unwrap().push(Instant::now());
        let body = if request.url.path() == "/" {
            (1..=10)
                .map(|n| format!(r#"<a href="/page{n}">p</a>"#))
                .collect::<String>()
        } else {
            "leaf".to_string()
        };
        html_page(&body).set_delay(self.delay)
    }
}

/// Maximum number of request intervals [start, start + width) that were
/// ever live at once
fn max_overlap(starts: &[Instant], width: Duration) -> usize {
    starts
        .iter()
        .map(|probe| {
            starts
                .iter()
                .filter(|start| **start <= *probe && probe.duration_since(**start) < width)
                .count()
        })
        .max()
        .unwrap_or(0)
}

#[tokio::test]
async fn test_concurrency_never_exceeds_pool_size() {
    let server = MockServer::start().await;
    let delay = Duration::from_millis(200);
    let starts: Arc<Mutex<Vec<Instant>>> = Arc::new(Mutex::new(Vec::new()));

    Mock::given(method("GET"))
        .respond_with(TimedResponder {
            delay,
            starts: Arc::clone(&starts),
        })
        .mount(&server)
        .await;

    let seed = format!("{}/", server.uri());
    let options = CrawlOptions::new().with_max_concurrency(2);
    let sitemap = crawl_domain(&seed, options).await.expect("crawl failed");

    assert_eq!(sitemap.len(), 11);
    let starts = starts.lock().unwrap();
    assert_eq!(starts.len(), 11);
    assert!(
        max_overlap(&starts, delay) <= 2,
        "more than 2 requests in flight at once"
    );
}

#[tokio::test]
async fn test_crawl_deadline_returns_partial_results() {
    let server = MockServer::start().await;

    mount_page(&server, "/", r#"<a href="/slow">slow</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(html_page("eventually").set_delay(Duration::from_secs(30)))
        .mount(&server)
        .await;

    let seed = format!("{}/", server.uri());
    let options = CrawlOptions::new().with_crawl_timeout(Duration::from_secs(1));

    let begun = Instant::now();
    let sitemap = crawl_domain(&seed, options).await.expect("crawl failed");
    let elapsed = begun.elapsed();

    assert!(elapsed < Duration::from_secs(10), "deadline was not honored");
    assert!(sitemap.get(&seed).is_some());
    assert!(sitemap.get(&format!("{}/slow", server.uri())).is_none());
}

/// Serves an endless chain of pages, each linking to the next
struct ChainResponder;

impl Respond for ChainResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let n: u32 = request
            .url
            .path()
            .trim_start_matches("/p")
            .parse()
            .unwrap_or(0);
        html_page(&format!(r#"<a href="/p{}">next</a>"#, n + 1))
            .set_delay(Duration::from_millis(50))
    }
}

#[tokio::test]
async fn test_external_shutdown_enters_draining_phase() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ChainResponder)
        .mount(&server)
        .await;

    let seed = format!("{}/", server.uri());
    // No crawl deadline: the shutdown request alone must drive the
    // Running -> Draining -> Done transitions
    let coordinator =
        sitemapper::Coordinator::new(&seed, CrawlOptions::new().with_max_concurrency(1))
            .expect("coordinator");
    assert_eq!(coordinator.phase(), CrawlPhase::Init);

    let handle = coordinator.shutdown_handle();
    let mut phases = coordinator.phase_watch();
    let watcher = tokio::spawn(async move {
        phases
            .wait_for(|phase| *phase == CrawlPhase::Draining)
            .await
            .is_ok()
    });

    let crawl = tokio::spawn(coordinator.run());
    tokio::time::sleep(Duration::from_millis(200)).await;
    handle.shutdown();

    let saw_draining = tokio::time::timeout(Duration::from_secs(5), watcher)
        .await
        .expect("phase watcher timed out")
        .expect("phase watcher panicked");
    assert!(saw_draining, "crawl never entered the draining phase");

    tokio::time::timeout(Duration::from_secs(5), crawl)
        .await
        .expect("crawl did not stop after shutdown")
        .expect("crawl task panicked")
        .expect("crawl failed");
}

#[tokio::test]
async fn test_external_shutdown_stops_crawl() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ChainResponder)
        .mount(&server)
        .await;

    let seed = format!("{}/", server.uri());
    let coordinator =
        sitemapper::Coordinator::new(&seed, CrawlOptions::new().with_max_concurrency(1))
            .expect("coordinator");
    let handle = coordinator.shutdown_handle();

    let crawl = tokio::spawn(coordinator.run());
    tokio::time::sleep(Duration::from_millis(300)).await;

    let begun = Instant::now();
    handle.shutdown();
    let sitemap = tokio::time::timeout(Duration::from_secs(5), crawl)
        .await
        .expect("crawl did not stop after shutdown")
        .expect("crawl task panicked")
        .expect("crawl failed");

    assert!(begun.elapsed() < Duration::from_secs(5));
    assert!(!sitemap.is_empty(), "pages fetched before shutdown are kept");
}

#[tokio::test]
async fn test_validator_receives_resolved_url() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, "/", r#"<a href="/blocked">x</a> <a href="/allowed">y</a>"#).await;
    mount_page(&server, "/allowed", "leaf").await;
    Mock::given(method("GET"))
        .and(path("/blocked"))
        .respond_with(html_page("never"))
        .expect(0)
        .mount(&server)
        .await;

    let options = CrawlOptions::new().with_crawl_validator(Box::new(
        |url: &Url, _prior: Option<&UrlRecord>| url.path() != "/blocked",
    ));

    let seed = format!("{base}/");
    let sitemap = crawl_domain(&seed, options).await.expect("crawl failed");

    assert!(sitemap.get(&format!("{base}/allowed")).is_some());
    assert!(sitemap.get(&format!("{base}/blocked")).is_none());
}

#[tokio::test]
async fn test_priority_function_drives_output_priority() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, "/", r#"<a href="/deep/page">d</a>"#).await;
    mount_page(&server, "/deep/page", "leaf").await;

    let options = CrawlOptions::new().with_priority(Box::new(|url: &Url| {
        if url.path() == "/" {
            1.0
        } else {
            0.3
        }
    }));

    let seed = format!("{base}/");
    let sitemap = crawl_domain(&seed, options).await.expect("crawl failed");

    assert_eq!(sitemap.get(&seed).unwrap().priority, 1.0);
    assert_eq!(sitemap.get(&format!("{base}/deep/page")).unwrap().priority, 0.3);

    // Output ordering follows priority
    let sorted: Vec<&str> = sitemap
        .sorted_records()
        .iter()
        .map(|r| r.loc.as_str())
        .collect();
    assert_eq!(sorted[0], seed.as_str());
}
