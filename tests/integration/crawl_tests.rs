//! Integration tests for the crawl engine
//!
//! The end-to-end test drives the real HTTP fetcher against a wiremock
//! server. The pool properties (per-domain bound, exactly-once, resume,
//! fatal sink errors, pause handling) use scripted in-memory fetchers and
//! sinks so the tests stay fast and deterministic.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tagsweep::config::{BlockAction, Config};
use tagsweep::crawler::{FetchError, FetchedPage, Fetcher, HttpFetcher};
use tagsweep::detect::SignatureDetector;
use tagsweep::output::{Sink, SinkError, SinkResult};
use tagsweep::storage::{load_checkpoint, FileCheckpoint};
use tagsweep::url::VariationKind;
use tagsweep::{extract_domain, CrawlError, Crawler, StatusClass, UrlResult};
use tempfile::TempDir;
use tokio::time::Instant;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

type Script = dyn Fn(&str, usize) -> Result<u16, FetchError> + Send + Sync;

/// Fetcher that answers from a closure of `(url, nth call for that url)`
struct ScriptedFetcher {
    script: Box<Script>,
    latency: Duration,
    calls: Mutex<Vec<(String, Instant)>>,
    per_url: Mutex<HashMap<String, usize>>,
    in_flight: Mutex<HashMap<String, usize>>,
    max_per_domain_seen: AtomicUsize,
    global_in_flight: AtomicUsize,
    max_global_seen: AtomicUsize,
}

impl ScriptedFetcher {
    fn new<F>(latency: Duration, script: F) -> Self
    where
        F: Fn(&str, usize) -> Result<u16, FetchError> + Send + Sync + 'static,
    {
        Self {
            script: Box::new(script),
            latency,
            calls: Mutex::new(Vec::new()),
            per_url: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
            max_per_domain_seen: AtomicUsize::new(0),
            global_in_flight: AtomicUsize::new(0),
            max_global_seen: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> Vec<(String, Instant)> {
        self.calls.lock().unwrap().clone()
    }

    fn called_urls(&self) -> Vec<String> {
        self.calls().into_iter().map(|(url, _)| url).collect()
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let domain = extract_domain(url);
        let nth = {
            let mut per_url = self.per_url.lock().unwrap();
            let count = per_url.entry(url.to_string()).or_insert(0);
            *count += 1;
            *count
        };
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), Instant::now()));

        {
            let mut in_flight = self.in_flight.lock().unwrap();
            let current = in_flight.entry(domain.clone()).or_insert(0);
            *current += 1;
            self.max_per_domain_seen
                .fetch_max(*current, Ordering::SeqCst);
        }
        let global = self.global_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_global_seen.fetch_max(global, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        self.global_in_flight.fetch_sub(1, Ordering::SeqCst);
        if let Some(current) = self.in_flight.lock().unwrap().get_mut(&domain) {
            *current -= 1;
        }

        let status = (self.script)(url, nth)?;
        Ok(FetchedPage {
            final_url: url.to_string(),
            status,
            headers: HashMap::new(),
            body: "<html><head><title>ok</title></head><body></body></html>".to_string(),
        })
    }
}

/// In-memory sink; optionally fails on the nth write
#[derive(Clone, Default)]
struct MemorySink {
    results: Arc<Mutex<Vec<UrlResult>>>,
    fail_on_write: Option<usize>,
}

impl MemorySink {
    fn failing_on(nth: usize) -> Self {
        Self {
            fail_on_write: Some(nth),
            ..Self::default()
        }
    }

    fn results(&self) -> Vec<UrlResult> {
        self.results.lock().unwrap().clone()
    }

    fn urls(&self) -> Vec<String> {
        self.results()
            .into_iter()
            .map(|r| r.original_url)
            .collect()
    }
}

impl Sink for MemorySink {
    fn write(&mut self, result: &UrlResult) -> SinkResult<()> {
        let mut results = self.results.lock().unwrap();
        if self.fail_on_write == Some(results.len() + 1) {
            return Err(SinkError::Write("disk full".to_string()));
        }
        results.push(result.clone());
        Ok(())
    }

    fn healthy(&mut self) -> bool {
        true
    }

    fn flush(&mut self) -> SinkResult<()> {
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

/// Config with pacing and backoff shrunk to milliseconds
fn fast_config() -> Config {
    let mut config = Config::default();
    config.crawler.concurrency = 4;
    config.crawler.max_per_domain = 1;
    config.crawler.request_delay = 0.0;
    config.crawler.request_jitter = 0.0;
    config.retry.base_delay = 0.01;
    config.retry.multiplier = 1.0;
    config.retry.jitter_range = [0.0, 0.0];
    config.retry.rate_limit_backoff = 0.05;
    config.output.health_check_interval = 0.5;
    config
}

struct Harness {
    successes: MemorySink,
    failures: MemorySink,
    checkpoint_path: std::path::PathBuf,
    _dir: TempDir,
}

impl Harness {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        Self {
            successes: MemorySink::default(),
            failures: MemorySink::default(),
            checkpoint_path: dir.path().join("checkpoint.txt"),
            _dir: dir,
        }
    }

    fn crawler(&self, config: Config, fetcher: Arc<dyn Fetcher>) -> Crawler {
        let detector = SignatureDetector::new(&config.detection.signatures).unwrap();
        let checkpoint = FileCheckpoint::open(&self.checkpoint_path, false, false).unwrap();
        Crawler::new(
            config,
            fetcher,
            Arc::new(detector),
            Box::new(self.successes.clone()),
            Box::new(self.failures.clone()),
            Box::new(checkpoint),
        )
    }

    fn checkpoint_lines(&self) -> Vec<String> {
        read_lines(&self.checkpoint_path)
    }
}

fn read_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

fn page_url(domain: usize, page: usize) -> String {
    format!("https://site{}.test/page{}", domain, page)
}

#[tokio::test]
async fn test_end_to_end_against_mock_server() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/with-tag"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><head><title>Tagged</title>
               <script src="https://js.hs-scripts.com/123.js"></script>
               </head><body></body></html>"#,
        ))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/plain"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("<html><body>nothing here</body></html>"),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let base = server.uri();
    let urls = vec![
        format!("{}/with-tag", base),
        format!("{}/plain", base),
        format!("{}/missing", base),
        format!("{}/with-tag", base),
    ];

    let mut config = fast_config();
    config.crawler.max_per_domain = 2;
    let harness = Harness::new();
    let fetcher = HttpFetcher::new(&config.fetch).unwrap();
    let summary = harness
        .crawler(config, Arc::new(fetcher))
        .run(urls)
        .await
        .unwrap();

    assert_eq!(summary.total_input, 4);
    assert_eq!(summary.duplicates, 1);
    assert_eq!(summary.succeeded(), 2);
    assert_eq!(summary.failed(), 1);
    assert!(!summary.interrupted);

    let successes = harness.successes.results();
    let tagged = successes
        .iter()
        .find(|r| r.original_url.ends_with("/with-tag"))
        .unwrap();
    assert!(tagged.detection.as_ref().unwrap().found);
    assert_eq!(tagged.http_status, Some(200));

    let plain = successes
        .iter()
        .find(|r| r.original_url.ends_with("/plain"))
        .unwrap();
    assert!(!plain.detection.as_ref().unwrap().found);

    let failures = harness.failures.results();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].http_status, Some(404));
    assert_eq!(failures[0].status_class, Some(StatusClass::PermanentError));
    assert_eq!(failures[0].attempts, 1);
    assert!(failures[0].failure_reason.is_some());

    assert_eq!(harness.checkpoint_lines().len(), 3);
}

#[tokio::test]
async fn test_per_domain_bound_is_never_exceeded() {
    let fetcher = Arc::new(ScriptedFetcher::new(Duration::from_millis(15), |_, _| {
        Ok(200)
    }));
    let urls: Vec<String> = (0..24).map(|i| page_url(i % 3, i)).collect();

    let mut config = fast_config();
    config.crawler.concurrency = 6;
    config.crawler.max_per_domain = 1;
    let harness = Harness::new();
    let summary = harness
        .crawler(config, fetcher.clone())
        .run(urls)
        .await
        .unwrap();

    assert_eq!(summary.succeeded(), 24);
    assert_eq!(fetcher.max_per_domain_seen.load(Ordering::SeqCst), 1);
    assert!(fetcher.max_global_seen.load(Ordering::SeqCst) <= 3);
}

#[tokio::test]
async fn test_global_concurrency_budget() {
    let fetcher = Arc::new(ScriptedFetcher::new(Duration::from_millis(15), |_, _| {
        Ok(200)
    }));
    let urls: Vec<String> = (0..30).map(|i| page_url(i, 0)).collect();

    let mut config = fast_config();
    config.crawler.concurrency = 4;
    config.crawler.max_per_domain = 2;
    let harness = Harness::new();
    harness
        .crawler(config, fetcher.clone())
        .run(urls)
        .await
        .unwrap();

    assert!(fetcher.max_global_seen.load(Ordering::SeqCst) <= 4);
    assert_eq!(fetcher.calls().len(), 30);
}

#[tokio::test]
async fn test_every_url_gets_exactly_one_result() {
    // page%3: 0 recovers after one transient error, 1 is gone, 2 is fine
    let fetcher = Arc::new(ScriptedFetcher::new(Duration::from_millis(2), |url, nth| {
        let page: usize = url.rsplit("page").next().unwrap().parse().unwrap();
        match page % 3 {
            0 if nth == 1 => Err(FetchError::Timeout),
            1 => Ok(404),
            _ => Ok(200),
        }
    }));
    let urls: Vec<String> = (0..30).map(|i| page_url(i % 5, i)).collect();

    let mut config = fast_config();
    config.crawler.max_per_domain = 2;
    config.retry.max_retries = 2;
    let harness = Harness::new();
    let summary = harness
        .crawler(config, fetcher.clone())
        .run(urls.clone())
        .await
        .unwrap();

    assert_eq!(summary.succeeded(), 20);
    assert_eq!(summary.failed(), 10);

    let mut seen: Vec<String> = harness.successes.urls();
    seen.extend(harness.failures.urls());
    assert_eq!(seen.len(), 30);
    let unique: HashSet<String> = seen.into_iter().collect();
    assert_eq!(unique, urls.iter().cloned().collect::<HashSet<_>>());

    let checkpoint = harness.checkpoint_lines();
    assert_eq!(checkpoint.len(), 30);
    assert_eq!(
        checkpoint.into_iter().collect::<HashSet<_>>(),
        urls.into_iter().collect::<HashSet<_>>()
    );

    let recovered = harness
        .successes
        .results()
        .into_iter()
        .find(|r| r.original_url == page_url(0, 0))
        .unwrap();
    assert_eq!(recovered.attempts, 2);
}

#[tokio::test]
async fn test_resume_skips_checkpointed_urls() {
    let harness = Harness::new();
    let urls: Vec<String> = (0..5).map(|i| page_url(i, 0)).collect();
    std::fs::write(
        &harness.checkpoint_path,
        format!("{}\n{}\n", urls[0], urls[1]),
    )
    .unwrap();

    let fetcher = Arc::new(ScriptedFetcher::new(Duration::ZERO, |_, _| Ok(200)));
    let summary = harness
        .crawler(fast_config(), fetcher.clone())
        .run(urls.clone())
        .await
        .unwrap();

    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.scheduled, 3);
    let fetched: HashSet<String> = fetcher.called_urls().into_iter().collect();
    assert!(!fetched.contains(&urls[0]));
    assert!(!fetched.contains(&urls[1]));
    assert_eq!(fetched.len(), 3);
    assert_eq!(harness.checkpoint_lines().len(), 5);

    // A second pass over the same input has nothing left to do
    let again = Arc::new(ScriptedFetcher::new(Duration::ZERO, |_, _| Ok(200)));
    let summary = harness
        .crawler(fast_config(), again.clone())
        .run(urls)
        .await
        .unwrap();

    assert_eq!(summary.scheduled, 0);
    assert_eq!(summary.completed(), 0);
    assert!(again.calls().is_empty());
    assert_eq!(harness.successes.results().len(), 3);
    assert_eq!(
        load_checkpoint(&harness.checkpoint_path).unwrap().len(),
        5
    );
}

#[tokio::test]
async fn test_variations_follow_fixed_order_and_cap() {
    let fetcher = Arc::new(ScriptedFetcher::new(Duration::ZERO, |_, _| Ok(503)));

    let mut config = fast_config();
    config.retry.max_retries = 0;
    config.variations.enabled = true;
    config.variations.max_variations = 2;
    let harness = Harness::new();
    let summary = harness
        .crawler(config, fetcher.clone())
        .run(vec!["http://example.com".to_string()])
        .await
        .unwrap();

    assert_eq!(summary.failed(), 1);
    assert_eq!(
        fetcher.called_urls(),
        vec![
            "http://example.com",
            "http://www.example.com",
            "https://example.com",
        ]
    );

    let failure = &harness.failures.results()[0];
    assert_eq!(failure.original_url, "http://example.com");
    assert_eq!(failure.attempts, 3);
    assert_eq!(failure.attempted_urls.len(), 3);
    assert_eq!(failure.status_class, Some(StatusClass::TransientError));
}

#[tokio::test]
async fn test_success_through_variation_is_recorded() {
    let fetcher = Arc::new(ScriptedFetcher::new(Duration::ZERO, |url, _| {
        if url.contains("://www.") {
            Ok(200)
        } else {
            Ok(503)
        }
    }));

    let mut config = fast_config();
    config.retry.max_retries = 1;
    config.variations.enabled = true;
    let harness = Harness::new();
    harness
        .crawler(config, fetcher.clone())
        .run(vec!["shop.test/catalog".to_string()])
        .await
        .unwrap();

    let result = &harness.successes.results()[0];
    assert_eq!(result.original_url, "shop.test/catalog");
    assert_eq!(
        result.variation_used.as_deref(),
        Some("https://www.shop.test/catalog")
    );
    assert_eq!(result.variation_kind, Some(VariationKind::WwwToggle));
    // Original form: first attempt plus one retry
    assert_eq!(result.attempts, 3);
}

#[tokio::test]
async fn test_forbidden_gives_up_without_retrying() {
    let fetcher = Arc::new(ScriptedFetcher::new(Duration::ZERO, |_, _| Ok(403)));

    let mut config = fast_config();
    config.retry.max_retries = 3;
    config.retry.base_delay = 30.0;
    let harness = Harness::new();

    let started = Instant::now();
    harness
        .crawler(config, fetcher.clone())
        .run(vec!["https://deny.test/".to_string()])
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(fetcher.calls().len(), 1);

    let failure = &harness.failures.results()[0];
    assert_eq!(failure.http_status, Some(403));
    assert_eq!(failure.status_class, Some(StatusClass::Forbidden));
    assert!(failure.failure_reason.as_ref().unwrap().contains("403"));
}

#[tokio::test]
async fn test_rate_limit_backs_off_once_then_moves_on() {
    let fetcher = Arc::new(ScriptedFetcher::new(Duration::ZERO, |url, _| {
        if url.contains("://www.") {
            Ok(200)
        } else {
            Ok(429)
        }
    }));

    let mut config = fast_config();
    config.retry.max_retries = 3;
    config.retry.rate_limit_backoff = 0.3;
    config.variations.enabled = true;
    let harness = Harness::new();
    harness
        .crawler(config, fetcher.clone())
        .run(vec!["https://busy.test/page".to_string()])
        .await
        .unwrap();

    let calls = fetcher.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].0, "https://busy.test/page");
    assert_eq!(calls[1].0, "https://www.busy.test/page");
    assert!(calls[1].1 - calls[0].1 >= Duration::from_millis(300));
    assert_eq!(harness.successes.results().len(), 1);
}

#[tokio::test]
async fn test_rate_limit_without_variations_fails_form() {
    let fetcher = Arc::new(ScriptedFetcher::new(Duration::ZERO, |_, _| Ok(429)));

    let mut config = fast_config();
    config.retry.rate_limit_backoff = 30.0;
    let harness = Harness::new();

    let started = Instant::now();
    harness
        .crawler(config, fetcher.clone())
        .run(vec!["https://busy.test/".to_string()])
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(fetcher.calls().len(), 1);
    assert_eq!(
        harness.failures.results()[0].status_class,
        Some(StatusClass::RateLimited)
    );
}

#[tokio::test]
async fn test_sink_failure_stops_run_with_checkpoint_intact() {
    let fetcher = Arc::new(ScriptedFetcher::new(Duration::from_millis(5), |_, _| {
        Ok(200)
    }));
    let urls: Vec<String> = (0..20).map(|i| page_url(i, 0)).collect();

    let mut config = fast_config();
    config.crawler.concurrency = 2;
    let mut harness = Harness::new();
    harness.successes = MemorySink::failing_on(3);

    let result = harness
        .crawler(config, fetcher)
        .run(urls)
        .await;

    assert!(matches!(
        result,
        Err(CrawlError::Sink(SinkError::Write(_)))
    ));

    // Everything checkpointed was written, and nothing else
    let written: HashSet<String> = harness.successes.urls().into_iter().collect();
    let checkpointed: HashSet<String> = harness.checkpoint_lines().into_iter().collect();
    assert_eq!(written.len(), 2);
    assert_eq!(checkpointed, written);
}

fn block_config(action: BlockAction) -> Config {
    let mut config = fast_config();
    config.crawler.concurrency = 2;
    config.block_detection.enabled = true;
    config.block_detection.window_size = 4;
    config.block_detection.min_signals = 2;
    config.block_detection.threshold_ratio = 0.5;
    config.block_detection.action = action;
    config.block_detection.auto_resume_timeout = 1;
    config
}

/// Four blocked domains followed by four healthy ones
fn blocked_then_healthy() -> (Arc<ScriptedFetcher>, Vec<String>) {
    let fetcher = Arc::new(ScriptedFetcher::new(Duration::from_millis(5), |url, _| {
        if url.contains("blocked") {
            Ok(403)
        } else {
            Ok(200)
        }
    }));
    let mut urls: Vec<String> = (0..4)
        .map(|i| format!("https://blocked{}.test/", i))
        .collect();
    urls.extend((0..4).map(|i| format!("https://open{}.test/", i)));
    (fetcher, urls)
}

#[tokio::test]
async fn test_pause_auto_resumes_and_finishes() {
    let (fetcher, urls) = blocked_then_healthy();
    let harness = Harness::new();

    let summary = harness
        .crawler(block_config(BlockAction::Pause), fetcher)
        .run(urls)
        .await
        .unwrap();

    assert!(summary.pauses >= 1);
    assert!(!summary.blocks.is_empty());
    assert!(summary.blocks[0].affected_domains.len() >= 2);
    assert_eq!(summary.completed(), 8);
    assert_eq!(summary.failed(), 4);
    assert_eq!(harness.checkpoint_lines().len(), 8);
}

#[tokio::test]
async fn test_retry_on_resume_refetches_blocked_urls() {
    // Blocked domains refuse the first request only
    let fetcher = Arc::new(ScriptedFetcher::new(Duration::from_millis(5), |url, nth| {
        if url.contains("blocked") && nth == 1 {
            Ok(403)
        } else {
            Ok(200)
        }
    }));
    let mut urls: Vec<String> = (0..2)
        .map(|i| format!("https://blocked{}.test/", i))
        .collect();
    urls.extend((0..4).map(|i| format!("https://open{}.test/", i)));

    let mut config = block_config(BlockAction::Pause);
    config.crawler.concurrency = 1;
    config.block_detection.retry_failed = true;
    let harness = Harness::new();

    let summary = tokio::time::timeout(
        Duration::from_secs(10),
        harness.crawler(config, fetcher.clone()).run(urls.clone()),
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(summary.pauses, 1);
    assert_eq!(summary.retried, 2);
    assert_eq!(summary.succeeded(), 6);
    assert_eq!(summary.failed(), 0);

    let fetched = fetcher.called_urls();
    for blocked in &urls[..2] {
        assert_eq!(fetched.iter().filter(|u| *u == blocked).count(), 2);
    }
    let recovered: Vec<_> = harness
        .successes
        .results()
        .into_iter()
        .filter(|r| r.original_url.contains("blocked"))
        .collect();
    assert_eq!(recovered.len(), 2);
    assert!(recovered.iter().all(|r| r.attempts == 2));

    let checkpoint = harness.checkpoint_lines();
    assert_eq!(checkpoint.len(), 6);
    assert_eq!(checkpoint.iter().collect::<HashSet<_>>().len(), 6);
}

#[tokio::test]
async fn test_plain_resume_fails_held_urls_once() {
    let (fetcher, urls) = blocked_then_healthy();
    let mut config = block_config(BlockAction::Pause);
    config.block_detection.retry_failed = false;
    let harness = Harness::new();

    let summary = harness
        .crawler(config, fetcher.clone())
        .run(urls.clone())
        .await
        .unwrap();

    assert_eq!(summary.retried, 0);
    assert_eq!(summary.failed(), 4);
    let fetched = fetcher.called_urls();
    for blocked in urls.iter().filter(|u| u.contains("blocked")) {
        assert_eq!(fetched.iter().filter(|u| *u == blocked).count(), 1);
    }
    let failed: HashSet<String> = harness.failures.urls().into_iter().collect();
    assert_eq!(failed.len(), 4);
}

#[tokio::test]
async fn test_pause_resolved_by_handle() {
    let (fetcher, urls) = blocked_then_healthy();
    let mut config = block_config(BlockAction::Pause);
    config.block_detection.auto_resume_timeout = 0;
    let harness = Harness::new();

    let crawler = harness.crawler(config, fetcher);
    let handle = crawler.handle();
    let resumer = tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_millis(50)).await;
            if !handle.resume() {
                break;
            }
        }
    });

    let summary = tokio::time::timeout(Duration::from_secs(10), crawler.run(urls))
        .await
        .unwrap()
        .unwrap();
    resumer.await.unwrap();

    assert!(summary.pauses >= 1);
    assert_eq!(summary.completed(), 8);
}

#[tokio::test]
async fn test_warn_action_never_pauses() {
    let (fetcher, urls) = blocked_then_healthy();
    let harness = Harness::new();

    let summary = harness
        .crawler(block_config(BlockAction::Warn), fetcher)
        .run(urls)
        .await
        .unwrap();

    assert_eq!(summary.pauses, 0);
    assert!(!summary.blocks.is_empty());
    assert_eq!(summary.completed(), 8);
}

#[tokio::test]
async fn test_abort_action_stops_run() {
    let fetcher = Arc::new(ScriptedFetcher::new(Duration::from_millis(5), |_, _| {
        Ok(403)
    }));
    let urls: Vec<String> = (0..40)
        .map(|i| format!("https://blocked{}.test/", i))
        .collect();
    let harness = Harness::new();

    let result = harness
        .crawler(block_config(BlockAction::Abort), fetcher)
        .run(urls)
        .await;

    assert!(matches!(result, Err(CrawlError::Aborted(_))));
    assert!(harness.checkpoint_lines().len() < 40);
    // Whatever was checkpointed has a result
    let recorded: HashSet<String> = harness.failures.urls().into_iter().collect();
    for url in harness.checkpoint_lines() {
        assert!(recorded.contains(&url));
    }
}

#[tokio::test]
async fn test_shutdown_token_interrupts_run() {
    let fetcher = Arc::new(ScriptedFetcher::new(Duration::from_millis(20), |_, _| {
        Ok(200)
    }));
    let urls: Vec<String> = (0..200).map(|i| page_url(i % 10, i)).collect();
    let harness = Harness::new();

    let crawler = harness.crawler(fast_config(), fetcher);
    let token = crawler.shutdown_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(60)).await;
        token.cancel();
    });

    let summary = crawler.run(urls).await.unwrap();

    assert!(summary.interrupted);
    assert!(summary.completed() < 200);
    assert_eq!(
        harness.checkpoint_lines().len() as u64,
        summary.completed()
    );
}
