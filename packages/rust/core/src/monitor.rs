//! Per-source monitor: one `run_cycle` call drives a raw fetch all the way
//! to a notified, summarized, archived record.
//!
//! The cycle is a straight-line state machine:
//! fetch → extract → persist → (retrieve → summarize)? → notify.
//! A fetch failure aborts the cycle (the next scheduled cycle retries
//! independently — nothing is retried within a cycle). Extraction failure is
//! expressed as zero items. Downstream per-item failures never abort sibling
//! items or the cycle.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use scraper::Html;
use tokio::time::sleep;
use tracing::{info, instrument, warn};
use url::Url;

use presswatch_extract::ExtractionStrategy;
use presswatch_retrieve::{Retriever, http_client};
use presswatch_shared::{Item, PressWatchError, Result, SourceConfig};
use presswatch_storage::Storage;

use crate::notify::{Digest, DigestEntry, Notifier};
use crate::summarize::Summarizer;

// ---------------------------------------------------------------------------
// Cycle reporting
// ---------------------------------------------------------------------------

/// A record persisted for the first time during this cycle.
#[derive(Debug, Clone)]
pub struct NewRelease {
    pub record_id: i64,
    pub item: Item,
}

/// Outcome of one monitor cycle, for logging and CLI display.
#[derive(Debug)]
pub struct CycleReport {
    pub source_name: String,
    /// Items the strategy produced from the listing page.
    pub items_extracted: usize,
    /// Records that did not previously exist.
    pub new_releases: Vec<NewRelease>,
    /// Full pages archived to disk.
    pub pages_archived: usize,
    /// Summaries now available (cached or freshly generated).
    pub summaries_written: usize,
    /// Whether a digest went out.
    pub notified: bool,
}

/// Progress callback for reporting cycle status.
pub trait CycleObserver: Send + Sync {
    /// Called when the cycle enters a new stage.
    fn phase(&self, name: &str);
    /// Called for each release persisted for the first time.
    fn new_release(&self, title: &str);
}

/// No-op observer for headless/test usage.
pub struct SilentObserver;

impl CycleObserver for SilentObserver {
    fn phase(&self, _name: &str) {}
    fn new_release(&self, _title: &str) {}
}

// ---------------------------------------------------------------------------
// Monitor
// ---------------------------------------------------------------------------

/// Orchestrates the monitoring pipeline for a single source.
pub struct Monitor {
    source: SourceConfig,
    strategy: Arc<dyn ExtractionStrategy>,
    storage: Arc<Storage>,
    client: Client,
    retriever: Retriever,
    /// Inter-request delay between content downloads within one cycle.
    rate_limit: Duration,
    summarizer: Option<Arc<dyn Summarizer>>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl Monitor {
    /// Create a monitor for one source.
    pub fn new(
        source: SourceConfig,
        strategy: Arc<dyn ExtractionStrategy>,
        storage: Arc<Storage>,
        retriever: Retriever,
        timeout: Duration,
        rate_limit: Duration,
    ) -> Result<Self> {
        Ok(Self {
            source,
            strategy,
            storage,
            client: http_client(timeout)?,
            retriever,
            rate_limit,
            summarizer: None,
            notifier: None,
        })
    }

    /// Attach a summarization backend.
    pub fn with_summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    /// Attach a notification channel.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn source_name(&self) -> &str {
        &self.source.name
    }

    pub fn strategy_name(&self) -> &str {
        self.strategy.name()
    }

    /// Run one full monitoring cycle.
    #[instrument(skip_all, fields(source = %self.source.name, url = %self.source.url))]
    pub async fn run_cycle(&self, observer: &dyn CycleObserver) -> Result<CycleReport> {
        // --- Fetch ---
        observer.phase("Fetching listing");
        let body = self.fetch_listing().await?;

        // --- Extract ---
        observer.phase("Extracting items");
        let base_url = Url::parse(&self.source.url).map_err(|e| {
            PressWatchError::config(format!("invalid source url '{}': {e}", self.source.url))
        })?;
        // Html is not Send; keep the parsed document scoped to the
        // synchronous extraction step.
        let items = {
            let doc = Html::parse_document(&body);
            self.strategy.extract(&doc, &base_url)
        };
        info!(
            strategy = self.strategy.name(),
            items = items.len(),
            "extraction complete"
        );

        // --- Persist / dedup ---
        observer.phase("Recording releases");
        let mut new_releases: Vec<NewRelease> = Vec::new();
        for item in &items {
            let (record_id, is_new) = self.storage.upsert(item, &self.source.name).await?;
            if is_new {
                observer.new_release(&item.title);
                info!(title = %item.title, link = %item.link, "new release");
                new_releases.push(NewRelease {
                    record_id,
                    item: item.clone(),
                });
            }
        }

        // --- Retrieve & summarize (only for a non-empty new-release set) ---
        let mut pages_archived = 0;
        let mut summaries: HashMap<i64, String> = HashMap::new();
        if !new_releases.is_empty() {
            observer.phase("Archiving content");
            let retrieved = self.retrieve_all(&new_releases, &mut pages_archived).await?;

            if let Some(summarizer) = &self.summarizer {
                observer.phase("Summarizing");
                for (record_id, content_id, text) in &retrieved {
                    let backend = summarizer.clone();
                    let result = self
                        .storage
                        .find_or_create_summary(
                            *content_id,
                            summarizer.model_name(),
                            text,
                            |article| async move { backend.summarize(&article).await },
                        )
                        .await;
                    match result {
                        Ok(summary) => {
                            summaries.insert(*record_id, summary);
                        }
                        Err(e) => {
                            warn!(record_id, error = %e, "summarization failed, skipping item");
                        }
                    }
                }
            }
        }
        let summaries_written = summaries.len();

        // --- Notify ---
        let mut notified = false;
        if let Some(notifier) = &self.notifier {
            if !new_releases.is_empty() {
                observer.phase("Sending digest");
                let digest = self.build_digest(&new_releases, &summaries);
                match notifier.notify(&digest).await {
                    Ok(()) => notified = true,
                    Err(e) => warn!(error = %e, "notification failed"),
                }
            }
        }

        info!(
            items = items.len(),
            new = new_releases.len(),
            archived = pages_archived,
            summarized = summaries_written,
            notified,
            "cycle complete"
        );

        Ok(CycleReport {
            source_name: self.source.name.clone(),
            items_extracted: items.len(),
            new_releases,
            pages_archived,
            summaries_written,
            notified,
        })
    }

    /// Fetch the listing page. Any transport failure (timeout, connection,
    /// non-2xx) aborts the cycle identically.
    async fn fetch_listing(&self) -> Result<String> {
        let response = self
            .client
            .get(&self.source.url)
            .send()
            .await
            .map_err(|e| PressWatchError::Network(format!("{}: {e}", self.source.url)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PressWatchError::Network(format!(
                "{}: HTTP {status}",
                self.source.url
            )));
        }

        response
            .text()
            .await
            .map_err(|e| PressWatchError::Network(format!("{}: body read failed: {e}", self.source.url)))
    }

    /// Download full content for each new release, politely spaced. One
    /// failed download is logged and skipped without blocking the others.
    /// Returns `(record_id, content_id, extracted_text)` for records whose
    /// text is available for summarization.
    async fn retrieve_all(
        &self,
        new_releases: &[NewRelease],
        pages_archived: &mut usize,
    ) -> Result<Vec<(i64, i64, String)>> {
        let mut retrieved = Vec::new();

        for (i, release) in new_releases.iter().enumerate() {
            if i > 0 && !self.rate_limit.is_zero() {
                sleep(self.rate_limit).await;
            }

            let content = match self.retriever.download(&release.item.link).await {
                Ok(content) => content,
                Err(e) => {
                    warn!(link = %release.item.link, error = %e, "content download failed, skipping item");
                    continue;
                }
            };

            let html_path = content.html_path.to_string_lossy().into_owned();
            let text_path = content
                .text_path
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned());
            let content_id = self
                .storage
                .link_downloaded_content(release.record_id, &html_path, text_path.as_deref())
                .await?;
            *pages_archived += 1;

            if let Some(text) = content.text {
                retrieved.push((release.record_id, content_id, text));
            }
        }

        Ok(retrieved)
    }

    /// One digest covering all new releases; the generated summary wins over
    /// the raw extracted teaser when both exist.
    fn build_digest(
        &self,
        new_releases: &[NewRelease],
        summaries: &HashMap<i64, String>,
    ) -> Digest {
        Digest {
            source_name: self.source.name.clone(),
            entries: new_releases
                .iter()
                .map(|release| DigestEntry {
                    title: release.item.title.clone(),
                    date: release.item.date.clone(),
                    link: release.item.link.clone(),
                    summary: summaries
                        .get(&release.record_id)
                        .cloned()
                        .unwrap_or_else(|| release.item.summary.clone()),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use presswatch_extract::StrategyRegistry;
    use uuid::Uuid;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct FixedSummarizer {
        calls: AtomicUsize,
    }

    impl FixedSummarizer {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Summarizer for FixedSummarizer {
        fn model_name(&self) -> &str {
            "test-model"
        }

        async fn summarize(&self, _text: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("- generated summary".to_string())
        }
    }

    struct RecordingNotifier {
        digests: Mutex<Vec<Digest>>,
    }

    impl RecordingNotifier {
        fn new() -> Self {
            Self {
                digests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, digest: &Digest) -> Result<()> {
            self.digests.lock().unwrap().push(digest.clone());
            Ok(())
        }
    }

    struct TestEnv {
        storage: Arc<Storage>,
        tmp_dir: std::path::PathBuf,
    }

    impl TestEnv {
        async fn new() -> Self {
            let tmp_dir = std::env::temp_dir().join(format!("pw_monitor_{}", Uuid::now_v7()));
            let storage = Arc::new(
                Storage::open(&tmp_dir.join("test.db"))
                    .await
                    .expect("open storage"),
            );
            Self { storage, tmp_dir }
        }

        fn monitor(&self, server: &MockServer) -> Monitor {
            let source = SourceConfig {
                name: "acme".into(),
                url: format!("{}/press", server.uri()),
                extractor: None,
            };
            let registry = StrategyRegistry::new();
            let retriever =
                Retriever::new(self.tmp_dir.join("pages"), Duration::from_secs(5)).unwrap();
            Monitor::new(
                source,
                registry.resolve(None),
                self.storage.clone(),
                retriever,
                Duration::from_secs(5),
                Duration::ZERO,
            )
            .unwrap()
        }
    }

    impl Drop for TestEnv {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.tmp_dir);
        }
    }

    async fn mount_listing(server: &MockServer, html: &str) {
        Mock::given(method("GET"))
            .and(path("/press"))
            .respond_with(ResponseTemplate::new(200).set_body_string(html.to_string()))
            .mount(server)
            .await;
    }

    async fn mount_article(server: &MockServer, route: &str, title: &str) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!(
                "<html><body><main><h1>{title}</h1><p>Full article body.</p></main></body></html>"
            )))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn first_cycle_finds_release_second_cycle_is_idempotent() {
        let server = MockServer::start().await;
        mount_listing(
            &server,
            r#"<html><body>
                <div class="news-item">
                    <h3><a href="/news/1">Pipeline Upgrade Announced</a></h3>
                </div>
            </body></html>"#,
        )
        .await;
        mount_article(&server, "/news/1", "Pipeline Upgrade Announced").await;

        let env = TestEnv::new().await;
        let monitor = env.monitor(&server);

        let report = monitor.run_cycle(&SilentObserver).await.expect("cycle 1");
        assert_eq!(report.items_extracted, 1);
        assert_eq!(report.new_releases.len(), 1);
        assert_eq!(report.pages_archived, 1);
        // Missing date on the listing defaults to today.
        assert!(!report.new_releases[0].item.date.is_empty());

        let first = env
            .storage
            .get_release(report.new_releases[0].record_id)
            .await
            .unwrap()
            .unwrap();

        // Same document again: nothing new, but the record is re-observed.
        let report2 = monitor.run_cycle(&SilentObserver).await.expect("cycle 2");
        assert_eq!(report2.items_extracted, 1);
        assert!(report2.new_releases.is_empty());
        assert_eq!(report2.pages_archived, 0);

        let second = env.storage.get_release(first.id).await.unwrap().unwrap();
        assert!(second.last_checked > first.last_checked);
        assert_eq!(second.first_seen, first.first_seen);
    }

    #[tokio::test]
    async fn items_without_title_are_not_persisted() {
        let server = MockServer::start().await;
        mount_listing(
            &server,
            r#"<html><body>
                <div class="news-item"><h3><a href="/news/a">First Story</a></h3></div>
                <div class="news-item"><a href="/news/b">no heading here</a></div>
                <div class="news-item"><h3><a href="/news/c">Third Story</a></h3></div>
            </body></html>"#,
        )
        .await;
        mount_article(&server, "/news/a", "First Story").await;
        mount_article(&server, "/news/c", "Third Story").await;

        let env = TestEnv::new().await;
        let monitor = env.monitor(&server);

        let report = monitor.run_cycle(&SilentObserver).await.expect("cycle");
        assert_eq!(report.items_extracted, 2);
        assert_eq!(report.new_releases.len(), 2);
        assert_eq!(env.storage.list_releases(None, 10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn failed_download_does_not_block_siblings_or_digest() {
        let server = MockServer::start().await;
        mount_listing(
            &server,
            r#"<html><body>
                <div class="news-item">
                    <h3><a href="/news/good">Good Story</a></h3>
                    <p class="summary">Good teaser.</p>
                </div>
                <div class="news-item">
                    <h3><a href="/news/bad">Bad Story</a></h3>
                    <p class="summary">Bad teaser.</p>
                </div>
            </body></html>"#,
        )
        .await;
        mount_article(&server, "/news/good", "Good Story").await;
        // /news/bad is unmocked and returns 404.

        let env = TestEnv::new().await;
        let summarizer = Arc::new(FixedSummarizer::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let monitor = env
            .monitor(&server)
            .with_summarizer(summarizer.clone())
            .with_notifier(notifier.clone());

        let report = monitor.run_cycle(&SilentObserver).await.expect("cycle");
        assert_eq!(report.new_releases.len(), 2);
        assert_eq!(report.pages_archived, 1);
        assert_eq!(report.summaries_written, 1);
        assert!(report.notified);

        // The digest still covers both releases; the failed one falls back
        // to its raw extracted teaser.
        let digests = notifier.digests.lock().unwrap();
        assert_eq!(digests.len(), 1);
        let entries = &digests[0].entries;
        assert_eq!(entries.len(), 2);
        let good = entries.iter().find(|e| e.title == "Good Story").unwrap();
        let bad = entries.iter().find(|e| e.title == "Bad Story").unwrap();
        assert_eq!(good.summary, "- generated summary");
        assert_eq!(bad.summary, "Bad teaser.");
    }

    #[tokio::test]
    async fn no_notification_without_new_releases() {
        let server = MockServer::start().await;
        mount_listing(
            &server,
            r#"<html><body>
                <div class="news-item"><h3><a href="/news/1">Only Story</a></h3></div>
            </body></html>"#,
        )
        .await;
        mount_article(&server, "/news/1", "Only Story").await;

        let env = TestEnv::new().await;
        let notifier = Arc::new(RecordingNotifier::new());
        let monitor = env.monitor(&server).with_notifier(notifier.clone());

        monitor.run_cycle(&SilentObserver).await.expect("cycle 1");
        let report = monitor.run_cycle(&SilentObserver).await.expect("cycle 2");

        assert!(!report.notified);
        assert_eq!(notifier.digests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn fetch_failure_aborts_cycle_without_persisting() {
        let server = MockServer::start().await;
        // No /press mock: the listing fetch gets a 404.

        let env = TestEnv::new().await;
        let monitor = env.monitor(&server);

        let result = monitor.run_cycle(&SilentObserver).await;
        assert!(matches!(result, Err(PressWatchError::Network(_))));
        assert!(env.storage.list_releases(None, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn summaries_are_cached_across_cycles() {
        let server = MockServer::start().await;
        mount_listing(
            &server,
            r#"<html><body>
                <div class="news-item"><h3><a href="/news/1">Cached Story</a></h3></div>
            </body></html>"#,
        )
        .await;
        mount_article(&server, "/news/1", "Cached Story").await;

        let env = TestEnv::new().await;
        let summarizer = Arc::new(FixedSummarizer::new());
        let monitor = env.monitor(&server).with_summarizer(summarizer.clone());

        let report = monitor.run_cycle(&SilentObserver).await.expect("cycle");
        assert_eq!(report.summaries_written, 1);
        assert_eq!(summarizer.calls.load(Ordering::SeqCst), 1);

        // Asking the store again for the same content and model returns the
        // cached text without touching the backend.
        let release_id = report.new_releases[0].record_id;
        let page = env
            .storage
            .downloaded_page_for(release_id)
            .await
            .unwrap()
            .expect("archived page");
        let backend = summarizer.clone();
        let again = env
            .storage
            .find_or_create_summary(page.id, "test-model", "ignored", |text| async move {
                backend.summarize(&text).await
            })
            .await
            .unwrap();
        assert_eq!(again, "- generated summary");
        assert_eq!(summarizer.calls.load(Ordering::SeqCst), 1);
    }
}
