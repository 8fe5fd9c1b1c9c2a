//! Core pipeline orchestration for PressWatch.
//!
//! This crate ties extraction, storage, retrieval, summarization, and
//! notification together into the per-source [`Monitor`] state machine and
//! the [`Scheduler`] control loop that drives it.

pub mod monitor;
pub mod notify;
pub mod scheduler;
pub mod summarize;

use std::sync::Arc;
use std::time::Duration;

pub use monitor::{CycleObserver, CycleReport, Monitor, NewRelease, SilentObserver};
pub use notify::{Digest, DigestEntry, EmailNotifier, Notifier, render_digest};
pub use scheduler::{Scheduler, next_daily_run, staggered_time};
pub use summarize::{OllamaSummarizer, Summarizer};

use presswatch_extract::StrategyRegistry;
use presswatch_retrieve::Retriever;
use presswatch_shared::{AppConfig, Result, expand_path};
use presswatch_storage::Storage;

/// Build one monitor per configured source, wiring in the shared storage,
/// the resolved extraction strategy, and — where configured — the
/// summarization backend and notification channel.
pub fn build_monitors(config: &AppConfig, storage: Arc<Storage>) -> Result<Vec<Monitor>> {
    let registry = StrategyRegistry::new();

    let summarizer: Option<Arc<dyn Summarizer>> = if config.summarizer.enabled {
        Some(Arc::new(OllamaSummarizer::new(
            &config.summarizer.endpoint,
            &config.summarizer.model,
        )?))
    } else {
        None
    };

    let notifier: Option<Arc<dyn Notifier>> = match &config.email {
        Some(email) => Some(Arc::new(EmailNotifier::from_config(email)?)),
        None => None,
    };

    let timeout = Duration::from_secs(config.defaults.request_timeout_secs);
    let rate_limit = Duration::from_millis(config.defaults.rate_limit_ms);
    let download_dir = expand_path(&config.defaults.download_dir);

    config
        .sources
        .iter()
        .map(|source| {
            let strategy = registry.resolve(source.extractor.as_deref());
            let retriever = Retriever::new(&download_dir, timeout)?;
            let mut monitor = Monitor::new(
                source.clone(),
                strategy,
                storage.clone(),
                retriever,
                timeout,
                rate_limit,
            )?;
            if let Some(summarizer) = &summarizer {
                monitor = monitor.with_summarizer(summarizer.clone());
            }
            if let Some(notifier) = &notifier {
                monitor = monitor.with_notifier(notifier.clone());
            }
            Ok(monitor)
        })
        .collect()
}
