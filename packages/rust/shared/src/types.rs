//! Core domain types for the PressWatch monitoring pipeline.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ---------------------------------------------------------------------------
// Fingerprint engine
// ---------------------------------------------------------------------------

/// Derive a stable content identity from an item's core fields.
///
/// The digest is a hex SHA-256 over `title|link|summary|date`. Every
/// extraction strategy and the dedup check compute it through this one
/// function, so the value is identical across runs and platforms. It serves
/// as a secondary uniqueness signal because some sources vary link formatting
/// between fetches while the textual content stays constant.
pub fn fingerprint(title: &str, link: &str, summary: &str, date: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update(b"|");
    hasher.update(link.as_bytes());
    hasher.update(b"|");
    hasher.update(summary.as_bytes());
    hasher.update(b"|");
    hasher.update(date.as_bytes());
    format!("{:x}", hasher.finalize())
}

// ---------------------------------------------------------------------------
// Item
// ---------------------------------------------------------------------------

/// A single candidate press release extracted from one fetch, before any
/// persistence decision. Ephemeral: created per cycle and discarded after
/// the dedup/persist step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    /// Headline text. Always non-empty; strategies drop title-less candidates.
    pub title: String,
    /// Absolute URL of the release page.
    pub link: String,
    /// Short teaser text from the listing page, empty when absent.
    pub summary: String,
    /// Publication date as displayed by the source, free-form.
    pub date: String,
    /// Stable digest over the other four fields (see [`fingerprint`]).
    pub content_hash: String,
}

impl Item {
    /// Build an item, defaulting a missing summary to empty and a missing
    /// date to today's date, and deriving the content hash.
    pub fn new(
        title: impl Into<String>,
        link: impl Into<String>,
        summary: Option<String>,
        date: Option<String>,
    ) -> Self {
        let title = title.into();
        let link = link.into();
        let summary = summary.unwrap_or_default();
        let date = date.unwrap_or_else(today);
        let content_hash = fingerprint(&title, &link, &summary, &date);
        Self {
            title,
            link,
            summary,
            date,
            content_hash,
        }
    }
}

/// Today's date in the `%Y-%m-%d` form used for defaulted item dates.
pub fn today() -> String {
    Local::now().format("%Y-%m-%d").to_string()
}

// ---------------------------------------------------------------------------
// Persistent records
// ---------------------------------------------------------------------------

/// A persisted, deduplicated item associated with a source.
///
/// Created once per distinct `(source_name, link)`; after that only
/// `last_checked` ever changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseRecord {
    pub id: i64,
    /// Identity of the monitored source. Empty for rows that predate the
    /// multi-source schema.
    pub source_name: String,
    pub title: String,
    pub link: String,
    pub summary: String,
    pub date: String,
    pub content_hash: String,
    /// When the record was first persisted.
    pub first_seen: DateTime<Utc>,
    /// Updated on every re-observation of the same item.
    pub last_checked: DateTime<Utc>,
}

/// Archived full content for a release, created only after the owning record
/// is confirmed new. `press_release_id` is a weak reference: deleting the
/// parent record does not cascade here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadedPage {
    pub id: i64,
    pub press_release_id: i64,
    pub html_path: String,
    /// Path of the extracted-text rendition, absent when extraction failed.
    pub text_path: Option<String>,
    pub download_date: DateTime<Utc>,
}

/// A generated summary, cached per `(content_id, model_name)`.
/// `content_id` weakly references the downloaded page the text came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSummary {
    pub id: i64,
    pub content_id: i64,
    pub summary_text: String,
    pub model_name: String,
    pub created_at: DateTime<Utc>,
}
