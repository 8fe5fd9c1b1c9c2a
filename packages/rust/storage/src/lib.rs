//! libSQL record store for discovered releases, downloaded-content linkage,
//! and cached summaries.
//!
//! The [`Storage`] struct owns schema evolution: migrations are versioned,
//! applied in order on open, and recorded (see [`migrations`]). A legacy
//! single-source database produced by the original tool is adopted and
//! upgraded in place — all pre-existing rows survive with an empty
//! `source_name`, and the uniqueness constraint is rebuilt to be scoped per
//! source.

mod migrations;

use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};
use libsql::{Connection, Database, params};
use presswatch_shared::{DownloadedPage, Item, PressWatchError, ReleaseRecord, Result};

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

impl Storage {
    /// Open or create a database at `path` and bring its schema up to date.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| PressWatchError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| PressWatchError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| PressWatchError::Storage(e.to_string()))?;

        let storage = Self { db, conn };
        storage.ensure_schema().await?;
        Ok(storage)
    }

    /// Apply pending schema migrations. Idempotent: safe to call repeatedly
    /// and safe against a legacy store that predates version tracking.
    pub async fn ensure_schema(&self) -> Result<()> {
        let current_version = self.schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    PressWatchError::Storage(format!(
                        "migration v{} failed: {e}",
                        migration.version
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    // -----------------------------------------------------------------------
    // Release records
    // -----------------------------------------------------------------------

    /// Whether an item matching this link or content hash is already recorded
    /// for the source.
    pub async fn is_known(
        &self,
        source_name: &str,
        link: &str,
        content_hash: &str,
    ) -> Result<bool> {
        let mut rows = self
            .conn
            .query(
                "SELECT 1 FROM press_releases
                 WHERE source_name = ?1 AND (link = ?2 OR content_hash = ?3)
                 LIMIT 1",
                params![source_name, link, content_hash],
            )
            .await
            .map_err(|e| PressWatchError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(_)) => Ok(true),
            Ok(None) => Ok(false),
            Err(e) => Err(PressWatchError::Storage(e.to_string())),
        }
    }

    /// Atomic check-then-insert-or-touch for one extracted item.
    ///
    /// Returns `(record_id, is_new)`. If no record for the source matches the
    /// item's link or content hash, a new record is inserted with
    /// `first_seen = last_checked = now`. Otherwise only `last_checked` is
    /// updated — title, summary, and date are never overwritten once set.
    /// The whole sequence runs in a single transaction so a concurrent
    /// process sharing the file cannot race it into a duplicate insert.
    pub async fn upsert(&self, item: &Item, source_name: &str) -> Result<(i64, bool)> {
        let now = Utc::now().to_rfc3339();

        let tx = self
            .conn
            .transaction()
            .await
            .map_err(|e| PressWatchError::Storage(e.to_string()))?;

        let existing_id = {
            let mut rows = tx
                .query(
                    "SELECT id FROM press_releases
                     WHERE source_name = ?1 AND (link = ?2 OR content_hash = ?3)
                     LIMIT 1",
                    params![source_name, item.link.as_str(), item.content_hash.as_str()],
                )
                .await
                .map_err(|e| PressWatchError::Storage(e.to_string()))?;

            match rows.next().await {
                Ok(Some(row)) => Some(
                    row.get::<i64>(0)
                        .map_err(|e| PressWatchError::Storage(e.to_string()))?,
                ),
                Ok(None) => None,
                Err(e) => return Err(PressWatchError::Storage(e.to_string())),
            }
        };

        let (id, is_new) = match existing_id {
            Some(id) => {
                tx.execute(
                    "UPDATE press_releases SET last_checked = ?1 WHERE id = ?2",
                    params![now.as_str(), id],
                )
                .await
                .map_err(|e| PressWatchError::Storage(e.to_string()))?;
                (id, false)
            }
            None => {
                tx.execute(
                    "INSERT INTO press_releases
                     (source_name, title, link, summary, date, content_hash, first_seen, last_checked)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        source_name,
                        item.title.as_str(),
                        item.link.as_str(),
                        item.summary.as_str(),
                        item.date.as_str(),
                        item.content_hash.as_str(),
                        now.as_str(),
                        now.as_str(),
                    ],
                )
                .await
                .map_err(|e| PressWatchError::Storage(e.to_string()))?;
                (tx.last_insert_rowid(), true)
            }
        };

        tx.commit()
            .await
            .map_err(|e| PressWatchError::Storage(e.to_string()))?;

        Ok((id, is_new))
    }

    /// Get a release record by ID.
    pub async fn get_release(&self, id: i64) -> Result<Option<ReleaseRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, source_name, title, link, summary, date, content_hash,
                        first_seen, last_checked
                 FROM press_releases WHERE id = ?1",
                params![id],
            )
            .await
            .map_err(|e| PressWatchError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_release(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(PressWatchError::Storage(e.to_string())),
        }
    }

    /// List recent release records, newest first, optionally scoped to one source.
    pub async fn list_releases(
        &self,
        source_name: Option<&str>,
        limit: u32,
    ) -> Result<Vec<ReleaseRecord>> {
        let mut rows = match source_name {
            Some(source) => self
                .conn
                .query(
                    "SELECT id, source_name, title, link, summary, date, content_hash,
                            first_seen, last_checked
                     FROM press_releases WHERE source_name = ?1
                     ORDER BY first_seen DESC LIMIT ?2",
                    params![source, limit],
                )
                .await,
            None => self
                .conn
                .query(
                    "SELECT id, source_name, title, link, summary, date, content_hash,
                            first_seen, last_checked
                     FROM press_releases
                     ORDER BY first_seen DESC LIMIT ?1",
                    params![limit],
                )
                .await,
        }
        .map_err(|e| PressWatchError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_release(&row)?);
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Downloaded-content linkage
    // -----------------------------------------------------------------------

    /// Record the archived content files for a release. Returns the new row ID.
    pub async fn link_downloaded_content(
        &self,
        record_id: i64,
        html_path: &str,
        text_path: Option<&str>,
    ) -> Result<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO downloaded_pages (press_release_id, html_path, text_path, download_date)
                 VALUES (?1, ?2, ?3, ?4)",
                params![record_id, html_path, text_path, now.as_str()],
            )
            .await
            .map_err(|e| PressWatchError::Storage(e.to_string()))?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Get the archived content entry for a release, if one exists.
    pub async fn downloaded_page_for(&self, record_id: i64) -> Result<Option<DownloadedPage>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, press_release_id, html_path, text_path, download_date
                 FROM downloaded_pages WHERE press_release_id = ?1
                 ORDER BY download_date DESC LIMIT 1",
                params![record_id],
            )
            .await
            .map_err(|e| PressWatchError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(DownloadedPage {
                id: row
                    .get::<i64>(0)
                    .map_err(|e| PressWatchError::Storage(e.to_string()))?,
                press_release_id: row
                    .get::<i64>(1)
                    .map_err(|e| PressWatchError::Storage(e.to_string()))?,
                html_path: row
                    .get::<String>(2)
                    .map_err(|e| PressWatchError::Storage(e.to_string()))?,
                text_path: row.get::<String>(3).ok(),
                download_date: parse_timestamp(&row.get::<String>(4).unwrap_or_default()),
            })),
            Ok(None) => Ok(None),
            Err(e) => Err(PressWatchError::Storage(e.to_string())),
        }
    }

    // -----------------------------------------------------------------------
    // Summary cache
    // -----------------------------------------------------------------------

    /// Get a cached summary for `(content_id, model_name)`.
    pub async fn get_summary(
        &self,
        content_id: i64,
        model_name: &str,
    ) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query(
                "SELECT summary FROM article_summaries
                 WHERE content_id = ?1 AND model_name = ?2",
                params![content_id, model_name],
            )
            .await
            .map_err(|e| PressWatchError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let summary: String = row
                    .get(0)
                    .map_err(|e| PressWatchError::Storage(e.to_string()))?;
                Ok(Some(summary))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(PressWatchError::Storage(e.to_string())),
        }
    }

    /// Persist a generated summary.
    pub async fn insert_summary(
        &self,
        content_id: i64,
        model_name: &str,
        summary_text: &str,
    ) -> Result<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT OR IGNORE INTO article_summaries (content_id, summary, model_name, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![content_id, summary_text, model_name, now.as_str()],
            )
            .await
            .map_err(|e| PressWatchError::Storage(e.to_string()))?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Return the cached summary for `(content_id, model_name)`, or invoke
    /// `generate` on the content text, persist the result, and return it.
    /// The generator is only ever called on a cache miss.
    pub async fn find_or_create_summary<F, Fut>(
        &self,
        content_id: i64,
        model_name: &str,
        content_text: &str,
        generate: F,
    ) -> Result<String>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<String>>,
    {
        if let Some(existing) = self.get_summary(content_id, model_name).await? {
            tracing::debug!(content_id, model_name, "summary cache hit");
            return Ok(existing);
        }

        let summary = generate(content_text.to_string()).await?;
        self.insert_summary(content_id, model_name, &summary).await?;
        Ok(summary)
    }
}

/// Convert a database row to a [`ReleaseRecord`].
fn row_to_release(row: &libsql::Row) -> Result<ReleaseRecord> {
    Ok(ReleaseRecord {
        id: row
            .get::<i64>(0)
            .map_err(|e| PressWatchError::Storage(e.to_string()))?,
        source_name: row.get::<String>(1).unwrap_or_default(),
        title: row.get::<String>(2).unwrap_or_default(),
        link: row.get::<String>(3).unwrap_or_default(),
        summary: row.get::<String>(4).unwrap_or_default(),
        date: row.get::<String>(5).unwrap_or_default(),
        content_hash: row.get::<String>(6).unwrap_or_default(),
        first_seen: parse_timestamp(&row.get::<String>(7).unwrap_or_default()),
        last_checked: parse_timestamp(&row.get::<String>(8).unwrap_or_default()),
    })
}

/// Parse a stored timestamp, tolerating the legacy tool's naive
/// `%Y-%m-%d %H:%M:%S` format and empty values from migrated rows.
fn parse_timestamp(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return naive.and_utc();
    }
    DateTime::<Utc>::UNIX_EPOCH
}
