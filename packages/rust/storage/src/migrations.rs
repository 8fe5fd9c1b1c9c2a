//! SQL migration definitions for the PressWatch database.
//!
//! Migrations are applied in ascending version order on database open and
//! recorded in `schema_migrations`. Each migration's statements are written
//! to be idempotent, so replaying against a store that already has the
//! tables (e.g. one created by the legacy single-source tool, which predates
//! version tracking) adopts it instead of failing.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "Legacy single-source schema: press_releases keyed by link",
            sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- The original single-source table. A pre-existing store created by the
-- legacy tool already has exactly this shape, so CREATE IF NOT EXISTS
-- adopts it and the v2 upgrade below takes it from there.
CREATE TABLE IF NOT EXISTS press_releases (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    title        TEXT,
    link         TEXT UNIQUE,
    summary      TEXT,
    date         TEXT,
    content_hash TEXT,
    first_seen   TEXT,
    last_checked TEXT
);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
        },
        Migration {
            version: 2,
            description: "Multi-source upgrade: add source_name, uniqueness scoped per source",
            sql: r#"
-- SQLite cannot alter a UNIQUE constraint in place, so rebuild the table.
-- All existing rows are preserved; rows that predate the upgrade keep an
-- empty source_name.
CREATE TABLE IF NOT EXISTS press_releases_new (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    source_name  TEXT NOT NULL DEFAULT '',
    title        TEXT NOT NULL DEFAULT '',
    link         TEXT NOT NULL DEFAULT '',
    summary      TEXT NOT NULL DEFAULT '',
    date         TEXT NOT NULL DEFAULT '',
    content_hash TEXT NOT NULL DEFAULT '',
    first_seen   TEXT NOT NULL DEFAULT '',
    last_checked TEXT NOT NULL DEFAULT ''
);

INSERT INTO press_releases_new
    (id, source_name, title, link, summary, date, content_hash, first_seen, last_checked)
SELECT
    id,
    '',
    COALESCE(title, ''),
    COALESCE(link, ''),
    COALESCE(summary, ''),
    COALESCE(date, ''),
    COALESCE(content_hash, ''),
    COALESCE(first_seen, ''),
    COALESCE(last_checked, '')
FROM press_releases;

DROP TABLE press_releases;
ALTER TABLE press_releases_new RENAME TO press_releases;

CREATE UNIQUE INDEX IF NOT EXISTS idx_press_releases_source_link
    ON press_releases(source_name, link);
CREATE INDEX IF NOT EXISTS idx_press_releases_source_hash
    ON press_releases(source_name, content_hash);

INSERT INTO schema_migrations (version) VALUES (2);
"#,
        },
        Migration {
            version: 3,
            description: "Downloaded-content linkage and summary cache tables",
            sql: r#"
-- Archived page content. press_release_id is a weak reference: parent
-- deletion does not cascade here.
CREATE TABLE IF NOT EXISTS downloaded_pages (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    press_release_id INTEGER NOT NULL REFERENCES press_releases(id),
    html_path        TEXT NOT NULL,
    text_path        TEXT,
    download_date    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_downloaded_pages_release
    ON downloaded_pages(press_release_id);

-- Generated summaries, one per (content_id, model_name).
CREATE TABLE IF NOT EXISTS article_summaries (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    content_id INTEGER NOT NULL,
    summary    TEXT NOT NULL,
    model_name TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_article_summaries_content
    ON article_summaries(content_id);
CREATE UNIQUE INDEX IF NOT EXISTS idx_article_summaries_content_model
    ON article_summaries(content_id, model_name);

INSERT INTO schema_migrations (version) VALUES (3);
"#,
        },
    ]
}
