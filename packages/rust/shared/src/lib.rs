//! Shared types, error model, and configuration for PressWatch.
//!
//! This crate is the foundation depended on by all other PressWatch crates.
//! It provides:
//! - [`PressWatchError`] — the unified error type
//! - Domain types ([`Item`], [`ReleaseRecord`], [`DownloadedPage`], [`StoredSummary`])
//! - The [`fingerprint`] engine used for content identity
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, EmailConfig, SourceConfig, SummarizerConfig, config_dir,
    config_file_path, expand_path, init_config, load_config, load_config_from,
    resolve_smtp_password,
};
pub use error::{PressWatchError, Result};
pub use types::{DownloadedPage, Item, ReleaseRecord, StoredSummary, fingerprint, today};
