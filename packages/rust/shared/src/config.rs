//! Application configuration for PressWatch.
//!
//! User config lives at `~/.presswatch/presswatch.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PressWatchError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "presswatch.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".presswatch";

// ---------------------------------------------------------------------------
// Config structs (matching presswatch.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Summarization backend settings.
    #[serde(default)]
    pub summarizer: SummarizerConfig,

    /// Email notification settings. Absent means notifications are a no-op.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<EmailConfig>,

    /// Monitored sources.
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Path of the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Directory where downloaded pages are archived.
    #[serde(default = "default_download_dir")]
    pub download_dir: String,

    /// Daily run time for the first source, `HH:MM` local time.
    #[serde(default = "default_schedule_time")]
    pub schedule_time: String,

    /// Minutes added per source to stagger daily runs.
    #[serde(default = "default_stagger_minutes")]
    pub stagger_minutes: u32,

    /// Seconds the scheduler sleeps between due-job checks.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Minimum ms between full-content downloads within one cycle.
    #[serde(default = "default_rate_limit")]
    pub rate_limit_ms: u64,

    /// Timeout in seconds for each HTTP request.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            download_dir: default_download_dir(),
            schedule_time: default_schedule_time(),
            stagger_minutes: default_stagger_minutes(),
            poll_interval_secs: default_poll_interval_secs(),
            rate_limit_ms: default_rate_limit(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_database_path() -> String {
    "~/.presswatch/press_releases.db".into()
}
fn default_download_dir() -> String {
    "~/.presswatch/pages".into()
}
fn default_schedule_time() -> String {
    "09:00".into()
}
fn default_stagger_minutes() -> u32 {
    5
}
fn default_poll_interval_secs() -> u64 {
    60
}
fn default_rate_limit() -> u64 {
    1000
}
fn default_request_timeout_secs() -> u64 {
    30
}

/// `[summarizer]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizerConfig {
    /// Whether new releases get summarized at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Base URL of the Ollama server.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Model identifier passed to the generate API.
    #[serde(default = "default_model")]
    pub model: String,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: default_endpoint(),
            model: default_model(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_endpoint() -> String {
    "http://localhost:11434".into()
}
fn default_model() -> String {
    "llama3.2".into()
}

/// `[email]` section. Presence of the section enables the digest email.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    /// SMTP relay hostname.
    pub smtp_server: String,

    /// SMTP port (implicit-TLS submission).
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    /// Login username.
    pub username: String,

    /// Name of the env var holding the password (never store the secret itself).
    #[serde(default = "default_password_env")]
    pub password_env: String,

    /// Sender address.
    pub from: String,

    /// Recipient address.
    pub to: String,
}

fn default_smtp_port() -> u16 {
    465
}
fn default_password_env() -> String {
    "PRESSWATCH_SMTP_PASSWORD".into()
}

/// `[[sources]]` entry — one monitored press-release page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Human-readable source name, also the persistence scope.
    pub name: String,
    /// URL of the listing page to monitor.
    pub url: String,
    /// Named extraction strategy. `None` uses the generic fallback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extractor: Option<String>,
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.presswatch/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| PressWatchError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.presswatch/presswatch.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| PressWatchError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        PressWatchError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| PressWatchError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| PressWatchError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| PressWatchError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Expand a leading `~/` in a configured path to the user's home directory.
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Resolve the SMTP password from the configured env var.
pub fn resolve_smtp_password(config: &EmailConfig) -> Result<String> {
    let var_name = &config.password_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(PressWatchError::config(format!(
            "SMTP password not found. Set the {var_name} environment variable \
             or remove the [email] section to disable notifications."
        ))),
    }
}
