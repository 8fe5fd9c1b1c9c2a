//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use presswatch_core::{CycleObserver, CycleReport, Monitor, Scheduler, build_monitors};
use presswatch_extract::StrategyRegistry;
use presswatch_shared::{
    AppConfig, config_file_path, expand_path, init_config, load_config, load_config_from,
};
use presswatch_storage::Storage;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// PressWatch — watch press-release pages, keep only what's new.
#[derive(Parser)]
#[command(
    name = "presswatch",
    version,
    about = "Monitor company press-release pages and surface new releases.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Path to an alternate config file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run one monitoring cycle for one source, or for all configured sources.
    Check {
        /// Source name from the config. Omit to check every source.
        #[arg(short, long)]
        source: Option<String>,
    },

    /// Run every source once, then keep checking on the daily schedule.
    Watch,

    /// List configured sources and their resolved extraction strategies.
    Sources,

    /// Show recently recorded releases.
    Releases {
        /// Restrict to one source.
        #[arg(short, long)]
        source: Option<String>,

        /// Maximum number of releases to show.
        #[arg(short, long, default_value = "20")]
        limit: u32,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "presswatch=info",
        1 => "presswatch=debug",
        _ => "presswatch=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };

    match cli.command {
        Command::Check { source } => cmd_check(&config, source.as_deref()).await,
        Command::Watch => cmd_watch(&config).await,
        Command::Sources => cmd_sources(&config),
        Command::Releases { source, limit } => {
            cmd_releases(&config, source.as_deref(), limit).await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(&config),
        },
    }
}

// ---------------------------------------------------------------------------
// check / watch
// ---------------------------------------------------------------------------

async fn cmd_check(config: &AppConfig, source: Option<&str>) -> Result<()> {
    let monitors = prepare_monitors(config, source).await?;
    let single_source = source.is_some();

    for monitor in &monitors {
        let observer = CliObserver::new(monitor.source_name());
        match monitor.run_cycle(&observer).await {
            Ok(report) => {
                observer.finish();
                print_report(&report);
            }
            Err(e) => {
                observer.finish();
                if single_source {
                    return Err(eyre!(e));
                }
                // One source failing never blocks the rest of the batch.
                warn!(source = monitor.source_name(), error = %e, "check failed");
            }
        }
    }

    Ok(())
}

async fn cmd_watch(config: &AppConfig) -> Result<()> {
    let monitors = prepare_monitors(config, None).await?;

    info!(
        sources = monitors.len(),
        schedule_time = %config.defaults.schedule_time,
        "watching"
    );

    let scheduler = Scheduler::new(
        monitors,
        &config.defaults.schedule_time,
        config.defaults.stagger_minutes,
        Duration::from_secs(config.defaults.poll_interval_secs),
    )?;

    scheduler.run().await?;
    Ok(())
}

/// Open storage and build the monitors for `check`/`watch`, optionally
/// narrowed to one named source.
async fn prepare_monitors(config: &AppConfig, source: Option<&str>) -> Result<Vec<Monitor>> {
    if config.sources.is_empty() {
        return Err(eyre!(
            "no sources configured — add [[sources]] entries to {}",
            config_file_path()?.display()
        ));
    }

    let db_path = expand_path(&config.defaults.database_path);
    let storage = Arc::new(Storage::open(&db_path).await?);
    let monitors = build_monitors(config, storage)?;

    match source {
        None => Ok(monitors),
        Some(name) => {
            let selected: Vec<Monitor> = monitors
                .into_iter()
                .filter(|m| m.source_name() == name)
                .collect();
            if selected.is_empty() {
                return Err(eyre!("no configured source named '{name}'"));
            }
            Ok(selected)
        }
    }
}

fn print_report(report: &CycleReport) {
    println!();
    println!("  {}", report.source_name);
    println!("  Items found:   {}", report.items_extracted);
    println!("  New releases:  {}", report.new_releases.len());
    if !report.new_releases.is_empty() {
        println!("  Archived:      {}", report.pages_archived);
        println!("  Summarized:    {}", report.summaries_written);
        println!(
            "  Notified:      {}",
            if report.notified { "yes" } else { "no" }
        );
        for release in &report.new_releases {
            println!("    - {} ({})", release.item.title, release.item.link);
        }
    }
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress observer
// ---------------------------------------------------------------------------

/// Cycle observer using an indicatif spinner.
struct CliObserver {
    spinner: ProgressBar,
    source: String,
}

impl CliObserver {
    fn new(source: &str) -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self {
            spinner,
            source: source.to_string(),
        }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl CycleObserver for CliObserver {
    fn phase(&self, name: &str) {
        self.spinner.set_message(format!("{}: {name}", self.source));
    }

    fn new_release(&self, title: &str) {
        self.spinner.println(format!("  new: {title}"));
    }
}

// ---------------------------------------------------------------------------
// sources / releases
// ---------------------------------------------------------------------------

fn cmd_sources(config: &AppConfig) -> Result<()> {
    if config.sources.is_empty() {
        println!("No sources configured.");
        return Ok(());
    }

    let registry = StrategyRegistry::new();

    println!();
    for source in &config.sources {
        let strategy = registry.resolve(source.extractor.as_deref());
        println!("  {}", source.name);
        println!("    URL:      {}", source.url);
        println!("    Strategy: {}", strategy.name());
    }
    println!();
    println!("  Registered strategies: {}", registry.names().join(", "));
    println!();

    Ok(())
}

async fn cmd_releases(config: &AppConfig, source: Option<&str>, limit: u32) -> Result<()> {
    let db_path = expand_path(&config.defaults.database_path);
    if !db_path.exists() {
        return Err(eyre!(
            "no database at {} — run a check first",
            db_path.display()
        ));
    }

    let storage = Storage::open(&db_path).await?;
    let releases = storage.list_releases(source, limit).await?;

    if releases.is_empty() {
        println!("No releases recorded.");
        return Ok(());
    }

    println!();
    for release in &releases {
        let mut flags = Vec::new();
        if let Some(page) = storage.downloaded_page_for(release.id).await? {
            flags.push("archived");
            if storage
                .get_summary(page.id, &config.summarizer.model)
                .await?
                .is_some()
            {
                flags.push("summarized");
            }
        }
        let flags = if flags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", flags.join(", "))
        };

        println!("  {} — {}{flags}", release.date, release.title);
        println!(
            "    {} (source: {}, first seen {})",
            release.link,
            if release.source_name.is_empty() {
                "<legacy>"
            } else {
                &release.source_name
            },
            release.first_seen.format("%Y-%m-%d %H:%M")
        );
    }
    println!();

    Ok(())
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config written to {}", path.display());
    Ok(())
}

fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let rendered = toml::to_string_pretty(config)?;
    println!("{rendered}");
    Ok(())
}
