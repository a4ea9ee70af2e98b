//! CLI parser and command dispatch.

mod commands;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use crate::config::Config;

#[derive(Parser)]
#[command(name = "coursegrab")]
#[command(about = "Resumable scraper for login- and challenge-gated course outlines")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Cache file path (overrides config)
    #[arg(long, global = true)]
    cache: Option<PathBuf>,

    /// First week to scrape (overrides config)
    #[arg(long, global = true)]
    from: Option<u32>,

    /// Last week to scrape, inclusive (overrides config)
    #[arg(long, global = true)]
    to: Option<u32>,

    /// Run the browser headless
    #[arg(long, global = true)]
    headless: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch missing pages, save the cache and print the outline
    Run {
        /// Also write the extracted modules as JSON
        #[arg(long)]
        json: Option<PathBuf>,
    },

    /// Print the outline from cached pages only (no browser)
    Report {
        /// Also write the extracted modules as JSON
        #[arg(long)]
        json: Option<PathBuf>,
    },

    /// Show cached and pending pages
    Status,
}

/// Resolved configuration for one invocation.
pub(crate) struct Settings {
    pub config: Config,
    /// Directory relative paths resolve against.
    pub base_dir: PathBuf,
    pub cache_path: PathBuf,
    pub requested: Vec<String>,
}

impl Cli {
    async fn settings(&self) -> anyhow::Result<Settings> {
        let mut config = match self.config {
            Some(ref path) => Config::load_from_path(path).await,
            None => Config::load().await,
        }
        .map_err(anyhow::Error::msg)
        .context("Failed to load configuration")?;

        let base_dir = match config.base_dir() {
            Some(dir) => dir,
            None => std::env::current_dir().context("Failed to determine working directory")?,
        };

        if let Some(from) = self.from {
            config.course.from_week = from;
        }
        if let Some(to) = self.to {
            config.course.to_week = to;
        }
        if self.headless {
            config.browser.headless = true;
        }
        config.resolve_extension(&base_dir);

        config
            .validate()
            .map_err(anyhow::Error::msg)
            .context("Invalid configuration")?;

        // Flags are relative to the shell, config entries to the config file.
        let cache_path = match self.cache {
            Some(ref path) => {
                let cwd = std::env::current_dir().context("Failed to determine working directory")?;
                config.resolve_path(&path.to_string_lossy(), &cwd)
            }
            None => config.cache_file(&base_dir),
        };
        let requested = config.course.urls();

        Ok(Settings {
            config,
            base_dir,
            cache_path,
            requested,
        })
    }
}

/// Parse arguments and run the selected command.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = cli.settings().await?;

    match cli.command {
        Commands::Run { json } => commands::cmd_run(&settings, json.as_deref()).await,
        Commands::Report { json } => commands::cmd_report(&settings, json.as_deref()),
        Commands::Status => commands::cmd_status(&settings),
    }
}
