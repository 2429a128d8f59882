use super::app_config::LogLevel;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments; any option given here overrides the config file.
#[derive(Debug, Parser)]
#[command(
    name = "imgbind",
    version,
    about = "Fetch and cache remote images",
    long_about = None
)]
pub struct CliArgs {
    /// Configuration file path.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log file path.
    #[arg(long, value_name = "PATH")]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Disk cache directory.
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Base URL that relative image paths are resolved against.
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,

    /// Maximum concurrent downloads.
    #[arg(long)]
    pub workers: Option<usize>,

    /// Per-request timeout in seconds.
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Action to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Download images through the cache and report what each one resolved to.
    Fetch {
        /// Image URLs, absolute or relative to the base URL.
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Remove every entry from the disk cache.
    ClearDisk,
    /// Show disk cache usage.
    Stats,
}
