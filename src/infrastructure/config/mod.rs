//! Application configuration.

pub mod app_config;
/// Command-line arguments.
pub mod args;
/// Config file location and persistence.
pub mod storage;

pub use app_config::{AppConfig, LogLevel};
pub use args::{CliArgs, Command};
pub use storage::{ConfigError, LoadedConfig, StorageManager};
