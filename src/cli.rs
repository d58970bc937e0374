//! Command-line interface.
//!
//! Parsed with `clap` derive. Flags override the matching keys of the
//! optional TOML configuration file.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::{Endpoint, HarnessConfig, DEFAULT_ADDRESS, DEFAULT_PORT};
use crate::{AppError, Result};

/// Log output format.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// `worker-harness` command line.
#[derive(Debug, Parser)]
#[command(
    name = "worker-harness",
    about = "WebSocket testing client for the image-processing worker",
    version,
    long_about = None
)]
pub struct Cli {
    /// Websocket server address.
    #[arg(short, long, default_value = DEFAULT_ADDRESS)]
    pub address: String,

    /// Websocket server port.
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Path to an optional TOML configuration file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// File name sent in the `PROCESS_IMAGE_REQUEST`.
    #[arg(long)]
    pub filename: Option<String>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Cli {
    /// Build the endpoint and the effective configuration.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Argument` if the address is blank, or
    /// `AppError::Config` if the configuration file cannot be loaded.
    pub fn resolve(&self) -> Result<(Endpoint, HarnessConfig)> {
        if self.address.trim().is_empty() {
            return Err(AppError::Argument("address must not be empty".into()));
        }

        let mut config = match &self.config {
            Some(path) => HarnessConfig::load_from_path(path)?,
            None => HarnessConfig::default(),
        };

        if let Some(filename) = &self.filename {
            config.request.filename.clone_from(filename);
        }

        Ok((Endpoint::new(self.address.clone(), self.port), config))
    }
}
