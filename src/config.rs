//! Harness configuration parsing, validation, and endpoint construction.

use std::fmt::{Display, Formatter};
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::{AppError, Result};

/// URL scheme spoken by the worker. Only plain WebSocket is supported.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum Scheme {
    /// Unencrypted WebSocket (`ws://`).
    #[default]
    Ws,
}

impl Display for Scheme {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ws => f.write_str("ws"),
        }
    }
}

/// Address of the worker's WebSocket server. Immutable once built.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Endpoint {
    host: String,
    port: u16,
    scheme: Scheme,
}

impl Endpoint {
    /// Build a `ws://` endpoint for `host:port`.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            scheme: Scheme::Ws,
        }
    }

    /// Host name or address.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// TCP port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// URL scheme.
    #[must_use]
    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Full WebSocket URL, always rooted at `/`.
    #[must_use]
    pub fn url(&self) -> String {
        format!("{}://{}:{}/", self.scheme, self.host, self.port)
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::new(DEFAULT_ADDRESS, DEFAULT_PORT)
    }
}

/// Default worker address.
pub const DEFAULT_ADDRESS: &str = "localhost";

/// Default worker port.
pub const DEFAULT_PORT: u16 = 8080;

/// How the worker process is launched and stopped.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", default)]
pub struct WorkerConfig {
    /// Program to execute, resolved through `PATH`.
    pub command: String,
    /// Arguments passed to the program.
    pub args: Vec<String>,
    /// Delay between spawning the worker and opening the connection.
    pub startup_delay_ms: u64,
    /// Time the worker gets to exit after `SIGTERM` before it is killed.
    pub terminate_grace_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            command: "python3".into(),
            args: vec!["graxpert_moc.py".into()],
            startup_delay_ms: 1000,
            terminate_grace_ms: 2000,
        }
    }
}

impl WorkerConfig {
    /// Delay before connecting.
    #[must_use]
    pub fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.startup_delay_ms)
    }

    /// Grace period between `SIGTERM` and a hard kill.
    #[must_use]
    pub fn terminate_grace(&self) -> Duration {
        Duration::from_millis(self.terminate_grace_ms)
    }
}

/// WebSocket connection timing.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", default)]
pub struct ConnectionConfig {
    /// Upper bound on the handshake.
    pub connect_timeout_seconds: u64,
    /// How long `close` waits for the peer's close reply.
    pub close_timeout_ms: u64,
    /// Delay between reaching `Open` and sending the request.
    pub send_delay_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout_seconds: 10,
            close_timeout_ms: 2000,
            send_delay_ms: 1000,
        }
    }
}

impl ConnectionConfig {
    /// Handshake timeout.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    /// Close reply timeout.
    #[must_use]
    pub fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.close_timeout_ms)
    }

    /// Delay before the request is sent.
    #[must_use]
    pub fn send_delay(&self) -> Duration {
        Duration::from_millis(self.send_delay_ms)
    }
}

/// Contents of the single request sent per run.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", default)]
pub struct RequestConfig {
    /// File the worker is asked to process.
    pub filename: String,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            filename: "some_file".into(),
        }
    }
}

/// Harness configuration parsed from an optional TOML file.
///
/// Every key has a default, so an empty document is valid.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", default)]
pub struct HarnessConfig {
    /// Worker process settings.
    pub worker: WorkerConfig,
    /// WebSocket timing settings.
    pub connection: ConnectionConfig,
    /// Outbound request contents.
    pub request: RequestConfig,
}

impl HarnessConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.worker.command.trim().is_empty() {
            return Err(AppError::Config("worker.command must not be empty".into()));
        }

        if self.connection.connect_timeout_seconds == 0 {
            return Err(AppError::Config(
                "connection.connect_timeout_seconds must be greater than zero".into(),
            ));
        }

        Ok(())
    }
}
