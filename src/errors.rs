//! Error types shared across the harness.

use std::fmt::{Display, Formatter};

/// Shared harness result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Harness error enumeration covering every fatal failure mode.
///
/// Per-frame protocol failures are not represented here; they are
/// [`DecodeError`](crate::protocol::codec::DecodeError)s and never leave
/// the frame that produced them.
#[derive(Debug)]
pub enum AppError {
    /// Command-line arguments could not be parsed.
    Argument(String),
    /// Configuration parsing or validation failure.
    Config(String),
    /// The worker executable could not be found or started.
    Spawn(String),
    /// WebSocket handshake failed (refused, rejected, or timed out).
    Connect(String),
    /// Operation rejected by the connection in its current state, or a
    /// transport failure on an established connection.
    Connection(String),
    /// Worker process supervision failure.
    Worker(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl AppError {
    /// Process exit code reported when this error ends the run.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Argument(_) | Self::Config(_) | Self::Connection(_) | Self::Io(_) => 1,
            Self::Spawn(_) => 2,
            Self::Connect(_) => 3,
            Self::Worker(_) => 4,
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Argument(msg) => write!(f, "argument: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Spawn(msg) => write!(f, "spawn: {msg}"),
            Self::Connect(msg) => write!(f, "connect: {msg}"),
            Self::Connection(msg) => write!(f, "connection: {msg}"),
            Self::Worker(msg) => write!(f, "worker: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
