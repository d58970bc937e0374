//! Connection lifecycle states and the legal edges between them.

use std::fmt::{Display, Formatter};

/// Lifecycle of the single WebSocket session.
///
/// ```text
/// Connecting ──► Open ──► Closing ──► Closed
///      │          │                     ▲
///      └──────────┴──── (error) ────────┘
/// ```
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ConnectionState {
    /// Handshake in progress.
    Connecting,
    /// Handshake complete; frames flow both ways.
    Open,
    /// Close frame sent or being acknowledged.
    Closing,
    /// Socket released. Terminal.
    Closed,
}

impl ConnectionState {
    /// Only an open connection accepts outbound frames.
    #[must_use]
    pub fn can_send(self) -> bool {
        self == Self::Open
    }

    /// Whether moving from `self` to `next` is a legal edge.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Connecting | Self::Closing, Self::Closed)
                | (Self::Connecting, Self::Open)
                | (Self::Open, Self::Closing | Self::Closed)
        )
    }
}

impl Display for ConnectionState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}
