//! WebSocket connection lifecycle.
//!
//! A [`Connection`] is created by a successful handshake and is `Open` from
//! the moment it is returned. Inbound traffic is not polled by the owner:
//! a reader task registered during [`Connection::connect`] pushes every
//! frame and the peer's close onto the run loop's event queue.
//!
//! Submodules:
//! - `state`: [`ConnectionState`] and its legal transitions.
//! - `reader`: the inbound reader task and [`Frame`].

pub mod reader;
pub mod state;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::error::ProtocolError;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{ConnectionConfig, Endpoint};
use crate::harness::LoopEvent;
use crate::{AppError, Result};

pub use reader::Frame;
pub use state::ConnectionState;

pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// The single WebSocket session of a run.
pub struct Connection {
    url: String,
    state: ConnectionState,
    sink: Option<SplitSink<WsStream, Message>>,
    reader: Option<JoinHandle<()>>,
    peer_closed: Arc<AtomicBool>,
    cancel: CancellationToken,
    close_timeout: Duration,
}

impl Connection {
    /// Perform the WebSocket handshake with `endpoint`.
    ///
    /// On success the connection is `Open` and its reader task is already
    /// forwarding inbound traffic to `events`, so no frame can be missed
    /// between the handshake and the first send.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Connect` if the TCP connection is refused, the
    /// upgrade is rejected, or the handshake does not finish within
    /// `config.connect_timeout_seconds`.
    pub async fn connect(
        endpoint: &Endpoint,
        config: &ConnectionConfig,
        events: mpsc::UnboundedSender<LoopEvent>,
    ) -> Result<Self> {
        let url = endpoint.url();
        let timeout = config.connect_timeout();
        debug!(url, state = %ConnectionState::Connecting, "opening websocket");

        let (stream, response) =
            match tokio::time::timeout(timeout, connect_async(url.as_str())).await {
                Ok(Ok(pair)) => pair,
                Ok(Err(err)) => return Err(AppError::Connect(format!("{url}: {err}"))),
                Err(_elapsed) => {
                    return Err(AppError::Connect(format!(
                        "{url}: handshake timed out after {timeout:?}"
                    )))
                }
            };

        info!(
            url,
            status = response.status().as_u16(),
            "websocket connection open"
        );

        let (sink, stream) = stream.split();
        let peer_closed = Arc::new(AtomicBool::new(false));
        let cancel = CancellationToken::new();
        let reader = tokio::spawn(reader::run_reader(
            stream,
            events,
            Arc::clone(&peer_closed),
            cancel.clone(),
        ));

        Ok(Self {
            url,
            state: ConnectionState::Open,
            sink: Some(sink),
            reader: Some(reader),
            peer_closed,
            cancel,
            close_timeout: config.close_timeout(),
        })
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// URL this connection was opened against.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Transmit one text frame. Nothing is awaited from the peer.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Connection` if the connection is not `Open`, or if
    /// the frame cannot be written to the socket.
    pub async fn send(&mut self, text: String) -> Result<()> {
        if !self.state.can_send() {
            return Err(AppError::Connection(format!(
                "send rejected: connection is {}",
                self.state
            )));
        }

        let sink = self
            .sink
            .as_mut()
            .ok_or_else(|| AppError::Connection("send rejected: socket released".into()))?;

        sink.send(Message::Text(text.into()))
            .await
            .map_err(|err| AppError::Connection(format!("send failed: {err}")))
    }

    /// Close the connection with `code`: `Open → Closing → Closed`.
    ///
    /// Sends a close frame, or flushes the owed reply when the peer closed
    /// first, then waits up to the close timeout for the reader to observe
    /// the end of the stream before releasing the socket. A no-op unless the
    /// connection is `Open`.
    pub async fn close(&mut self, code: CloseCode) {
        if self.state != ConnectionState::Open {
            debug!(url = self.url, state = %self.state, "close: nothing to do");
            return;
        }
        self.transition(ConnectionState::Closing);

        if let Some(mut sink) = self.sink.take() {
            if self.peer_closed.load(Ordering::Acquire) {
                debug!(url = self.url, "acknowledging peer close");
            } else {
                let frame = CloseFrame {
                    code,
                    reason: String::new().into(),
                };
                if let Err(err) = sink.send(Message::Close(Some(frame))).await {
                    log_close_error(&err);
                }
            }

            if let Err(err) = sink.close().await {
                log_close_error(&err);
            }
        }

        if let Some(mut reader) = self.reader.take() {
            if tokio::time::timeout(self.close_timeout, &mut reader)
                .await
                .is_err()
            {
                warn!(
                    url = self.url,
                    "peer did not finish the close handshake in time"
                );
                reader.abort();
            }
        }

        self.release();
        info!(url = self.url, code = u16::from(code), "websocket connection closed");
    }

    /// Drop the connection without a close handshake (error edge to
    /// `Closed`). A no-op once the connection is closing or closed.
    pub fn abort(&mut self, reason: &str) {
        if !matches!(
            self.state,
            ConnectionState::Connecting | ConnectionState::Open
        ) {
            return;
        }
        warn!(url = self.url, reason, "websocket connection aborted");
        self.release();
    }

    /// Release the socket and the reader task, ending in `Closed`.
    fn release(&mut self) {
        self.cancel.cancel();
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        self.sink = None;
        self.transition(ConnectionState::Closed);
    }

    fn transition(&mut self, next: ConnectionState) {
        if !self.state.can_transition_to(next) {
            warn!(from = %self.state, to = %next, "ignoring illegal connection transition");
            return;
        }
        debug!(url = self.url, from = %self.state, to = %next, "connection state change");
        self.state = next;
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("url", &self.url)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

/// Errors raised while closing an already-closing socket are expected.
fn log_close_error(err: &WsError) {
    match err {
        WsError::ConnectionClosed
        | WsError::AlreadyClosed
        | WsError::Protocol(ProtocolError::SendAfterClosing) => {
            debug!(%err, "close: socket already closing");
        }
        _ => warn!(%err, "close: failed to complete close handshake"),
    }
}
