//! WebSocket reader task.
//!
//! Drains the read half of the socket and turns every inbound message into
//! a [`LoopEvent`] on the run loop's queue. The run loop never polls the
//! socket itself; it only sees what this task forwards.
//!
//! | WebSocket message | Forwarded as                          |
//! |-------------------|---------------------------------------|
//! | text              | [`LoopEvent::Frame`] ([`Frame::Text`])   |
//! | binary            | [`LoopEvent::Frame`] ([`Frame::Binary`]) |
//! | close             | [`LoopEvent::PeerClosed`], then stop  |
//! | ping / pong       | not forwarded; answered by the socket |
//! | read error / EOF  | [`LoopEvent::ConnectionFailed`], then stop |

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::stream::SplitStream;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::connection::WsStream;
use crate::harness::LoopEvent;

/// One inbound WebSocket data message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// UTF-8 text payload.
    Text(String),
    /// Opaque binary payload.
    Binary(Vec<u8>),
}

/// Forward inbound messages from `stream` to `events` until the peer closes,
/// the socket fails, or `cancel` fires.
///
/// `peer_closed` is raised before [`LoopEvent::PeerClosed`] is queued so the
/// connection knows a close reply is owed rather than a fresh close frame.
pub(crate) async fn run_reader(
    mut stream: SplitStream<WsStream>,
    events: mpsc::UnboundedSender<LoopEvent>,
    peer_closed: Arc<AtomicBool>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!("ws reader: cancellation received, stopping");
                break;
            }

            item = stream.next() => {
                let event = match item {
                    Some(Ok(Message::Text(text))) => {
                        LoopEvent::Frame(Frame::Text(text.as_str().to_owned()))
                    }
                    Some(Ok(Message::Binary(data))) => LoopEvent::Frame(Frame::Binary(data.to_vec())),
                    Some(Ok(Message::Close(frame))) => {
                        peer_closed.store(true, Ordering::Release);
                        let (code, reason) = frame.map_or((None, String::new()), |f| {
                            (Some(u16::from(f.code)), f.reason.as_str().to_owned())
                        });
                        forward(&events, LoopEvent::PeerClosed { code, reason });
                        break;
                    }
                    Some(Ok(other)) => {
                        trace!(?other, "ws reader: control frame");
                        continue;
                    }
                    Some(Err(err)) => {
                        warn!(%err, "ws reader: read failed, stopping");
                        forward(&events, LoopEvent::ConnectionFailed(err.to_string()));
                        break;
                    }
                    None => {
                        debug!("ws reader: stream ended");
                        forward(
                            &events,
                            LoopEvent::ConnectionFailed("stream ended without close frame".into()),
                        );
                        break;
                    }
                };

                if !forward(&events, event) {
                    break;
                }
            }
        }
    }
}

/// Queue `event`; `false` once the run loop has gone away.
fn forward(events: &mpsc::UnboundedSender<LoopEvent>, event: LoopEvent) -> bool {
    if events.send(event).is_err() {
        debug!("ws reader: event queue closed");
        return false;
    }
    true
}
