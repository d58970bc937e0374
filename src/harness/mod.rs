//! Run loop: drives one worker through one request.
//!
//! The loop owns the [`WorkerProcess`] and the [`Connection`]. Everything
//! else talks to it through a single event queue:
//! - the WebSocket reader task queues inbound frames, the peer's close, and
//!   transport failures;
//! - the worker's exit callback queues [`LoopEvent::WorkerExited`];
//! - the interrupt token is polled alongside the queue at every wait point.
//!
//! Events are handled one at a time in arrival order. Whichever terminal
//! condition comes first runs the shutdown sequence, and a
//! [`ShutdownLatch`] keeps that sequence from running twice.
//!
//! Submodules:
//! - `latch`: the one-shot shutdown guard.
//! - `signal`: Ctrl-C / `SIGTERM` → interrupt token.

pub mod latch;
pub mod signal;

use std::fmt::{Display, Formatter};

use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::{Endpoint, HarnessConfig};
use crate::connection::{Connection, Frame};
use crate::protocol::codec::{encode, InboundEvent, OutboundRequest};
use crate::protocol::dispatcher::{dispatch, EventHandler, LoggingHandler};
use crate::worker::{WorkerExit, WorkerProcess};
use crate::{AppError, Result};

pub use latch::ShutdownLatch;

/// Everything that can wake the run loop, other than the interrupt.
#[derive(Debug)]
pub enum LoopEvent {
    /// One inbound data frame.
    Frame(Frame),
    /// The worker sent a close frame.
    PeerClosed {
        /// Close code, if the frame carried one.
        code: Option<u16>,
        /// Close reason text (may be empty).
        reason: String,
    },
    /// The socket failed or ended without a close handshake.
    ConnectionFailed(String),
    /// The worker process terminated.
    WorkerExited(WorkerExit),
}

/// Which terminal condition ended the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    /// The worker closed the WebSocket.
    PeerClosed {
        /// Close code sent by the worker.
        code: Option<u16>,
    },
    /// The handshake or the established socket failed.
    ConnectionFailed(String),
    /// The worker process exited.
    WorkerExited(WorkerExit),
    /// The interrupt token was cancelled.
    Interrupted,
}

impl Display for ShutdownReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PeerClosed { code: Some(code) } => write!(f, "peer closed ({code})"),
            Self::PeerClosed { code: None } => f.write_str("peer closed"),
            Self::ConnectionFailed(detail) => write!(f, "connection failed: {detail}"),
            Self::WorkerExited(exit) => write!(f, "worker exited: {}", exit.reason),
            Self::Interrupted => f.write_str("interrupted"),
        }
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Terminal condition that triggered shutdown.
    pub reason: ShutdownReason,
    /// Whether the request frame was written to the socket.
    pub request_sent: bool,
    /// Inbound data frames seen (text and binary).
    pub frames_received: usize,
}

/// Process exit code for the outcome of [`Harness::run`].
///
/// Every run that produced a [`RunReport`] shut down in order, including a
/// socket that dropped after `Open`, and exits with 0. Only failures to
/// bring the worker or the connection up are non-zero.
#[must_use]
pub fn exit_code(outcome: &Result<RunReport>) -> u8 {
    match outcome {
        Ok(_) => 0,
        Err(err) => err.exit_code(),
    }
}

/// Launches the worker, sends one request, and reports what came back.
#[derive(Debug)]
pub struct Harness<H = LoggingHandler> {
    config: HarnessConfig,
    endpoint: Endpoint,
    handler: H,
}

impl Harness<LoggingHandler> {
    /// Harness that logs every inbound event.
    #[must_use]
    pub fn new(config: HarnessConfig, endpoint: Endpoint) -> Self {
        Self::with_handler(config, endpoint, LoggingHandler)
    }
}

impl<H: EventHandler> Harness<H> {
    /// Harness that routes inbound events to `handler`.
    #[must_use]
    pub fn with_handler(config: HarnessConfig, endpoint: Endpoint, handler: H) -> Self {
        Self {
            config,
            endpoint,
            handler,
        }
    }

    /// The event handler.
    #[must_use]
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Run until the connection closes, the worker exits, or `interrupt`
    /// is cancelled, then shut everything down exactly once.
    ///
    /// # Errors
    ///
    /// - `AppError::Spawn` if the worker cannot be started; no connection is
    ///   attempted.
    /// - `AppError::Connect` if the handshake fails; the worker is terminated.
    /// - `AppError::Worker` if the worker exits before the connection opens.
    pub async fn run(&mut self, interrupt: CancellationToken) -> Result<RunReport> {
        let span = info_span!(
            "harness_run",
            run_id = %Uuid::new_v4(),
            url = %self.endpoint.url()
        );
        self.run_inner(interrupt).instrument(span).await
    }

    async fn run_inner(&mut self, interrupt: CancellationToken) -> Result<RunReport> {
        let (events_tx, mut events) = mpsc::unbounded_channel();

        // ── Start the worker ────────────────────────────
        let mut worker = WorkerProcess::start(&self.config.worker)?;
        let exit_tx = events_tx.clone();
        worker.on_exit(move |exit| {
            // The queue is gone once the run has finished; nothing to report to.
            let _ = exit_tx.send(LoopEvent::WorkerExited(exit));
        })?;

        let mut run = RunState::new(worker);

        // ── Let the worker bind its socket ──────────────
        tokio::select! {
            biased;

            () = interrupt.cancelled() => {
                info!("interrupted during worker start-up, no request sent");
                return Ok(run.finish(ShutdownReason::Interrupted).await);
            }
            Some(LoopEvent::WorkerExited(exit)) = events.recv() => {
                return run.worker_gone_before_open(exit).await;
            }
            () = tokio::time::sleep(self.config.worker.startup_delay()) => {}
        }

        // ── Handshake ───────────────────────────────────
        let connect = Connection::connect(&self.endpoint, &self.config.connection, events_tx);
        let connection = tokio::select! {
            biased;

            () = interrupt.cancelled() => {
                info!("interrupted before the connection opened, no request sent");
                return Ok(run.finish(ShutdownReason::Interrupted).await);
            }
            Some(LoopEvent::WorkerExited(exit)) = events.recv() => {
                return run.worker_gone_before_open(exit).await;
            }
            result = connect => match result {
                Ok(connection) => connection,
                Err(err) => {
                    error!(%err, "failed to open websocket connection");
                    run.finish(ShutdownReason::ConnectionFailed(err.to_string())).await;
                    return Err(err);
                }
            },
        };
        run.connection = Some(connection);

        // ── Event loop ──────────────────────────────────
        let request = OutboundRequest::process_image(self.config.request.filename.clone());
        let send_timer = tokio::time::sleep(self.config.connection.send_delay());
        tokio::pin!(send_timer);
        let mut request_pending = true;

        loop {
            tokio::select! {
                biased;

                () = interrupt.cancelled() => {
                    return Ok(run.finish(ShutdownReason::Interrupted).await);
                }
                event = events.recv() => {
                    let Some(event) = event else {
                        let reason = ShutdownReason::ConnectionFailed("event queue closed".into());
                        return Ok(run.finish(reason).await);
                    };
                    if let Some(reason) = run.handle(event, &mut self.handler) {
                        return Ok(run.finish(reason).await);
                    }
                }
                () = &mut send_timer, if request_pending => {
                    request_pending = false;
                    if let Err(err) = run.send_request(&request).await {
                        error!(%err, "failed to send request");
                        return Ok(run.finish(ShutdownReason::ConnectionFailed(err.to_string())).await);
                    }
                }
            }
        }
    }
}

/// Resources and counters owned by one run.
struct RunState {
    worker: WorkerProcess,
    connection: Option<Connection>,
    latch: ShutdownLatch,
    request_sent: bool,
    frames_received: usize,
}

impl RunState {
    fn new(worker: WorkerProcess) -> Self {
        Self {
            worker,
            connection: None,
            latch: ShutdownLatch::new(),
            request_sent: false,
            frames_received: 0,
        }
    }

    /// Handle one queued event; `Some` when it ends the run.
    fn handle<H>(&mut self, event: LoopEvent, handler: &mut H) -> Option<ShutdownReason>
    where
        H: EventHandler + ?Sized,
    {
        match event {
            LoopEvent::Frame(Frame::Text(text)) => {
                self.frames_received += 1;
                debug!(text, "received text frame");
                let event = InboundEvent::from_text(&text);
                debug!(kind = event.kind(), "dispatching event");
                dispatch(&event, handler);
                None
            }
            LoopEvent::Frame(Frame::Binary(data)) => {
                self.frames_received += 1;
                info!(bytes = data.len(), "received binary data (not shown)");
                None
            }
            LoopEvent::PeerClosed { code, reason } => {
                info!(code, reason, "worker closed the connection");
                Some(ShutdownReason::PeerClosed { code })
            }
            LoopEvent::ConnectionFailed(detail) => {
                warn!(detail, "websocket connection lost");
                Some(ShutdownReason::ConnectionFailed(detail))
            }
            LoopEvent::WorkerExited(exit) => {
                warn!(code = exit.code, reason = %exit.reason, "worker exited while connected");
                Some(ShutdownReason::WorkerExited(exit))
            }
        }
    }

    async fn send_request(&mut self, request: &OutboundRequest) -> Result<()> {
        let connection = self
            .connection
            .as_mut()
            .ok_or_else(|| AppError::Connection("send rejected: no connection".into()))?;

        let text = encode(request);
        info!(request = %text, "sending request");
        connection.send(text).await?;
        self.request_sent = true;
        Ok(())
    }

    async fn worker_gone_before_open(&mut self, exit: WorkerExit) -> Result<RunReport> {
        let detail = exit.reason.clone();
        warn!(reason = %detail, "worker exited before the connection opened");
        self.finish(ShutdownReason::WorkerExited(exit)).await;
        Err(AppError::Worker(format!(
            "worker exited before the connection opened: {detail}"
        )))
    }

    /// Close the connection (if any) and terminate the worker, once.
    async fn finish(&mut self, reason: ShutdownReason) -> RunReport {
        if self.latch.trip() {
            info!(%reason, "shutting down");

            if let Some(mut connection) = self.connection.take() {
                match &reason {
                    ShutdownReason::ConnectionFailed(detail) => connection.abort(detail),
                    ShutdownReason::WorkerExited(_) => connection.close(CloseCode::Away).await,
                    ShutdownReason::PeerClosed { .. } | ShutdownReason::Interrupted => {
                        connection.close(CloseCode::Normal).await;
                    }
                }
            }

            self.worker.terminate().await;
            info!("shutdown complete");
        } else {
            debug!(%reason, "shutdown already ran");
        }

        RunReport {
            reason,
            request_sent: self.request_sent,
            frames_received: self.frames_received,
        }
    }
}
