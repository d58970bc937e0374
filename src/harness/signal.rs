//! Signal gate: turns Ctrl-C / `SIGTERM` into a cancelled interrupt token.

use futures_util::stream::{self, Stream};
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Cancel `interrupt` on the first Ctrl-C (or `SIGTERM` on unix).
///
/// Runs until aborted or until signal registration fails.
pub async fn watch_signals(interrupt: CancellationToken) {
    gate_interrupts(os_signals(), &interrupt).await;
}

/// Cancel `interrupt` on the first notification from `signals`.
///
/// Later notifications are logged and otherwise ignored, so a second Ctrl-C
/// while the run is shutting down does not cut the shutdown short. Returns
/// the number of ignored notifications once `signals` ends.
pub async fn gate_interrupts<S>(signals: S, interrupt: &CancellationToken) -> usize
where
    S: Stream<Item = ()>,
{
    let mut signals = std::pin::pin!(signals);
    let mut ignored = 0;

    while signals.next().await.is_some() {
        if interrupt.is_cancelled() {
            warn!("interrupt ignored, shutdown already in progress");
            ignored += 1;
        } else {
            info!("interrupt received");
            interrupt.cancel();
        }
    }

    ignored
}

/// One item per Ctrl-C or `SIGTERM`; ends if the handler fails.
#[cfg(unix)]
fn os_signals() -> impl Stream<Item = ()> {
    use tokio::signal::unix::{signal, SignalKind};

    let sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => Some(sigterm),
        Err(err) => {
            warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
            None
        }
    };

    stream::unfold(sigterm, |mut sigterm| async move {
        let received = match sigterm.as_mut() {
            Some(term) => tokio::select! {
                result = tokio::signal::ctrl_c() => result.is_ok(),
                sig = term.recv() => sig.is_some(),
            },
            None => tokio::signal::ctrl_c().await.is_ok(),
        };
        handler_alive(received).then_some(((), sigterm))
    })
}

/// One item per Ctrl-C; ends if the handler fails.
#[cfg(not(unix))]
fn os_signals() -> impl Stream<Item = ()> {
    stream::unfold((), |()| async {
        let received = tokio::signal::ctrl_c().await.is_ok();
        handler_alive(received).then_some(((), ()))
    })
}

fn handler_alive(received: bool) -> bool {
    if !received {
        warn!("signal handler failed, interrupts are no longer observed");
    }
    received
}
