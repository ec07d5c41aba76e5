//! Async I/O loop around a [`TransferSession`].

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::mpsc;

use super::session::{TransferRole, TransferSession};
use super::{Outcome, SessionEvent};

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Run a session over a connected stream until it ends.
///
/// Each round writes all pending output and waits for it to drain before
/// notifying the session, so at most one chunk is ever in flight. Events
/// are forwarded to `events` as they are produced. Receiver decisions
/// arrive on `decisions`; once that channel closes any pending or later
/// offer is declined.
///
/// On termination the stream is shut down. A `Completed` outcome is held
/// back for `grace` before the final `Ended` event is delivered.
pub async fn drive<S, R>(
    mut stream: S,
    mut session: TransferSession<R>,
    events: mpsc::UnboundedSender<SessionEvent>,
    mut decisions: Option<mpsc::UnboundedReceiver<bool>>,
    grace: Duration,
) -> Outcome
where
    S: AsyncRead + AsyncWrite + Unpin,
    R: TransferRole,
{
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];
    let mut abandoned = false;

    loop {
        if abandoned && session.respond(false).is_ok() {
            tracing::info!("decision channel closed, offer declined");
        }

        while session.has_output() {
            let output = session.take_output();
            let written = async {
                stream.write_all(&output).await?;
                stream.flush().await
            }
            .await;

            match written {
                Ok(()) => blocking_step(|| session.on_bytes_written()),
                Err(err) => {
                    session.transport_error(err);
                    break;
                }
            }
        }

        let mut outcome = None;
        for event in session.drain_events() {
            match event {
                SessionEvent::Ended(ended) => outcome = Some(ended),
                event => {
                    let _ = events.send(event);
                }
            }
        }

        if let Some(outcome) = outcome {
            if let Err(err) = stream.shutdown().await {
                tracing::debug!(error = %err, "shutdown after session end failed");
            }
            if outcome == Outcome::Completed && !grace.is_zero() {
                tokio::time::sleep(grace).await;
            }
            let _ = events.send(SessionEvent::Ended(outcome.clone()));
            return outcome;
        }

        tokio::select! {
            read = stream.read(&mut buffer) => match read {
                Ok(0) => session.transport_closed(),
                Ok(n) => blocking_step(|| session.receive(&buffer[..n])),
                Err(err) => session.transport_error(err),
            },
            decision = next_decision(&mut decisions) => match decision {
                Some(accepted) => {
                    if let Err(err) = blocking_step(|| session.respond(accepted)) {
                        tracing::warn!(error = %err, "decision ignored");
                    }
                }
                None => {
                    decisions = None;
                    abandoned = true;
                }
            },
        }
    }
}

/// Run a session step that reads or writes files.
///
/// Sessions do their file I/O synchronously. On a multi-threaded runtime
/// the step runs under `block_in_place`; a current-thread runtime cannot
/// hand off its only worker, so the step runs inline there.
fn blocking_step<T>(step: impl FnOnce() -> T) -> T {
    match Handle::try_current().map(|handle| handle.runtime_flavor()) {
        Ok(RuntimeFlavor::MultiThread) => tokio::task::block_in_place(step),
        _ => step(),
    }
}

async fn next_decision(decisions: &mut Option<mpsc::UnboundedReceiver<bool>>) -> Option<bool> {
    match decisions {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
