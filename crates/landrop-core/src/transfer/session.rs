//! The transfer state machine shared by both roles.
//!
//! A session does no I/O of its own. Bytes read from the connection are fed
//! in with [`TransferSession::receive`], bytes to send are collected with
//! [`TransferSession::take_output`] and the session is told when they have
//! drained with [`TransferSession::on_bytes_written`]. Outward events are
//! queued and collected with [`TransferSession::drain_events`].

use std::io;

use crate::channel::FramedChannel;
use crate::crypto::{SessionCrypto, PUBLIC_KEY_SIZE};
use crate::error::{Error, Result};

use super::queue::TransferQueue;
use super::{Outcome, SessionEvent, TransferDirection, TransferState};

pub(crate) mod sealed {
    pub trait Sealed {}
}

/// Role-specific behaviour plugged into a [`TransferSession`].
///
/// Implemented by [`Sender`](super::Sender) and
/// [`Receiver`](super::Receiver) only.
pub trait TransferRole: sealed::Sealed {
    /// Which way files flow for this role.
    const DIRECTION: TransferDirection;

    /// Called once the session key has been derived.
    fn on_handshake1_complete(&mut self, ctx: &mut SessionContext) -> Result<()>;

    /// Called for every decrypted message while the session is live.
    fn on_application_message(&mut self, ctx: &mut SessionContext, message: Vec<u8>)
        -> Result<()>;

    /// Called after all queued output has been written to the transport.
    fn on_bytes_written(&mut self, _ctx: &mut SessionContext) -> Result<()> {
        Ok(())
    }

    /// Answer an incoming offer.
    fn respond(&mut self, _ctx: &mut SessionContext, _accepted: bool) -> Result<()> {
        Err(Error::InvalidOperation(
            "only a receiving session can answer an offer".to_string(),
        ))
    }
}

/// State shared between the session machinery and its role.
#[derive(Debug)]
pub struct SessionContext {
    pub(crate) state: TransferState,
    pub(crate) channel: FramedChannel,
    pub(crate) queue: TransferQueue,
    outbox: Vec<u8>,
    events: Vec<SessionEvent>,
    fingerprint: Option<String>,
    ended: bool,
}

impl SessionContext {
    /// Current protocol state.
    #[must_use]
    pub const fn state(&self) -> TransferState {
        self.state
    }

    /// The session fingerprint, once the key exchange has completed.
    #[must_use]
    pub fn fingerprint(&self) -> Option<&str> {
        self.fingerprint.as_deref()
    }

    /// The files still to be streamed.
    #[must_use]
    pub const fn queue(&self) -> &TransferQueue {
        &self.queue
    }

    /// Whether queued output is waiting to be written.
    #[must_use]
    pub fn has_output(&self) -> bool {
        !self.outbox.is_empty()
    }

    pub(crate) fn send_message(&mut self, payload: &[u8]) -> Result<()> {
        let frame = self.channel.seal(payload)?;
        self.outbox.extend_from_slice(&frame);
        Ok(())
    }

    pub(crate) fn emit(&mut self, event: SessionEvent) {
        self.events.push(event);
    }

    pub(crate) fn status(&mut self, message: impl Into<String>) {
        self.emit(SessionEvent::Status(message.into()));
    }

    pub(crate) fn progress(&mut self) {
        self.emit(SessionEvent::Progress {
            transferred: self.queue.transferred(),
            total: self.queue.total_size(),
        });
    }

    /// Move to `Finished` and surface the terminal event, at most once.
    pub(crate) fn finish(&mut self, outcome: Outcome) {
        self.state = TransferState::Finished;
        if self.ended {
            return;
        }
        self.ended = true;
        tracing::info!(%outcome, "session ended");
        self.emit(SessionEvent::Ended(outcome));
    }

    pub(crate) fn fail(&mut self, err: &Error) {
        if self.ended {
            tracing::debug!(error = %err, "error after session end ignored");
            return;
        }
        tracing::warn!(error = %err, code = err.code().unwrap_or("-"), "session failed");
        self.outbox.clear();
        self.finish(Outcome::Failed(err.to_string()));
    }
}

/// One end of a file transfer connection.
#[derive(Debug)]
pub struct TransferSession<R: TransferRole> {
    ctx: SessionContext,
    handshake: Vec<u8>,
    role: R,
}

impl<R: TransferRole> TransferSession<R> {
    /// Create a session with a fresh ephemeral identity.
    ///
    /// The local public key is queued as output right away; it is the only
    /// unencrypted data the session sends.
    pub fn new(role: R) -> Self {
        let crypto = SessionCrypto::new();
        let outbox = crypto.local_public_key().to_vec();

        let mut ctx = SessionContext {
            state: TransferState::Handshake1,
            channel: FramedChannel::new(crypto),
            queue: TransferQueue::default(),
            outbox,
            events: Vec::new(),
            fingerprint: None,
            ended: false,
        };
        ctx.status("Exchanging keys...");

        Self {
            ctx,
            handshake: Vec::with_capacity(PUBLIC_KEY_SIZE),
            role,
        }
    }

    /// Current protocol state.
    #[must_use]
    pub const fn state(&self) -> TransferState {
        self.ctx.state
    }

    /// Whether the session reached its terminal state.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.ctx.state == TransferState::Finished
    }

    /// The session fingerprint, once the key exchange has completed.
    #[must_use]
    pub fn fingerprint(&self) -> Option<&str> {
        self.ctx.fingerprint()
    }

    /// Shared session state.
    #[must_use]
    pub const fn context(&self) -> &SessionContext {
        &self.ctx
    }

    /// The role driving this session.
    #[must_use]
    pub const fn role(&self) -> &R {
        &self.role
    }

    /// Whether output is waiting to be written.
    #[must_use]
    pub fn has_output(&self) -> bool {
        self.ctx.has_output()
    }

    /// Take all bytes waiting to be written to the transport.
    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.ctx.outbox)
    }

    /// Take all events surfaced since the last call.
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.ctx.events)
    }

    /// Feed bytes read from the transport.
    pub fn receive(&mut self, bytes: &[u8]) {
        if self.is_finished() {
            return;
        }
        if let Err(err) = self.process(bytes) {
            self.ctx.fail(&err);
        }
    }

    /// Report that every byte previously taken with
    /// [`take_output`](Self::take_output) has been written.
    pub fn on_bytes_written(&mut self) {
        if self.is_finished() {
            return;
        }
        if let Err(err) = self.role.on_bytes_written(&mut self.ctx) {
            self.ctx.fail(&err);
        }
    }

    /// Answer the peer's offer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOperation`] when the role cannot respond or no
    /// offer is pending. Any other failure ends the session instead and is
    /// reported through its `Ended` event.
    pub fn respond(&mut self, accepted: bool) -> Result<()> {
        match self.role.respond(&mut self.ctx, accepted) {
            Ok(()) => Ok(()),
            Err(err @ Error::InvalidOperation(_)) => Err(err),
            Err(err) => {
                self.ctx.fail(&err);
                Ok(())
            }
        }
    }

    /// Report a failure of the underlying connection.
    ///
    /// Ignored once the session is finished, where it is the expected race
    /// with the peer closing its side.
    pub fn transport_error(&mut self, err: io::Error) {
        if self.is_finished() {
            tracing::debug!(error = %err, "transport error after finish suppressed");
            return;
        }
        self.ctx.fail(&Error::Transport(err));
    }

    /// Report that the peer closed the connection.
    pub fn transport_closed(&mut self) {
        self.transport_error(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "the remote host closed the connection",
        ));
    }

    fn process(&mut self, mut bytes: &[u8]) -> Result<()> {
        if self.ctx.state == TransferState::Handshake1 {
            let take = (PUBLIC_KEY_SIZE - self.handshake.len()).min(bytes.len());
            self.handshake.extend_from_slice(&bytes[..take]);
            bytes = &bytes[take..];

            if self.handshake.len() < PUBLIC_KEY_SIZE {
                return Ok(());
            }
            self.complete_handshake1()?;
        }

        self.ctx.channel.push(bytes);
        while self.ctx.state != TransferState::Finished {
            let Some(message) = self.ctx.channel.open_next()? else {
                break;
            };
            self.role.on_application_message(&mut self.ctx, message)?;
        }
        Ok(())
    }

    fn complete_handshake1(&mut self) -> Result<()> {
        let crypto = self.ctx.channel.crypto_mut();
        crypto.compute_session_key(&self.handshake)?;
        let fingerprint = crypto.session_fingerprint()?;

        tracing::debug!(%fingerprint, "session key established");
        self.ctx.fingerprint = Some(fingerprint.clone());
        self.ctx.emit(SessionEvent::Fingerprint(fingerprint));
        self.ctx.state = TransferState::Handshake2;

        self.role.on_handshake1_complete(&mut self.ctx)
    }
}
