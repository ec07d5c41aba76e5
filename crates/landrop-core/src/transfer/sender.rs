//! The sending role.

use std::collections::VecDeque;
use std::io::Read;

use crate::error::{Error, Result};
use crate::file::SourceFile;
use crate::protocol::{self, FileEntry, OfferPayload};

use super::queue::TransferQueue;
use super::session::{sealed, SessionContext, TransferRole};
use super::{Outcome, SessionEvent, TransferDirection, TransferState};

/// Offers a fixed list of files and streams them once accepted.
///
/// Streaming is stop-and-wait: the next chunk is read and sealed only after
/// the previous one has been fully written to the transport.
#[derive(Debug)]
pub struct Sender {
    device_name: String,
    device_type: String,
    sources: VecDeque<SourceFile>,
    chunk_size: usize,
    buffer: Vec<u8>,
}

impl Sender {
    /// Create a sender for already opened files.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOperation`] if `files` is empty or
    /// `chunk_size` is zero.
    pub fn new(
        device_name: impl Into<String>,
        device_type: impl Into<String>,
        files: Vec<SourceFile>,
        chunk_size: usize,
    ) -> Result<Self> {
        if files.is_empty() {
            return Err(Error::InvalidOperation("no files to send".to_string()));
        }
        if chunk_size == 0 {
            return Err(Error::InvalidOperation(
                "chunk size must be positive".to_string(),
            ));
        }

        Ok(Self {
            device_name: device_name.into(),
            device_type: device_type.into(),
            sources: files.into(),
            chunk_size,
            buffer: Vec::new(),
        })
    }

    fn offer(&self) -> OfferPayload {
        OfferPayload {
            device_name: self.device_name.clone(),
            device_type: self.device_type.clone(),
            files: self
                .sources
                .iter()
                .map(|source| FileEntry {
                    filename: source.filename().to_string(),
                    size: source.size(),
                })
                .collect(),
        }
    }

    /// Drop sources whose queue entries have nothing left to send.
    fn skip_finished(&mut self, ctx: &mut SessionContext) {
        for filename in ctx.queue.skip_finished() {
            tracing::debug!(%filename, "nothing left to send, skipping");
            self.sources.pop_front();
        }
    }

    /// Seal the next chunk, or finish once every file has been sent.
    fn send_next_chunk(&mut self, ctx: &mut SessionContext) -> Result<()> {
        if ctx.state != TransferState::Transferring || ctx.has_output() {
            return Ok(());
        }

        self.skip_finished(ctx);
        let Some(front) = ctx.queue.front() else {
            ctx.status("Done!");
            ctx.finish(Outcome::Completed);
            return Ok(());
        };
        let remaining = front.remaining;
        let filename = front.filename.clone();

        let source = self
            .sources
            .front_mut()
            .ok_or_else(|| Error::InvalidOperation("transfer queue out of sync".to_string()))?;
        if remaining == source.size() {
            ctx.status(format!("Sending file {filename}..."));
            ctx.emit(SessionEvent::FileStarted {
                filename: filename.clone(),
                size: remaining,
            });
        }

        let want = usize::try_from(remaining).map_or(self.chunk_size, |r| r.min(self.chunk_size));
        self.buffer.resize(want, 0);
        let read = source.read(&mut self.buffer)?;
        if read == 0 {
            return Err(Error::SourceTruncated(filename));
        }

        ctx.send_message(&self.buffer[..read])?;
        if ctx.queue.advance(read as u64).is_some() {
            tracing::debug!(%filename, "file sent");
            self.sources.pop_front();
        }
        ctx.progress();
        Ok(())
    }
}

impl sealed::Sealed for Sender {}

impl TransferRole for Sender {
    const DIRECTION: TransferDirection = TransferDirection::Send;

    fn on_handshake1_complete(&mut self, ctx: &mut SessionContext) -> Result<()> {
        let offer = self.offer();
        ctx.queue = TransferQueue::new(&offer.files);
        ctx.send_message(&protocol::encode_payload(&offer)?)?;

        tracing::info!(
            files = offer.files.len(),
            total = offer.total_size(),
            "offer sent"
        );
        ctx.status("Waiting for the receiver to accept...");
        Ok(())
    }

    fn on_application_message(&mut self, ctx: &mut SessionContext, message: Vec<u8>) -> Result<()> {
        if ctx.state != TransferState::Handshake2 {
            return Err(Error::ProtocolViolation(
                "unexpected message while sending".to_string(),
            ));
        }

        if !protocol::parse_response(&message)? {
            ctx.status("The receiving device rejected your file(s).");
            ctx.finish(Outcome::Rejected);
            return Ok(());
        }

        tracing::info!("offer accepted");
        ctx.state = TransferState::Transferring;
        self.send_next_chunk(ctx)
    }

    fn on_bytes_written(&mut self, ctx: &mut SessionContext) -> Result<()> {
        self.send_next_chunk(ctx)
    }
}
