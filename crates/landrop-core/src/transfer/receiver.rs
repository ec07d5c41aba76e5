//! The receiving role.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::file;
use crate::protocol::{self, ResponsePayload};

use super::queue::TransferQueue;
use super::session::{sealed, SessionContext, TransferRole};
use super::{IncomingOffer, Outcome, SessionEvent, TransferDirection, TransferState};

/// Waits for an offer, asks for a decision and writes accepted files into
/// the download directory.
#[derive(Debug)]
pub struct Receiver {
    download_path: PathBuf,
    awaiting_decision: bool,
    current: Option<(PathBuf, File)>,
}

impl Receiver {
    /// Create a receiver that stores files in `download_path`.
    #[must_use]
    pub fn new(download_path: impl Into<PathBuf>) -> Self {
        Self {
            download_path: download_path.into(),
            awaiting_decision: false,
            current: None,
        }
    }

    /// Directory accepted files are written to.
    #[must_use]
    pub fn download_path(&self) -> &Path {
        &self.download_path
    }

    /// Whether an offer is waiting for [`respond`](TransferRole::respond).
    #[must_use]
    pub const fn awaiting_decision(&self) -> bool {
        self.awaiting_decision
    }

    fn handle_offer(&mut self, ctx: &mut SessionContext, message: &[u8]) -> Result<()> {
        if self.awaiting_decision {
            return Err(Error::ProtocolViolation(
                "unexpected message while waiting for a decision".to_string(),
            ));
        }

        let offer = protocol::parse_offer(message)?;
        ctx.queue = TransferQueue::new(&offer.files);
        self.awaiting_decision = true;

        let total_size = ctx.queue.total_size();
        tracing::info!(
            device = %offer.device_name,
            files = offer.files.len(),
            total = total_size,
            "offer received"
        );
        let fingerprint = ctx.fingerprint().unwrap_or_default().to_string();
        ctx.emit(SessionEvent::Offer(IncomingOffer {
            total_size,
            fingerprint,
            device_name: offer.device_name,
            device_type: offer.device_type,
            files: offer.files,
        }));
        Ok(())
    }

    /// Open the file at the head of the queue, creating and skipping empty
    /// ones, and finish once the queue is exhausted.
    fn open_next_file(&mut self, ctx: &mut SessionContext) -> Result<()> {
        self.current = None;

        while let Some(front) = ctx.queue.front() {
            let filename = front.filename.clone();
            let size = front.remaining;

            let handle = file::create_destination_file(&self.download_path, &filename)?;
            ctx.emit(SessionEvent::FileStarted {
                filename: filename.clone(),
                size,
            });

            if size > 0 {
                ctx.status(format!("Receiving file {filename}..."));
                self.current = Some((self.download_path.join(&filename), handle));
                return Ok(());
            }
            ctx.queue.skip_finished();
        }

        ctx.status("Done!");
        ctx.finish(Outcome::Completed);
        Ok(())
    }

    fn write_content(&mut self, ctx: &mut SessionContext, mut data: &[u8]) -> Result<()> {
        while !data.is_empty() {
            let remaining = ctx.queue.front().map(|f| f.remaining).ok_or_else(|| {
                Error::ProtocolViolation("more data than the offer announced".to_string())
            })?;
            let (path, handle) = self.current.as_mut().ok_or_else(|| {
                Error::InvalidOperation("no destination file open".to_string())
            })?;

            let len = usize::try_from(remaining).map_or(data.len(), |r| r.min(data.len()));
            handle
                .write_all(&data[..len])
                .map_err(|e| Error::destination(path.as_path(), e))?;
            data = &data[len..];

            let finished = ctx.queue.advance(len as u64).is_some();
            if finished {
                tracing::debug!(path = %path.display(), "file received");
            }
            ctx.progress();
            if finished {
                self.open_next_file(ctx)?;
            }
        }
        Ok(())
    }
}

impl sealed::Sealed for Receiver {}

impl TransferRole for Receiver {
    const DIRECTION: TransferDirection = TransferDirection::Receive;

    fn on_handshake1_complete(&mut self, ctx: &mut SessionContext) -> Result<()> {
        ctx.status("Waiting for file list...");
        Ok(())
    }

    fn on_application_message(&mut self, ctx: &mut SessionContext, message: Vec<u8>) -> Result<()> {
        match ctx.state {
            TransferState::Handshake2 => self.handle_offer(ctx, &message),
            TransferState::Transferring => self.write_content(ctx, &message),
            state => Err(Error::ProtocolViolation(format!(
                "unexpected message in state {state:?}"
            ))),
        }
    }

    fn respond(&mut self, ctx: &mut SessionContext, accepted: bool) -> Result<()> {
        if !self.awaiting_decision || ctx.state != TransferState::Handshake2 {
            return Err(Error::InvalidOperation(
                "no offer is waiting for a decision".to_string(),
            ));
        }
        self.awaiting_decision = false;

        ctx.send_message(&protocol::encode_payload(&ResponsePayload::new(accepted))?)?;
        if !accepted {
            tracing::info!("offer declined");
            ctx.finish(Outcome::Declined);
            return Ok(());
        }

        file::prepare_destination(&self.download_path)?;
        tracing::info!(path = %self.download_path.display(), "offer accepted");
        ctx.state = TransferState::Transferring;
        self.open_next_file(ctx)
    }
}
