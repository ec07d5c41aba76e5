//! Encrypted, length-framed message channel.
//!
//! After the public-key exchange every message travels as one frame:
//!
//! ```text
//! ┌────────────┬──────────────────────────────────────────────┐
//! │   Length   │                Encrypted blob                │
//! │  2 bytes   │  nonce (12) ‖ ciphertext ‖ Poly1305 tag (16) │
//! └────────────┴──────────────────────────────────────────────┘
//! ```
//!
//! The length is big-endian and counts the encrypted blob only. The channel
//! itself does no I/O: callers push whatever bytes the transport delivered
//! and pull out whole messages, which makes the framing independent of how
//! the stream happens to be split.

use crate::crypto::{SessionCrypto, ENCRYPTION_OVERHEAD};
use crate::error::{Error, Result};

/// Length header size in bytes.
pub const HEADER_SIZE: usize = 2;

/// Largest encrypted blob a frame can carry.
pub const MAX_FRAME_SIZE: usize = u16::MAX as usize;

/// Largest plaintext that still fits in one frame.
pub const MAX_PAYLOAD_SIZE: usize = MAX_FRAME_SIZE - ENCRYPTION_OVERHEAD;

/// Prefix an encrypted blob with its length header.
///
/// # Errors
///
/// Returns [`Error::FrameTooLarge`] if the blob does not fit in 16 bits.
pub fn encode_frame(blob: &[u8]) -> Result<Vec<u8>> {
    let len = u16::try_from(blob.len()).map_err(|_| Error::FrameTooLarge(blob.len()))?;

    let mut frame = Vec::with_capacity(HEADER_SIZE + blob.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(blob);
    Ok(frame)
}

/// Reassembles length-prefixed frames from an arbitrarily split byte stream.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    start: usize,
}

impl FrameDecoder {
    /// Create an empty decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes received from the transport.
    pub fn extend(&mut self, bytes: &[u8]) {
        if self.start > 0 && self.start == self.buffer.len() {
            self.buffer.clear();
            self.start = 0;
        }
        self.buffer.extend_from_slice(bytes);
    }

    /// Number of buffered bytes not yet returned as a frame.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len() - self.start
    }

    /// Take the next complete frame body, if one is fully buffered.
    pub fn next_frame(&mut self) -> Option<Vec<u8>> {
        let pending = &self.buffer[self.start..];
        if pending.len() < HEADER_SIZE {
            return None;
        }

        let len = usize::from(u16::from_be_bytes([pending[0], pending[1]]));
        if pending.len() < HEADER_SIZE + len {
            return None;
        }

        let body = pending[HEADER_SIZE..HEADER_SIZE + len].to_vec();
        self.start += HEADER_SIZE + len;
        self.compact();
        Some(body)
    }

    fn compact(&mut self) {
        if self.start == self.buffer.len() {
            self.buffer.clear();
            self.start = 0;
        } else if self.start > MAX_FRAME_SIZE {
            self.buffer.drain(..self.start);
            self.start = 0;
        }
    }
}

/// The post-handshake message channel of one session.
#[derive(Debug)]
pub struct FramedChannel {
    crypto: SessionCrypto,
    decoder: FrameDecoder,
}

impl FramedChannel {
    /// Wrap established session crypto.
    #[must_use]
    pub fn new(crypto: SessionCrypto) -> Self {
        Self {
            crypto,
            decoder: FrameDecoder::new(),
        }
    }

    /// Access the underlying crypto state.
    #[must_use]
    pub fn crypto(&self) -> &SessionCrypto {
        &self.crypto
    }

    /// Mutable access to the underlying crypto state.
    pub fn crypto_mut(&mut self) -> &mut SessionCrypto {
        &mut self.crypto
    }

    /// Encrypt a message and frame it for the wire.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FrameTooLarge`] if the payload exceeds
    /// [`MAX_PAYLOAD_SIZE`].
    pub fn seal(&self, payload: &[u8]) -> Result<Vec<u8>> {
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(Error::FrameTooLarge(payload.len() + ENCRYPTION_OVERHEAD));
        }
        encode_frame(&self.crypto.encrypt(payload)?)
    }

    /// Buffer bytes received from the transport.
    pub fn push(&mut self, bytes: &[u8]) {
        self.decoder.extend(bytes);
    }

    /// Decrypt the next fully buffered message.
    ///
    /// Returns `Ok(None)` when more bytes are needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decryption`] if a frame fails authentication.
    pub fn open_next(&mut self) -> Result<Option<Vec<u8>>> {
        match self.decoder.next_frame() {
            Some(frame) => {
                let message = self.crypto.decrypt(&frame)?;
                tracing::trace!(len = message.len(), "frame decrypted");
                Ok(Some(message))
            }
            None => Ok(None),
        }
    }
}
