//! File transfer sessions for LANDrop.
//!
//! A transfer connection runs one [`TransferSession`] on each end, in the
//! [`Sender`] or [`Receiver`] role:
//!
//! - `Handshake1`: both ends send their raw public key and derive the
//!   session key; the fingerprint is surfaced for comparison
//! - `Handshake2`: the sender offers its files, the receiver answers
//! - `Transferring`: file content flows in encrypted chunks
//! - `Finished`: terminal, reached exactly once with an [`Outcome`]
//!
//! The session itself is sans-IO. [`drive`] runs it over any tokio stream,
//! [`TransferServer`] and [`send_files`] provide the TCP plumbing.

mod driver;
mod queue;
mod receiver;
mod sender;
mod server;
mod session;

pub use driver::drive;
pub use queue::{FileMetadata, TransferQueue};
pub use receiver::Receiver;
pub use sender::Sender;
pub use server::{send_files, SessionHandle, TransferServer};
pub use session::{SessionContext, TransferRole, TransferSession};

use std::fmt;
use std::time::Duration;

use crate::protocol::FileEntry;

/// Transfer direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDirection {
    /// Sending files
    Send,
    /// Receiving files
    Receive,
}

/// Protocol state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    /// Exchanging public keys
    Handshake1,
    /// Exchanging the offer and the decision
    Handshake2,
    /// Streaming file content
    Transferring,
    /// Terminal
    Finished,
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Every file was transferred
    Completed,
    /// The receiving device rejected the offer
    Rejected,
    /// This device declined the offer
    Declined,
    /// The session failed
    Failed(String),
}

impl Outcome {
    /// Whether the files were transferred.
    #[must_use]
    pub fn is_success(&self) -> bool {
        *self == Self::Completed
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => f.write_str("completed"),
            Self::Rejected => f.write_str("rejected by the receiving device"),
            Self::Declined => f.write_str("declined"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// An offer waiting for the user's decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingOffer {
    /// Sender's device name
    pub device_name: String,
    /// Sender's device type
    pub device_type: String,
    /// Offered files in transfer order
    pub files: Vec<FileEntry>,
    /// Sum of all file sizes
    pub total_size: u64,
    /// Session fingerprint to compare with the sender's screen
    pub fingerprint: String,
}

/// Events surfaced by a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Human-readable progress message
    Status(String),
    /// The session key is established
    Fingerprint(String),
    /// The sender's offer, waiting for a decision
    Offer(IncomingOffer),
    /// A file is being sent or written
    FileStarted {
        /// File name
        filename: String,
        /// File size in bytes
        size: u64,
    },
    /// Overall byte progress
    Progress {
        /// Bytes transferred so far
        transferred: u64,
        /// Total bytes of the transfer
        total: u64,
    },
    /// The session is over; always the last event
    Ended(Outcome),
}

/// Settings applied to every session a device runs.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Name announced to peers
    pub device_name: String,
    /// Device type announced to peers
    pub device_type: String,
    /// Plaintext bytes per file content message
    pub chunk_size: usize,
    /// Limit for establishing outgoing connections
    pub connect_timeout: Duration,
    /// Delay before a completed session reports its end
    pub completion_grace: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            device_name: crate::default_device_name(),
            device_type: crate::device_type().to_string(),
            chunk_size: crate::TRANSFER_CHUNK_SIZE,
            connect_timeout: Duration::from_secs(5),
            completion_grace: Duration::from_secs(5),
        }
    }
}
