//! Error types for LANDrop.
//!
//! Every error raised inside a transfer session is terminal for that session:
//! the state machine stops, a single `Ended` event is surfaced and the
//! connection is closed. A fresh attempt needs a new connection.

use std::io;

use thiserror::Error;

/// A specialized `Result` type for LANDrop operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for LANDrop.
#[derive(Error, Debug)]
pub enum Error {
    /// The peer's public key is malformed (E001)
    #[error("unable to calculate session key: {0}")]
    KeyAgreement(String),

    /// A frame could not be decrypted (E002)
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// The peer sent a schema-invalid or out-of-state message (E003)
    #[error("handshake failed: {0}")]
    ProtocolViolation(String),

    /// The download directory cannot be created or written (E004)
    #[error("cannot use download path '{path}': {reason}")]
    Destination {
        /// The offending path
        path: String,
        /// Why it is unusable
        reason: String,
    },

    /// The underlying connection failed (E005)
    #[error("connection error: {0}")]
    Transport(#[from] io::Error),

    /// The receiving device answered the offer with a rejection (E006)
    #[error("the receiving device rejected your file(s)")]
    Rejected,

    /// A session operation was invoked where it makes no sense
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// An encrypted frame does not fit in the 16-bit length header
    #[error("frame of {0} bytes exceeds the maximum frame size")]
    FrameTooLarge(usize),

    /// A file offered by the peer has an unusable name
    #[error("invalid file name: {0:?}")]
    InvalidFileName(String),

    /// A file being sent ended before its announced size
    #[error("file '{0}' ended before its announced size")]
    SourceTruncated(String),

    /// Configuration file error
    #[error("configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Operation timeout
    #[error("operation timed out after {0} seconds")]
    Timeout(u64),
}

impl Error {
    /// Returns the error code associated with this error, if any.
    ///
    /// Error codes follow the pattern EXXX where XXX is a 3-digit number.
    #[must_use]
    pub const fn code(&self) -> Option<&'static str> {
        match self {
            Self::KeyAgreement(_) => Some("E001"),
            Self::Decryption(_) => Some("E002"),
            Self::ProtocolViolation(_) | Self::InvalidFileName(_) => Some("E003"),
            Self::Destination { .. } => Some("E004"),
            Self::Transport(_) => Some("E005"),
            Self::Rejected => Some("E006"),
            _ => None,
        }
    }

    /// Returns whether this error ends the session it occurred in.
    ///
    /// Sessions never retry a frame or a handshake step, so only errors that
    /// can happen outside a session (configuration) are non-terminal.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Config(_))
    }

    pub(crate) fn destination(path: &std::path::Path, reason: impl std::fmt::Display) -> Self {
        Self::Destination {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::KeyAgreement("short".into()).code(), Some("E001"));
        assert_eq!(Error::Decryption("tag".into()).code(), Some("E002"));
        assert_eq!(Error::Rejected.code(), Some("E006"));
        assert_eq!(Error::Timeout(5).code(), None);
    }

    #[test]
    fn test_io_error_is_transport() {
        let err: Error = io::Error::new(io::ErrorKind::ConnectionReset, "reset").into();
        assert!(matches!(err, Error::Transport(_)));
        assert!(err.is_terminal());
    }

    #[test]
    fn test_destination_message() {
        let err = Error::destination(std::path::Path::new("/nope"), "read-only");
        assert_eq!(
            err.to_string(),
            "cannot use download path '/nope': read-only"
        );
    }
}
