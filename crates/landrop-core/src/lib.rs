//! # LANDrop Core Library
//!
//! `landrop-core` lets two devices on the same local network find each
//! other and exchange files directly over an ephemeral encrypted channel.
//!
//! ## Modules
//!
//! - [`crypto`] - Key agreement, frame encryption and the session fingerprint
//! - [`channel`] - Length-framed encrypted message channel
//! - [`protocol`] - Handshake message payloads
//! - [`transfer`] - Transfer state machine, roles and connection plumbing
//! - [`discovery`] - UDP broadcast presence protocol
//! - [`mod@file`] - File sources and destinations
//! - [`config`] - Configuration management
//!
//! ## Example
//!
//! ```rust,ignore
//! use landrop_core::transfer::{send_files, SessionConfig, SessionEvent};
//!
//! let mut handle = send_files(addr, &[path], &SessionConfig::default()).await?;
//! while let Some(event) = handle.next_event().await {
//!     if let SessionEvent::Fingerprint(code) = event {
//!         println!("Compare this code with the receiver: {code}");
//!     }
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

pub mod channel;
pub mod config;
pub mod crypto;
pub mod discovery;
pub mod error;
pub mod file;
pub mod protocol;
pub mod transfer;

pub use error::{Error, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Well-known discovery port (UDP)
pub const DISCOVERY_PORT: u16 = 52637;

/// Plaintext bytes per file content message
pub const TRANSFER_CHUNK_SIZE: usize = 64_000;

/// The device type announced to peers: the operating system name.
pub fn device_type() -> &'static str {
    std::env::consts::OS
}

/// The host name, or a generic name if it cannot be read.
pub fn default_device_name() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "LANDrop".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_fits_in_a_frame() {
        assert!(TRANSFER_CHUNK_SIZE <= channel::MAX_PAYLOAD_SIZE);
    }

    #[test]
    fn test_default_device_name_not_empty() {
        assert!(!default_device_name().is_empty());
        assert!(!device_type().is_empty());
    }
}
