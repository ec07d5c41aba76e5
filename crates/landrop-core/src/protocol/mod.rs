//! Handshake message payloads.
//!
//! Once the session key is established, the first messages on the channel
//! are JSON objects; everything after the receiver's answer is raw file
//! content. Exchange order:
//!
//! ```text
//! Sender                                   Receiver
//!   │ ──────── public key (32 bytes, clear) ──────▶ │
//!   │ ◀─────── public key (32 bytes, clear) ─────── │
//!   │ ──────── OfferPayload (encrypted) ──────────▶ │
//!   │ ◀─────── ResponsePayload (encrypted) ──────── │
//!   │ ──────── file bytes (encrypted chunks) ─────▶ │
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::file::validate_file_name;

/// One file announced by the sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Base name of the file
    pub filename: String,
    /// Size in bytes
    pub size: u64,
}

/// Sender → Receiver: who is sending and what.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferPayload {
    /// Sender's device name
    pub device_name: String,
    /// Sender's device type
    pub device_type: String,
    /// Files in transfer order
    pub files: Vec<FileEntry>,
}

impl OfferPayload {
    /// Sum of all announced sizes, saturating at `u64::MAX`.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.files
            .iter()
            .fold(0u64, |acc, f| acc.saturating_add(f.size))
    }
}

/// Receiver → Sender: `1` to accept, `0` to reject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponsePayload {
    /// The decision
    pub response: u8,
}

impl ResponsePayload {
    /// Build a response from an accept/reject decision.
    #[must_use]
    pub const fn new(accepted: bool) -> Self {
        Self {
            response: accepted as u8,
        }
    }
}

/// Encode a message payload to JSON bytes.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode_payload<T: Serialize>(payload: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(payload).map_err(|e| Error::Serialization(e.to_string()))
}

fn violation(what: &str) -> Error {
    Error::ProtocolViolation(what.to_string())
}

/// Parse and validate the sender's offer.
///
/// The device name must be a string and the file list non-empty. Every
/// entry needs a safe string filename and a non-negative numeric size;
/// fractional sizes are truncated. The sizes must sum to at most
/// `u64::MAX`. A missing or non-string device type is treated as empty.
///
/// # Errors
///
/// Returns [`Error::ProtocolViolation`] on any schema problem.
pub fn parse_offer(data: &[u8]) -> Result<OfferPayload> {
    let value: Value =
        serde_json::from_slice(data).map_err(|_| violation("file list is not valid JSON"))?;

    let device_name = value
        .get("device_name")
        .and_then(Value::as_str)
        .ok_or_else(|| violation("missing device name"))?
        .to_string();

    let device_type = value
        .get("device_type")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let entries = value
        .get("files")
        .and_then(Value::as_array)
        .ok_or_else(|| violation("missing file list"))?;
    if entries.is_empty() {
        return Err(violation("empty file list"));
    }

    let files = entries
        .iter()
        .map(parse_file_entry)
        .collect::<Result<Vec<_>>>()?;

    files
        .iter()
        .try_fold(0u64, |acc, f| acc.checked_add(f.size))
        .ok_or_else(|| violation("total size overflows"))?;

    Ok(OfferPayload {
        device_name,
        device_type,
        files,
    })
}

fn parse_file_entry(entry: &Value) -> Result<FileEntry> {
    let filename = entry
        .get("filename")
        .and_then(Value::as_str)
        .ok_or_else(|| violation("file entry without a filename"))?;
    validate_file_name(filename)
        .map_err(|_| Error::ProtocolViolation(format!("unsafe filename {filename:?}")))?;

    let size = entry
        .get("size")
        .and_then(parse_size)
        .ok_or_else(|| Error::ProtocolViolation(format!("invalid size for {filename:?}")))?;

    Ok(FileEntry {
        filename: filename.to_string(),
        size,
    })
}

fn parse_size(value: &Value) -> Option<u64> {
    if let Some(size) = value.as_u64() {
        return Some(size);
    }
    let size = value.as_f64()?;
    if size.is_finite() && size >= 0.0 && size < u64::MAX as f64 {
        Some(size.trunc() as u64)
    } else {
        None
    }
}

/// Parse the receiver's decision.
///
/// The value is truncated toward zero first, so `0.5` is a rejection.
///
/// # Errors
///
/// Returns [`Error::ProtocolViolation`] if the message has no numeric
/// `response` field.
pub fn parse_response(data: &[u8]) -> Result<bool> {
    let value: Value =
        serde_json::from_slice(data).map_err(|_| violation("response is not valid JSON"))?;

    let response = value
        .get("response")
        .and_then(Value::as_f64)
        .ok_or_else(|| violation("missing response"))?;

    Ok(response.trunc() != 0.0)
}
