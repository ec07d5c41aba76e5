//! Common test utilities for `LANDrop` integration tests.
//!
//! This module provides shared functionality for integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use landrop_core::file::SourceFile;
use landrop_core::transfer::{
    drive, Outcome, Receiver, SessionConfig, SessionEvent, Sender, TransferSession,
};
use tokio::sync::mpsc;

/// Create a temporary directory for test files.
///
/// The directory will be automatically cleaned up when the returned
/// `TempDir` is dropped.
pub fn create_temp_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("Failed to create temp directory")
}

/// Create a test file with the given content.
pub fn create_test_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).expect("Failed to write test file");
    path
}

/// Generate random bytes for testing.
pub fn random_bytes(size: usize) -> Vec<u8> {
    use rand::RngCore;
    let mut bytes = vec![0u8; size];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

/// Assert that two files have identical content.
pub fn assert_files_equal(path1: &Path, path2: &Path) {
    let content1 = std::fs::read(path1).expect("Failed to read first file");
    let content2 = std::fs::read(path2).expect("Failed to read second file");
    assert_eq!(content1, content2, "File contents differ");
}

/// Session settings without the completion delay.
pub fn test_session_config() -> SessionConfig {
    SessionConfig {
        device_name: "test-sender".to_string(),
        device_type: "test".to_string(),
        completion_grace: Duration::ZERO,
        ..SessionConfig::default()
    }
}

/// Result of running both ends of a session against each other.
pub struct PairResult {
    /// Events seen by the sender, `Ended` included
    pub sender_events: Vec<SessionEvent>,
    /// Events seen by the receiver, `Ended` included
    pub receiver_events: Vec<SessionEvent>,
    /// Sender outcome
    pub sender: Outcome,
    /// Receiver outcome
    pub receiver: Outcome,
}

/// Run a sender and a receiver over an in-memory duplex stream.
///
/// `decide` is asked once for the receiver's answer when the offer
/// arrives; `None` drops the decision channel instead.
pub async fn run_pair(
    files: &[PathBuf],
    download_path: &Path,
    chunk_size: usize,
    decide: Option<bool>,
) -> PairResult {
    let (sender_stream, receiver_stream) = tokio::io::duplex(16 * 1024);

    let sources = files
        .iter()
        .map(|path| SourceFile::open(path).expect("open source"))
        .collect();
    let sender = TransferSession::new(
        Sender::new("alice", "linux", sources, chunk_size).expect("sender"),
    );
    let receiver = TransferSession::new(Receiver::new(download_path));

    let (sender_tx, mut sender_rx) = mpsc::unbounded_channel();
    let (receiver_tx, mut receiver_rx) = mpsc::unbounded_channel();
    let (decision_tx, decision_rx) = mpsc::unbounded_channel();

    let sender_task = tokio::spawn(drive(sender_stream, sender, sender_tx, None, Duration::ZERO));
    let receiver_task = tokio::spawn(drive(
        receiver_stream,
        receiver,
        receiver_tx,
        Some(decision_rx),
        Duration::ZERO,
    ));

    let mut decision_tx = Some(decision_tx);
    let mut receiver_events = Vec::new();
    while let Some(event) = receiver_rx.recv().await {
        if matches!(event, SessionEvent::Offer(_)) {
            match decide {
                Some(accepted) => {
                    if let Some(tx) = &decision_tx {
                        tx.send(accepted).expect("send decision");
                    }
                }
                None => decision_tx = None,
            }
        }
        receiver_events.push(event);
    }

    let mut sender_events = Vec::new();
    while let Some(event) = sender_rx.recv().await {
        sender_events.push(event);
    }

    PairResult {
        sender_events,
        receiver_events,
        sender: sender_task.await.expect("sender task"),
        receiver: receiver_task.await.expect("receiver task"),
    }
}

/// The fingerprint reported in a list of events.
pub fn fingerprint(events: &[SessionEvent]) -> Option<&str> {
    events.iter().find_map(|event| match event {
        SessionEvent::Fingerprint(code) => Some(code.as_str()),
        _ => None,
    })
}

/// All `Progress` events as `(transferred, total)` pairs.
pub fn progress(events: &[SessionEvent]) -> Vec<(u64, u64)> {
    events
        .iter()
        .filter_map(|event| match event {
            SessionEvent::Progress { transferred, total } => Some((*transferred, *total)),
            _ => None,
        })
        .collect()
}
