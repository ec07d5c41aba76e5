//! FIFO of files still to be streamed in a session.

use std::collections::VecDeque;

use crate::protocol::FileEntry;

/// A file in the transfer queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    /// Base name of the file
    pub filename: String,
    /// Bytes not yet sent or written
    pub remaining: u64,
}

impl From<&FileEntry> for FileMetadata {
    fn from(entry: &FileEntry) -> Self {
        Self {
            filename: entry.filename.clone(),
            remaining: entry.size,
        }
    }
}

/// Ordered queue of files; the front entry is the file being streamed.
///
/// An entry is popped exactly when its `remaining` count reaches zero.
#[derive(Debug, Clone, Default)]
pub struct TransferQueue {
    files: VecDeque<FileMetadata>,
    total_size: u64,
    transferred: u64,
}

impl TransferQueue {
    /// Build a queue from announced entries, fixing the total size.
    #[must_use]
    pub fn new<'a>(entries: impl IntoIterator<Item = &'a FileEntry>) -> Self {
        let files: VecDeque<FileMetadata> = entries.into_iter().map(FileMetadata::from).collect();
        let total_size = files
            .iter()
            .fold(0u64, |acc, f| acc.saturating_add(f.remaining));
        Self {
            files,
            total_size,
            transferred: 0,
        }
    }

    /// The file currently being streamed.
    #[must_use]
    pub fn front(&self) -> Option<&FileMetadata> {
        self.files.front()
    }

    /// Drop every file at the head that has nothing left to stream.
    ///
    /// Returns the names of the skipped files.
    pub fn skip_finished(&mut self) -> Vec<String> {
        let mut skipped = Vec::new();
        while let Some(front) = self.files.front() {
            if front.remaining > 0 {
                break;
            }
            if let Some(done) = self.files.pop_front() {
                skipped.push(done.filename);
            }
        }
        skipped
    }

    /// Account for `len` bytes of the front file.
    ///
    /// Returns the finished entry when the file is now complete; it has
    /// already been removed from the queue.
    pub fn advance(&mut self, len: u64) -> Option<FileMetadata> {
        let front = self.files.front_mut()?;
        let len = len.min(front.remaining);
        front.remaining -= len;
        self.transferred += len;

        if front.remaining == 0 {
            self.files.pop_front()
        } else {
            None
        }
    }

    /// Whether every file has been streamed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Number of files left.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Sum of the sizes fixed when the queue was built.
    #[must_use]
    pub const fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Bytes accounted so far.
    #[must_use]
    pub const fn transferred(&self) -> u64 {
        self.transferred
    }
}
