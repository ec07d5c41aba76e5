//! File operations for LANDrop.
//!
//! This module is the filesystem edge of a transfer session:
//! - Opening files to send and recording their announced size
//! - Preparing the download directory
//! - Creating received files
//! - Validating file names offered by a peer
//!
//! Files are flat: only the base name of a sent file travels on the wire,
//! and a received name must be a single normal path component.

use std::fs::{File, OpenOptions};
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// A file opened for sending.
#[derive(Debug)]
pub struct SourceFile {
    path: PathBuf,
    filename: String,
    size: u64,
    file: File,
}

impl SourceFile {
    /// Open a file for reading.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not a readable regular file or has no
    /// usable file name.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let metadata = file.metadata()?;
        if metadata.is_dir() {
            return Err(Error::InvalidFileName(path.display().to_string()));
        }

        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::InvalidFileName(path.display().to_string()))?
            .to_string();

        Ok(Self {
            path: path.to_path_buf(),
            filename,
            size: metadata.len(),
            file,
        })
    }

    /// Path the file was opened from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Base name announced to the receiver.
    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Size at open time; this is the size announced to the receiver.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }
}

impl Read for SourceFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

/// Check that a file name offered by a peer is safe to create.
///
/// # Errors
///
/// Returns [`Error::InvalidFileName`] for empty names, `.`/`..`, absolute
/// paths or anything containing a path separator.
pub fn validate_file_name(name: &str) -> Result<()> {
    let mut components = Path::new(name).components();
    let valid = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !name.contains(['/', '\\']);

    if valid {
        Ok(())
    } else {
        Err(Error::InvalidFileName(name.to_string()))
    }
}

/// Create the download directory if needed and make sure it is writable.
///
/// # Errors
///
/// Returns [`Error::Destination`] if the directory cannot be created or a
/// file cannot be created inside it.
pub fn prepare_destination(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|e| Error::destination(dir, e))?;

    let probe = dir.join(".landrop-write-test");
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&probe)
        .map_err(|e| Error::destination(dir, format!("not writable ({e})")))?;
    let _ = std::fs::remove_file(&probe);

    Ok(())
}

/// Create (or truncate) a received file inside the download directory.
///
/// # Errors
///
/// Returns [`Error::InvalidFileName`] for unsafe names and
/// [`Error::Destination`] if the file cannot be opened for writing.
pub fn create_destination_file(dir: &Path, filename: &str) -> Result<File> {
    validate_file_name(filename)?;

    let path = dir.join(filename);
    File::create(&path).map_err(|e| Error::destination(&path, format!("unable to open file ({e})")))
}

/// Format a file size for display.
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}
