//! The file a user picked for scanning.

use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::io::AsyncReadExt;

use crate::error::{ScanError, ValidationError};

/// Name and size of a selected file, as recorded on an attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileInfo {
    pub name: String,
    pub size: u64,
}

/// A file selected for scanning.
///
/// Path-backed files learn their size from metadata and are only read after
/// validation passes, so a file rejected by validation is never read.
#[derive(Debug)]
pub struct ScanFile {
    name: String,
    size: u64,
    source: Source,
}

#[derive(Debug)]
enum Source {
    Memory(Vec<u8>),
    Path(PathBuf),
}

impl ScanFile {
    /// Wrap bytes already in memory, e.g. from a drag-and-drop payload.
    #[must_use]
    pub fn from_bytes(name: impl Into<String>, contents: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            size: contents.len() as u64,
            source: Source::Memory(contents),
        }
    }

    /// Select a file on disk without reading it.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the path does not exist, is not a regular
    /// file, or has no usable file name.
    pub async fn from_path(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a regular file", path.display()),
            ));
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("{} has no file name", path.display()),
                )
            })?;

        Ok(Self {
            name,
            size: metadata.len(),
            source: Source::Path(path.to_path_buf()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    #[must_use]
    pub fn info(&self) -> FileInfo {
        FileInfo {
            name: self.name.clone(),
            size: self.size,
        }
    }

    /// Consume the selection and return its bytes, reading from disk if needed.
    ///
    /// At most `max_size + 1` bytes are read, so a file that grew past the
    /// limit after it was selected is caught here rather than uploaded.
    ///
    /// # Errors
    ///
    /// Returns `ScanError::Validation` if the contents exceed `max_size`, or
    /// `ScanError::Io` if a path-backed file can no longer be read.
    pub async fn into_contents(self, max_size: u64) -> Result<Vec<u8>, ScanError> {
        let path = match self.source {
            Source::Memory(bytes) => {
                let size = bytes.len() as u64;
                if size > max_size {
                    return Err(ValidationError::TooLarge { size, max: max_size }.into());
                }
                return Ok(bytes);
            }
            Source::Path(path) => path,
        };

        let file = tokio::fs::File::open(&path).await?;
        let mut contents = Vec::new();
        file.take(max_size.saturating_add(1))
            .read_to_end(&mut contents)
            .await?;

        if contents.len() as u64 > max_size {
            let size = tokio::fs::metadata(&path)
                .await
                .map_or(contents.len() as u64, |m| m.len());
            return Err(ValidationError::TooLarge { size, max: max_size }.into());
        }
        Ok(contents)
    }
}
