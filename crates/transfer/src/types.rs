use std::path::{Path, PathBuf};

use crate::TransferError;

/// A selected source file.
///
/// Size and name are captured once at selection time; the transfer never
/// re-reads metadata, so a file that shrinks afterwards surfaces as a read
/// error on the chunk that crosses the new end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHandle {
    path: PathBuf,
    name: String,
    size: u64,
}

impl FileHandle {
    /// Creates a handle from already-known attributes.
    pub fn new(path: impl Into<PathBuf>, name: impl Into<String>, size: u64) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            size,
        }
    }

    /// Selects `path`, reading its size from the filesystem.
    pub async fn from_path(path: &Path) -> Result<Self, TransferError> {
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(TransferError::NotAFile(path.display().to_string()));
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(path, name, metadata.len()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Display name (final path component).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Size in bytes at selection time.
    pub fn size(&self) -> u64 {
        self.size
    }
}

/// Half-open byte range `[start, end)` within a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Number of bytes covered.
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

/// A materialized chunk of file data.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Byte offset within the file.
    pub offset: u64,
    /// Raw chunk data.
    pub data: Vec<u8>,
    /// SHA-256 hex checksum of `data` (empty means no verification).
    pub checksum: String,
}

impl Chunk {
    /// Length of the chunk in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The byte range this chunk covers.
    pub fn range(&self) -> ByteRange {
        ByteRange {
            start: self.offset,
            end: self.offset + self.data.len() as u64,
        }
    }
}
