//! Chunked file reading and writing with per-chunk checksums.
//!
//! [`ChunkReader`] partitions a selected file into fixed-size byte ranges and
//! materializes one range at a time. [`ChunkWriter`] is the receiving half:
//! it writes chunks back at their exact offsets.

mod chunked;
mod progress;
mod types;
mod validation;

pub use chunked::{ChunkReader, ChunkWriter, checksum_bytes, next_range};
pub use progress::{ProgressEvent, SpeedCalculator, percent};
pub use types::{ByteRange, Chunk, FileHandle};
pub use validation::validate_file_name;

/// Default chunk size: 10 MiB.
pub const DEFAULT_CHUNK_SIZE: usize = 10 * 1024 * 1024;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("short read at offset {offset}: expected {expected} bytes, got {actual}")]
    ShortRead {
        offset: u64,
        expected: usize,
        actual: usize,
    },

    #[error("not a regular file: {0}")]
    NotAFile(String),

    #[error("checksum mismatch at offset {0}")]
    ChecksumMismatch(u64),

    #[error("invalid file name: {0}")]
    InvalidName(String),
}
