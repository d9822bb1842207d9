use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::debug;

use crate::types::{ByteRange, Chunk, FileHandle};
use crate::{DEFAULT_CHUNK_SIZE, TransferError};

// ---------------------------------------------------------------------------
// Checksum helpers
// ---------------------------------------------------------------------------

/// Computes SHA-256 of `data` and returns the hex-encoded digest.
pub fn checksum_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

// ---------------------------------------------------------------------------
// Range arithmetic
// ---------------------------------------------------------------------------

/// Returns the range `[offset, min(offset + chunk_size, size))`.
///
/// `None` once `offset >= size`, so an empty file yields no ranges at all.
pub fn next_range(size: u64, offset: u64, chunk_size: usize) -> Option<ByteRange> {
    if offset >= size || chunk_size == 0 {
        return None;
    }
    let end = offset.saturating_add(chunk_size as u64).min(size);
    Some(ByteRange { start: offset, end })
}

// ---------------------------------------------------------------------------
// ChunkReader
// ---------------------------------------------------------------------------

/// Reads a file in fixed-size chunks with automatic SHA-256 checksums.
///
/// The file is opened on the first read and only one chunk is held in memory
/// at a time.
pub struct ChunkReader {
    file: Option<tokio::fs::File>,
    path: PathBuf,
    chunk_size: usize,
    offset: u64,
    file_size: u64,
}

impl ChunkReader {
    /// Prepares chunked reading of `handle`.
    ///
    /// If `chunk_size` is 0, [`DEFAULT_CHUNK_SIZE`] (10 MiB) is used.
    pub fn new(handle: &FileHandle, chunk_size: usize) -> Self {
        let chunk_size = if chunk_size == 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            chunk_size
        };
        Self {
            file: None,
            path: handle.path().to_path_buf(),
            chunk_size,
            offset: 0,
            file_size: handle.size(),
        }
    }

    /// Materializes the bytes of `range`.
    ///
    /// Fails with [`TransferError::ShortRead`] if the file ends before the
    /// range does (truncated after selection).
    pub async fn read_range(&mut self, range: ByteRange) -> Result<Chunk, TransferError> {
        let file = match self.file.as_mut() {
            Some(f) => f,
            None => self.file.insert(tokio::fs::File::open(&self.path).await?),
        };
        file.seek(SeekFrom::Start(range.start)).await?;

        let expected = range.len() as usize;
        let mut buf = vec![0u8; expected];
        let mut filled = 0;
        while filled < expected {
            let n = file.read(&mut buf[filled..]).await?;
            if n == 0 {
                return Err(TransferError::ShortRead {
                    offset: range.start,
                    expected,
                    actual: filled,
                });
            }
            filled += n;
        }

        debug!(offset = range.start, len = expected, "chunk read");
        let checksum = checksum_bytes(&buf);
        Ok(Chunk {
            offset: range.start,
            data: buf,
            checksum,
        })
    }

    /// Reads the next chunk. Returns `None` once the file is exhausted.
    pub async fn next_chunk(&mut self) -> Result<Option<Chunk>, TransferError> {
        let Some(range) = next_range(self.file_size, self.offset, self.chunk_size) else {
            return Ok(None);
        };
        let chunk = self.read_range(range).await?;
        self.offset = range.end;
        Ok(Some(chunk))
    }

    /// Configured chunk size.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Current byte offset of the sequential cursor.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Total file size in bytes.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Bytes remaining to read.
    pub fn remaining(&self) -> u64 {
        self.file_size.saturating_sub(self.offset)
    }
}

// ---------------------------------------------------------------------------
// ChunkWriter
// ---------------------------------------------------------------------------

/// Writes chunks of one file at exact offsets with checksum verification.
pub struct ChunkWriter {
    file: tokio::fs::File,
    path: PathBuf,
    written: u64,
}

impl ChunkWriter {
    /// Creates (or truncates) `dir/name` for writing.
    ///
    /// `name` must be a plain file name; see [`crate::validate_file_name`].
    pub async fn create(dir: &Path, name: &str) -> Result<Self, TransferError> {
        crate::validate_file_name(name)?;
        tokio::fs::create_dir_all(dir).await?;

        let path = dir.join(name);
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .await?;
        Ok(Self {
            file,
            path,
            written: 0,
        })
    }

    /// Writes a chunk at its offset, verifying the checksum if non-empty.
    pub async fn write_chunk(&mut self, chunk: &Chunk) -> Result<(), TransferError> {
        if !chunk.checksum.is_empty() && checksum_bytes(&chunk.data) != chunk.checksum {
            return Err(TransferError::ChecksumMismatch(chunk.offset));
        }

        self.file.seek(SeekFrom::Start(chunk.offset)).await?;
        self.file.write_all(&chunk.data).await?;
        self.written = self.written.max(chunk.offset + chunk.data.len() as u64);
        Ok(())
    }

    /// Flushes and syncs the file to disk.
    pub async fn finish(mut self) -> Result<u64, TransferError> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        Ok(self.written)
    }

    /// Highest byte offset written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Output path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MIB: u64 = 1024 * 1024;

    fn create_test_file(dir: &Path, name: &str, data: &[u8]) -> FileHandle {
        let path = dir.join(name);
        std::fs::write(&path, data).unwrap();
        FileHandle::new(path, name, data.len() as u64)
    }

    fn all_ranges(size: u64, chunk_size: usize) -> Vec<ByteRange> {
        let mut ranges = Vec::new();
        let mut offset = 0;
        while let Some(r) = next_range(size, offset, chunk_size) {
            offset = r.end;
            ranges.push(r);
        }
        ranges
    }

    #[test]
    fn checksum_bytes_deterministic() {
        let c1 = checksum_bytes(b"hello world");
        let c2 = checksum_bytes(b"hello world");
        assert_eq!(c1, c2);
        assert_eq!(c1.len(), 64); // SHA-256 = 64 hex chars.
        assert_ne!(c1, checksum_bytes(b"hello"));
    }

    #[test]
    fn ranges_cover_file_exactly() {
        for size in [1u64, 2, 9, 10, 11, 25, 99, 100, 1000] {
            for chunk_size in [1usize, 3, 10, 64, 1000, 4096] {
                let ranges = all_ranges(size, chunk_size);
                let mut expected_start = 0;
                for r in &ranges {
                    assert_eq!(r.start, expected_start, "gap or overlap");
                    assert!(!r.is_empty());
                    expected_start = r.end;
                }
                assert_eq!(expected_start, size);
                assert_eq!(ranges.iter().map(ByteRange::len).sum::<u64>(), size);

                let tail = size % chunk_size as u64;
                let last = ranges.last().unwrap().len();
                if tail == 0 {
                    assert_eq!(last, chunk_size as u64);
                } else {
                    assert_eq!(last, tail);
                }
            }
        }
    }

    #[test]
    fn ranges_for_25_mib_in_10_mib_chunks() {
        let lens: Vec<u64> = all_ranges(25 * MIB, 10 * MIB as usize)
            .iter()
            .map(ByteRange::len)
            .collect();
        assert_eq!(lens, vec![10 * MIB, 10 * MIB, 5 * MIB]);
    }

    #[test]
    fn empty_file_has_no_ranges() {
        assert!(next_range(0, 0, 10).is_none());
        assert!(all_ranges(0, 10).is_empty());
    }

    #[test]
    fn range_past_end_is_none() {
        assert!(next_range(10, 10, 4).is_none());
        assert!(next_range(10, 12, 4).is_none());
    }

    #[tokio::test]
    async fn chunk_reader_reads_all() {
        let dir = TempDir::new().unwrap();
        let handle = create_test_file(dir.path(), "test.bin", b"AABBCCDDEE");

        let mut reader = ChunkReader::new(&handle, 4);
        assert_eq!(reader.file_size(), 10);
        assert_eq!(reader.remaining(), 10);

        let c1 = reader.next_chunk().await.unwrap().unwrap();
        assert_eq!(c1.offset, 0);
        assert_eq!(&c1.data, b"AABB");
        assert_eq!(c1.checksum, checksum_bytes(b"AABB"));
        assert_eq!(reader.remaining(), 6);

        let c2 = reader.next_chunk().await.unwrap().unwrap();
        assert_eq!(c2.offset, 4);
        assert_eq!(&c2.data, b"CCDD");

        let c3 = reader.next_chunk().await.unwrap().unwrap();
        assert_eq!(c3.offset, 8);
        assert_eq!(&c3.data, b"EE");

        assert!(reader.next_chunk().await.unwrap().is_none());
        assert_eq!(reader.offset(), 10);
    }

    #[tokio::test]
    async fn chunk_reader_empty_file_never_opens() {
        let dir = TempDir::new().unwrap();
        let handle = FileHandle::new(dir.path().join("absent.bin"), "absent.bin", 0);
        let mut reader = ChunkReader::new(&handle, 4);
        assert!(reader.next_chunk().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn chunk_reader_default_chunk_size() {
        let dir = TempDir::new().unwrap();
        let handle = create_test_file(dir.path(), "test.bin", b"x");
        let reader = ChunkReader::new(&handle, 0);
        assert_eq!(reader.chunk_size(), DEFAULT_CHUNK_SIZE);
    }

    #[tokio::test]
    async fn chunk_reader_read_range_out_of_order() {
        let dir = TempDir::new().unwrap();
        let handle = create_test_file(dir.path(), "test.bin", b"0123456789");
        let mut reader = ChunkReader::new(&handle, 4);

        let c = reader
            .read_range(ByteRange { start: 6, end: 10 })
            .await
            .unwrap();
        assert_eq!(&c.data, b"6789");
        let c = reader.read_range(ByteRange { start: 0, end: 2 }).await.unwrap();
        assert_eq!(&c.data, b"01");
    }

    #[tokio::test]
    async fn chunk_reader_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let handle = create_test_file(dir.path(), "test.bin", b"0123456789");
        std::fs::remove_file(handle.path()).unwrap();

        let mut reader = ChunkReader::new(&handle, 4);
        let result = reader.next_chunk().await;
        assert!(matches!(result, Err(TransferError::Io(_))));
    }

    #[tokio::test]
    async fn chunk_reader_truncated_file_is_short_read() {
        let dir = TempDir::new().unwrap();
        let handle = create_test_file(dir.path(), "test.bin", b"0123456789");
        std::fs::write(handle.path(), b"012345").unwrap();

        let mut reader = ChunkReader::new(&handle, 4);
        reader.next_chunk().await.unwrap().unwrap();
        let result = reader.next_chunk().await;
        assert!(matches!(
            result,
            Err(TransferError::ShortRead {
                offset: 4,
                expected: 4,
                actual: 2
            })
        ));
    }

    #[tokio::test]
    async fn chunk_writer_writes_at_offset() {
        let dir = TempDir::new().unwrap();
        let mut writer = ChunkWriter::create(dir.path(), "out.bin").await.unwrap();

        let world = Chunk {
            offset: 5,
            data: b" World".to_vec(),
            checksum: String::new(),
        };
        writer.write_chunk(&world).await.unwrap();
        assert_eq!(writer.written(), 11);

        let hello = Chunk {
            offset: 0,
            data: b"Hello".to_vec(),
            checksum: checksum_bytes(b"Hello"),
        };
        writer.write_chunk(&hello).await.unwrap();
        assert_eq!(writer.written(), 11);

        let path = writer.path().to_path_buf();
        assert_eq!(writer.finish().await.unwrap(), 11);
        assert_eq!(std::fs::read(path).unwrap(), b"Hello World");
    }

    #[tokio::test]
    async fn chunk_writer_verifies_checksum() {
        let dir = TempDir::new().unwrap();
        let mut writer = ChunkWriter::create(dir.path(), "bad.bin").await.unwrap();

        let chunk = Chunk {
            offset: 3,
            data: b"test data".to_vec(),
            checksum: "0".repeat(64),
        };
        let result = writer.write_chunk(&chunk).await;
        assert!(matches!(result, Err(TransferError::ChecksumMismatch(3))));
        assert_eq!(writer.written(), 0);
    }

    #[tokio::test]
    async fn chunk_writer_rejects_traversal() {
        let dir = TempDir::new().unwrap();
        let result = ChunkWriter::create(dir.path(), "../escape.bin").await;
        assert!(matches!(result, Err(TransferError::InvalidName(_))));
    }

    #[tokio::test]
    async fn reader_writer_roundtrip() {
        let dir = TempDir::new().unwrap();
        let original = b"The quick brown fox jumps over the lazy dog";
        let handle = create_test_file(dir.path(), "src.txt", original);

        let mut reader = ChunkReader::new(&handle, 10);
        let dst = dir.path().join("dst");
        let mut writer = ChunkWriter::create(&dst, "src.txt").await.unwrap();
        while let Some(chunk) = reader.next_chunk().await.unwrap() {
            writer.write_chunk(&chunk).await.unwrap();
        }
        writer.finish().await.unwrap();

        assert_eq!(std::fs::read(dst.join("src.txt")).unwrap(), original);
    }
}
