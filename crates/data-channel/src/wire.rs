//! TCP wire format for chunk transfers.
//!
//! # Wire format
//!
//! ```text
//! FILE HEADER (sender -> receiver):
//!   [2 bytes BE: name_len]
//!   [name_len bytes: file name UTF-8]
//!   [8 bytes BE: file_size]
//! ACK (receiver -> sender):  [1 byte: 0x01=OK, 0x00=rejected]
//!
//! PER CHUNK (sender -> receiver):
//!   [1 byte: 0x01]
//!   [8 bytes BE: offset]
//!   [4 bytes BE: len]
//!   [64 bytes: SHA-256 hex checksum ASCII]
//!   [len bytes: chunk data]
//! ACK (receiver -> sender):  [1 byte]
//!
//! END (sender -> receiver):  [1 byte: 0x02]
//! ACK (receiver -> sender):  [1 byte]
//! ```

use chunkup_transfer::Chunk;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::MAX_CHUNK_LEN;
use crate::error::DataChannelError;

/// Acknowledgement: accepted.
pub const ACK_OK: u8 = 0x01;

/// Acknowledgement: rejected.
pub const ACK_REJECTED: u8 = 0x00;

/// Frame tag: chunk follows.
pub const FRAME_CHUNK: u8 = 0x01;

/// Frame tag: end of file.
pub const FRAME_END: u8 = 0x02;

/// Checksum length in bytes (64 hex characters).
pub const CHECKSUM_LEN: usize = 64;

/// The file announced at the start of a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    /// Plain file name (no directories).
    pub name: String,
    /// Total file size in bytes.
    pub file_size: u64,
}

/// A frame following the file header.
#[derive(Debug, Clone)]
pub enum Frame {
    Chunk(Chunk),
    End,
}

/// Writes a file header to the stream.
pub async fn write_file_header<W: AsyncWrite + Unpin>(
    writer: &mut W,
    header: &FileHeader,
) -> Result<(), DataChannelError> {
    let name_bytes = header.name.as_bytes();
    let name_len = name_bytes.len();
    if name_len == 0 || name_len > u16::MAX as usize {
        return Err(DataChannelError::Protocol(format!(
            "name length {name_len} out of range (1..={})",
            u16::MAX
        )));
    }

    writer.write_u16(name_len as u16).await?;
    writer.write_all(name_bytes).await?;
    writer.write_u64(header.file_size).await?;
    Ok(())
}

/// Reads a file header from the stream.
pub async fn read_file_header<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<FileHeader, DataChannelError> {
    let name_len = reader.read_u16().await?;
    if name_len == 0 {
        return Err(DataChannelError::Protocol("empty file name".into()));
    }

    let mut name_buf = vec![0u8; name_len as usize];
    reader.read_exact(&mut name_buf).await?;
    let name = String::from_utf8(name_buf)
        .map_err(|e| DataChannelError::Protocol(format!("invalid UTF-8 name: {e}")))?;

    let file_size = reader.read_u64().await?;

    Ok(FileHeader { name, file_size })
}

/// Writes a chunk frame. The chunk must carry a full hex checksum.
pub async fn write_chunk_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    chunk: &Chunk,
) -> Result<(), DataChannelError> {
    if chunk.checksum.len() != CHECKSUM_LEN {
        return Err(DataChannelError::Protocol(format!(
            "checksum must be {CHECKSUM_LEN} bytes, got {}",
            chunk.checksum.len()
        )));
    }
    let len = u32::try_from(chunk.data.len())
        .ok()
        .filter(|len| *len <= MAX_CHUNK_LEN)
        .ok_or_else(|| {
            DataChannelError::Protocol(format!("chunk too large: {} bytes", chunk.data.len()))
        })?;

    writer.write_u8(FRAME_CHUNK).await?;
    writer.write_u64(chunk.offset).await?;
    writer.write_u32(len).await?;
    writer.write_all(chunk.checksum.as_bytes()).await?;
    writer.write_all(&chunk.data).await?;
    Ok(())
}

/// Writes the end-of-file frame.
pub async fn write_end_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
) -> Result<(), DataChannelError> {
    writer.write_u8(FRAME_END).await?;
    Ok(())
}

/// Reads the next frame.
///
/// Returns `None` if the sender closed the connection cleanly between
/// frames.
pub async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<Option<Frame>, DataChannelError> {
    let tag = match reader.read_u8().await {
        Ok(tag) => tag,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    match tag {
        FRAME_END => Ok(Some(Frame::End)),
        FRAME_CHUNK => {
            let offset = reader.read_u64().await?;
            let len = reader.read_u32().await?;
            if len > MAX_CHUNK_LEN {
                return Err(DataChannelError::Protocol(format!(
                    "chunk too large: {len} bytes (max {MAX_CHUNK_LEN})"
                )));
            }

            let mut checksum = [0u8; CHECKSUM_LEN];
            reader.read_exact(&mut checksum).await?;
            let checksum = String::from_utf8(checksum.to_vec())
                .map_err(|e| DataChannelError::Protocol(format!("invalid checksum: {e}")))?;

            let mut data = vec![0u8; len as usize];
            reader.read_exact(&mut data).await?;

            Ok(Some(Frame::Chunk(Chunk {
                offset,
                data,
                checksum,
            })))
        }
        other => Err(DataChannelError::Protocol(format!(
            "unknown frame tag: {other:#04x}"
        ))),
    }
}

/// Writes an acknowledgement byte.
pub async fn write_ack<W: AsyncWrite + Unpin>(
    writer: &mut W,
    accepted: bool,
) -> Result<(), DataChannelError> {
    writer
        .write_u8(if accepted { ACK_OK } else { ACK_REJECTED })
        .await?;
    writer.flush().await?;
    Ok(())
}

/// Reads an acknowledgement byte.
pub async fn read_ack<R: AsyncRead + Unpin>(reader: &mut R) -> Result<bool, DataChannelError> {
    let byte = reader.read_u8().await?;
    Ok(byte == ACK_OK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunkup_transfer::checksum_bytes;

    fn chunk(offset: u64, data: &[u8]) -> Chunk {
        Chunk {
            offset,
            data: data.to_vec(),
            checksum: checksum_bytes(data),
        }
    }

    #[tokio::test]
    async fn file_header_roundtrip() {
        let header = FileHeader {
            name: "matrix.tsv".into(),
            file_size: 26_214_400,
        };

        let mut buf = Vec::new();
        write_file_header(&mut buf, &header).await.unwrap();

        let mut cursor = &buf[..];
        let parsed = read_file_header(&mut cursor).await.unwrap();
        assert_eq!(parsed, header);
    }

    #[tokio::test]
    async fn chunks_then_end_frame() {
        let mut buf = Vec::new();
        write_chunk_frame(&mut buf, &chunk(0, b"hello ")).await.unwrap();
        write_chunk_frame(&mut buf, &chunk(6, b"world")).await.unwrap();
        write_end_frame(&mut buf).await.unwrap();

        let mut cursor = &buf[..];
        let Some(Frame::Chunk(c1)) = read_frame(&mut cursor).await.unwrap() else {
            panic!("expected chunk frame");
        };
        assert_eq!(c1.offset, 0);
        assert_eq!(c1.data, b"hello ");
        assert_eq!(c1.checksum, checksum_bytes(b"hello "));

        let Some(Frame::Chunk(c2)) = read_frame(&mut cursor).await.unwrap() else {
            panic!("expected chunk frame");
        };
        assert_eq!(c2.offset, 6);
        assert_eq!(c2.data, b"world");

        assert!(matches!(
            read_frame(&mut cursor).await.unwrap(),
            Some(Frame::End)
        ));
        assert!(read_frame(&mut cursor).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn ack_bytes() {
        let mut buf = Vec::new();
        write_ack(&mut buf, true).await.unwrap();
        write_ack(&mut buf, false).await.unwrap();
        assert_eq!(buf, vec![ACK_OK, ACK_REJECTED]);

        let mut cursor = &buf[..];
        assert!(read_ack(&mut cursor).await.unwrap());
        assert!(!read_ack(&mut cursor).await.unwrap());
    }

    #[tokio::test]
    async fn chunk_without_checksum_is_rejected() {
        let mut buf = Vec::new();
        let unchecked = Chunk {
            offset: 0,
            data: b"data".to_vec(),
            checksum: String::new(),
        };
        let result = write_chunk_frame(&mut buf, &unchecked).await;
        assert!(matches!(result, Err(DataChannelError::Protocol(_))));
        assert!(buf.is_empty());
    }

    #[tokio::test]
    async fn unknown_frame_tag() {
        let buf = [0x7fu8];
        let mut cursor = &buf[..];
        let result = read_frame(&mut cursor).await;
        assert!(matches!(result, Err(DataChannelError::Protocol(_))));
    }

    #[tokio::test]
    async fn oversized_chunk_header_is_rejected() {
        let mut buf = vec![FRAME_CHUNK];
        buf.extend_from_slice(&0u64.to_be_bytes());
        buf.extend_from_slice(&(MAX_CHUNK_LEN + 1).to_be_bytes());
        let mut cursor = &buf[..];
        let result = read_frame(&mut cursor).await;
        assert!(matches!(result, Err(DataChannelError::Protocol(_))));
    }

    #[tokio::test]
    async fn truncated_chunk_is_io_error() {
        let mut buf = Vec::new();
        write_chunk_frame(&mut buf, &chunk(0, b"abcdef")).await.unwrap();
        buf.truncate(buf.len() - 2);
        let mut cursor = &buf[..];
        let result = read_frame(&mut cursor).await;
        assert!(matches!(result, Err(DataChannelError::Io(_))));
    }

    #[tokio::test]
    async fn name_too_long() {
        let header = FileHeader {
            name: "a".repeat(u16::MAX as usize + 1),
            file_size: 0,
        };
        let mut buf = Vec::new();
        let result = write_file_header(&mut buf, &header).await;
        assert!(result.is_err());
    }
}
