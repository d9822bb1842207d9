//! TCP chunk client (sender side).
//!
//! Connects to the receiver, announces the file, and sends chunks one at a
//! time, waiting for each acknowledgement.

use std::net::SocketAddr;

use chunkup_transfer::{Chunk, checksum_bytes};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tracing::{debug, info};

use crate::error::DataChannelError;
use crate::wire::{FileHeader, read_ack, write_chunk_frame, write_end_frame, write_file_header};
use crate::{TCP_BUFFER_SIZE, TCP_CONNECT_TIMEOUT, TCP_HEADER_TIMEOUT};

/// One file's connection to a [`TcpChunkReceiver`](crate::TcpChunkReceiver).
pub struct TcpChunkClient {
    reader: OwnedReadHalf,
    writer: BufWriter<OwnedWriteHalf>,
    header: FileHeader,
    sent: u64,
}

impl TcpChunkClient {
    /// Connects to `addr` and announces `header`.
    ///
    /// Fails with [`DataChannelError::Rejected`] if the receiver refuses the
    /// file (e.g. an unsafe name).
    pub async fn connect(addr: SocketAddr, header: FileHeader) -> Result<Self, DataChannelError> {
        let stream = match tokio::time::timeout(TCP_CONNECT_TIMEOUT, TcpStream::connect(addr)).await
        {
            Ok(Ok(s)) => s,
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(DataChannelError::Timeout),
        };
        stream.set_nodelay(true)?;
        info!(%addr, file = %header.name, "TCP data channel connected");

        let (reader, writer) = stream.into_split();
        let mut reader = reader;
        let mut writer = BufWriter::with_capacity(TCP_BUFFER_SIZE, writer);

        write_file_header(&mut writer, &header).await?;
        writer.flush().await?;

        let accepted = match tokio::time::timeout(TCP_HEADER_TIMEOUT, read_ack(&mut reader)).await {
            Ok(result) => result?,
            Err(_) => return Err(DataChannelError::Timeout),
        };
        if !accepted {
            return Err(DataChannelError::Rejected(format!(
                "file header for {}",
                header.name
            )));
        }

        Ok(Self {
            reader,
            writer,
            header,
            sent: 0,
        })
    }

    /// Sends one chunk and waits until the receiver has written it.
    pub async fn send_chunk(&mut self, chunk: &Chunk) -> Result<(), DataChannelError> {
        if chunk.checksum.is_empty() {
            let checked = Chunk {
                checksum: checksum_bytes(&chunk.data),
                ..chunk.clone()
            };
            write_chunk_frame(&mut self.writer, &checked).await?;
        } else {
            write_chunk_frame(&mut self.writer, chunk).await?;
        }
        self.writer.flush().await?;

        if !read_ack(&mut self.reader).await? {
            return Err(DataChannelError::Rejected(format!(
                "chunk at offset {}",
                chunk.offset
            )));
        }

        self.sent += chunk.data.len() as u64;
        debug!(offset = chunk.offset, len = chunk.data.len(), "chunk acknowledged");
        Ok(())
    }

    /// Sends the end frame and waits for the receiver to confirm the file.
    ///
    /// Returns the total bytes sent.
    pub async fn finish(&mut self) -> Result<u64, DataChannelError> {
        write_end_frame(&mut self.writer).await?;
        self.writer.flush().await?;

        if !read_ack(&mut self.reader).await? {
            return Err(DataChannelError::Rejected(format!(
                "incomplete file {}",
                self.header.name
            )));
        }

        info!(file = %self.header.name, bytes = self.sent, "TCP data channel: file sent");
        Ok(self.sent)
    }

    /// Bytes acknowledged so far.
    pub fn sent(&self) -> u64 {
        self.sent
    }

    /// The announced file.
    pub fn header(&self) -> &FileHeader {
        &self.header
    }
}
