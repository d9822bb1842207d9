//! TCP chunk receiver.
//!
//! Accepts connections, validates the announced file name, then verifies,
//! writes and acknowledges chunks in offset order. Out-of-order chunks are
//! rejected. A connection that closes before the end frame leaves no partial
//! file behind.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use chunkup_transfer::{ChunkWriter, validate_file_name};
use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::DataChannelError;
use crate::wire::{FileHeader, Frame, read_file_header, read_frame, write_ack};
use crate::{TCP_BUFFER_SIZE, TCP_HEADER_TIMEOUT};

/// A file received in full.
#[derive(Debug, Clone)]
pub struct ReceivedFile {
    pub name: String,
    pub path: PathBuf,
    pub bytes: u64,
}

/// TCP receiver writing incoming files into one output directory.
#[derive(Debug, Clone)]
pub struct TcpChunkReceiver {
    out_dir: PathBuf,
    cancel: CancellationToken,
}

impl TcpChunkReceiver {
    pub fn new(out_dir: PathBuf, cancel: CancellationToken) -> Self {
        Self { out_dir, cancel }
    }

    /// Binds a listener on `addr` (port 0 picks an ephemeral port).
    pub async fn listen(addr: SocketAddr) -> Result<TcpListener, DataChannelError> {
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %listener.local_addr()?, "TCP data channel listener bound");
        Ok(listener)
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Accepts connections until cancelled, receiving each on its own task.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), DataChannelError> {
        loop {
            let (stream, addr) = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    info!("TCP data channel listener stopped");
                    return Ok(());
                }
                accepted = listener.accept() => match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                        continue;
                    }
                },
            };

            info!(%addr, "TCP data channel connection accepted");
            let receiver = self.clone();
            tokio::spawn(async move {
                match receiver.receive(stream).await {
                    Ok(file) => info!(%addr, file = %file.name, bytes = file.bytes, "file received"),
                    Err(e) => warn!(%addr, error = %e, "receive failed"),
                }
            });
        }
    }

    /// Receives one file over `stream`.
    pub async fn receive(&self, stream: TcpStream) -> Result<ReceivedFile, DataChannelError> {
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::with_capacity(TCP_BUFFER_SIZE, reader);

        let header = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                return Err(DataChannelError::Cancelled);
            }
            result = tokio::time::timeout(TCP_HEADER_TIMEOUT, read_file_header(&mut reader)) => {
                match result {
                    Ok(Ok(h)) => h,
                    Ok(Err(e)) => return Err(e),
                    Err(_) => return Err(DataChannelError::Timeout),
                }
            }
        };

        if let Err(e) = validate_file_name(&header.name) {
            warn!(name = %header.name, "TCP data channel: unsafe file name");
            write_ack(&mut writer, false).await?;
            return Err(e.into());
        }

        let file = match ChunkWriter::create(&self.out_dir, &header.name).await {
            Ok(f) => f,
            Err(e) => {
                write_ack(&mut writer, false).await?;
                return Err(e.into());
            }
        };
        write_ack(&mut writer, true).await?;

        let path = file.path().to_path_buf();
        match self.receive_chunks(&mut reader, &mut writer, file, &header).await {
            Ok(bytes) => Ok(ReceivedFile {
                name: header.name,
                path,
                bytes,
            }),
            Err(e) => {
                if let Err(remove_err) = tokio::fs::remove_file(&path).await {
                    debug!(path = %path.display(), error = %remove_err, "partial file not removed");
                }
                Err(e)
            }
        }
    }

    async fn receive_chunks<R, W>(
        &self,
        reader: &mut R,
        writer: &mut W,
        mut file: ChunkWriter,
        header: &FileHeader,
    ) -> Result<u64, DataChannelError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        // Chunks arrive strictly in order; this is the only offset accepted next.
        let mut expected = 0u64;
        loop {
            let frame = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    return Err(DataChannelError::Cancelled);
                }
                frame = read_frame(reader) => frame?,
            };

            match frame {
                None => {
                    return Err(DataChannelError::Protocol(
                        "connection closed before end frame".into(),
                    ));
                }
                Some(Frame::Chunk(chunk)) => {
                    if chunk.offset != expected {
                        write_ack(writer, false).await?;
                        return Err(DataChannelError::Protocol(format!(
                            "chunk at offset {}, expected {expected}",
                            chunk.offset
                        )));
                    }
                    let end = chunk.offset.saturating_add(chunk.data.len() as u64);
                    if end > header.file_size {
                        write_ack(writer, false).await?;
                        return Err(DataChannelError::Protocol(format!(
                            "chunk ends at {end}, past file size {}",
                            header.file_size
                        )));
                    }
                    if let Err(e) = file.write_chunk(&chunk).await {
                        write_ack(writer, false).await?;
                        return Err(e.into());
                    }
                    expected = end;
                    write_ack(writer, true).await?;
                    debug!(
                        file = %header.name,
                        offset = chunk.offset,
                        len = chunk.data.len(),
                        "chunk written"
                    );
                }
                Some(Frame::End) => {
                    if expected != header.file_size {
                        write_ack(writer, false).await?;
                        return Err(DataChannelError::Protocol(format!(
                            "incomplete file: {expected} of {} bytes",
                            header.file_size
                        )));
                    }
                    let bytes = file.finish().await?;
                    write_ack(writer, true).await?;
                    return Ok(bytes);
                }
            }
        }
    }
}
