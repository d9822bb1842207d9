//! [`ChunkSink`] over the TCP data channel.

use std::net::SocketAddr;

use chunkup_controller::{ChunkSink, SendFuture, TransportError};
use chunkup_data_channel::{DataChannelError, FileHeader, TcpChunkClient};
use chunkup_transfer::{Chunk, FileHandle};
use tokio::sync::Mutex;

/// Sends chunks to a remote `chunkup receive`.
pub struct TcpSink {
    client: Mutex<TcpChunkClient>,
}

impl TcpSink {
    /// Connects to `addr` and announces `file`.
    pub async fn connect(addr: SocketAddr, file: &FileHandle) -> Result<Self, DataChannelError> {
        let header = FileHeader {
            name: file.name().to_string(),
            file_size: file.size(),
        };
        let client = TcpChunkClient::connect(addr, header).await?;
        Ok(Self {
            client: Mutex::new(client),
        })
    }

    /// Sends the end frame once every chunk has been acknowledged.
    pub async fn finish(&self) -> Result<u64, DataChannelError> {
        self.client.lock().await.finish().await
    }
}

fn to_transport(err: DataChannelError) -> TransportError {
    match err {
        DataChannelError::Io(e) => TransportError::Io(e),
        other => TransportError::Rejected(other.to_string()),
    }
}

impl ChunkSink for TcpSink {
    fn send_chunk<'a>(&'a self, chunk: &'a Chunk) -> SendFuture<'a> {
        Box::pin(async move {
            self.client
                .lock()
                .await
                .send_chunk(chunk)
                .await
                .map_err(to_transport)
        })
    }
}
