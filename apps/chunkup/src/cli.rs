//! Command-line interface.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Chunked file transfer with progress and cancellation.
#[derive(Debug, Parser)]
#[command(name = "chunkup", version, about)]
pub struct Cli {
    /// Configuration file (defaults to ~/.config/chunkup/chunkup.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Send a file in chunks. Ctrl-C cancels the transfer.
    Send {
        /// File to send
        file: PathBuf,

        /// Receiver address; without it chunks go to a simulated transport
        #[arg(long)]
        to: Option<SocketAddr>,

        /// Chunk size ("10MiB", "512KiB", "4096")
        #[arg(long)]
        chunk_size: Option<String>,

        /// Per-chunk delay of the simulated transport, in milliseconds
        #[arg(long)]
        delay_ms: Option<u64>,

        /// Upper bound on one chunk send, in seconds (0 disables)
        #[arg(long)]
        timeout_secs: Option<u64>,
    },

    /// Receive files over TCP until Ctrl-C.
    Receive {
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1:9410")]
        listen: SocketAddr,

        /// Output directory
        #[arg(long)]
        out: Option<PathBuf>,
    },
}
