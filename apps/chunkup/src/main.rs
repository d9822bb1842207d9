//! chunkup entry point.

mod cli;
mod config;
mod tcp_sink;
mod terminal;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use bytesize::ByteSize;
use chunkup_controller::{
    ChunkSink, ControllerBindings, SimulatedSink, TransferConfig, TransferController,
    TransferEvent, TransferOutcome,
};
use chunkup_data_channel::{MAX_CHUNK_LEN, TcpChunkReceiver};
use chunkup_transfer::{FileHandle, ProgressEvent, SpeedCalculator};
use clap::Parser;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};
use crate::config::{CliConfig, parse_chunk_size};
use crate::tcp_sink::TcpSink;
use crate::terminal::TerminalUi;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs share stderr with the progress bar.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "starting chunkup");

    let config = match CliConfig::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "failed to load config, using defaults");
            CliConfig::default()
        }
    };

    match cli.command {
        Command::Send {
            file,
            to,
            chunk_size,
            delay_ms,
            timeout_secs,
        } => {
            let chunk_size = match chunk_size {
                Some(text) => parse_chunk_size(&text)?,
                None => config.chunk_size_bytes()?,
            };
            let send_timeout = match timeout_secs {
                Some(0) => None,
                Some(secs) => Some(Duration::from_secs(secs)),
                None => config.send_timeout(),
            };
            let delay = delay_ms
                .map(Duration::from_millis)
                .unwrap_or_else(|| config.simulated_delay());
            send(file, to, chunk_size, delay, send_timeout).await
        }
        Command::Receive { listen, out } => {
            let out = out.unwrap_or_else(|| PathBuf::from(&config.receive_dir));
            receive(listen, out).await
        }
    }
}

async fn send(
    path: PathBuf,
    to: Option<SocketAddr>,
    chunk_size: usize,
    delay: Duration,
    send_timeout: Option<Duration>,
) -> anyhow::Result<()> {
    if to.is_some() {
        check_wire_chunk_size(chunk_size)?;
    }
    let file = FileHandle::from_path(&path)
        .await
        .with_context(|| format!("opening {}", path.display()))?;

    let ui = Arc::new(TerminalUi::stderr(file.name()));
    let bindings = ControllerBindings::new(ui.clone(), ui.clone(), ui.clone());

    let (sink, tcp): (Arc<dyn ChunkSink>, Option<Arc<TcpSink>>) = match to {
        Some(addr) => {
            let tcp = Arc::new(
                TcpSink::connect(addr, &file)
                    .await
                    .with_context(|| format!("connecting to {addr}"))?,
            );
            (tcp.clone(), Some(tcp))
        }
        None => {
            info!(delay_ms = delay.as_millis() as u64, "no receiver given, simulating transport");
            (Arc::new(SimulatedSink::new(delay)), None)
        }
    };

    let controller = TransferController::new(bindings, sink, TransferConfig { send_timeout });
    let events = controller
        .take_events()
        .context("transfer events already subscribed")?;

    info!(
        file = %file.name(),
        size = %ByteSize::b(file.size()),
        chunk_size = %ByteSize::b(chunk_size as u64),
        "sending"
    );
    let transfer = controller.start(file, chunk_size)?;

    let trigger = controller.cancel_trigger();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() && trigger.fire() {
            info!("cancel requested");
        }
    });
    let reporter = tokio::spawn(report_throughput(events, ui));

    let outcome = transfer.wait().await;
    ctrl_c.abort();
    let _ = reporter.await;

    let elapsed = controller
        .session()
        .map(|s| s.elapsed())
        .unwrap_or_default();

    match outcome {
        TransferOutcome::Completed { bytes } => {
            if let Some(tcp) = tcp {
                tcp.finish().await.context("receiver rejected the file")?;
            }
            info!(bytes, elapsed_ms = elapsed.as_millis() as u64, "transfer completed");
            Ok(())
        }
        TransferOutcome::Cancelled | TransferOutcome::Superseded => {
            anyhow::bail!("transfer cancelled")
        }
        TransferOutcome::Failed(e) => Err(e).context("transfer failed"),
    }
}

/// Rejects chunk sizes the TCP receiver would refuse.
fn check_wire_chunk_size(chunk_size: usize) -> anyhow::Result<()> {
    if chunk_size as u64 > u64::from(MAX_CHUNK_LEN) {
        anyhow::bail!(
            "chunk size {} exceeds the receiver limit of {}",
            ByteSize::b(chunk_size as u64),
            ByteSize::b(u64::from(MAX_CHUNK_LEN))
        );
    }
    Ok(())
}

/// Feeds acknowledged-chunk events into the throughput readout until the
/// session reaches a terminal event.
async fn report_throughput(
    mut events: mpsc::UnboundedReceiver<TransferEvent>,
    ui: Arc<TerminalUi>,
) {
    let speed = SpeedCalculator::default();

    while let Some(event) = events.recv().await {
        match event {
            TransferEvent::Started { .. } => speed.record(0),
            TransferEvent::Progress(progress) => {
                speed.record(progress.offset);
                ui.set_detail(throughput_detail(&speed, &progress));
            }
            TransferEvent::Completed { .. }
            | TransferEvent::Cancelled { .. }
            | TransferEvent::Failed { .. } => break,
        }
    }
}

fn throughput_detail(speed: &SpeedCalculator, progress: &ProgressEvent) -> String {
    let rate = speed.bytes_per_second();
    if rate <= 0.0 {
        return String::new();
    }
    let remaining = progress.size.saturating_sub(progress.offset);
    match speed.eta(remaining) {
        Some(eta) if remaining > 0 => {
            format!("{}/s ETA {}s", ByteSize::b(rate as u64), eta.as_secs())
        }
        _ => format!("{}/s", ByteSize::b(rate as u64)),
    }
}

async fn receive(listen: SocketAddr, out: PathBuf) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(&out)
        .await
        .with_context(|| format!("creating {}", out.display()))?;

    let cancel = CancellationToken::new();
    let listener = TcpChunkReceiver::listen(listen)
        .await
        .with_context(|| format!("listening on {listen}"))?;
    let receiver = TcpChunkReceiver::new(out, cancel.clone());

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutting down");
            cancel.cancel();
        }
    });

    info!(out = %receiver.out_dir().display(), "receiving files, Ctrl-C to stop");
    receiver.serve(listener).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_detail_without_rate() {
        let speed = SpeedCalculator::default();
        let progress = ProgressEvent::new(1, 10, 100);
        assert!(throughput_detail(&speed, &progress).is_empty());
    }

    #[test]
    fn detail_includes_eta_until_done() {
        let speed = SpeedCalculator::default();
        let t0 = std::time::Instant::now();
        speed.record_at(0, t0);
        speed.record_at(1024, t0 + Duration::from_millis(20));

        let midway = throughput_detail(&speed, &ProgressEvent::new(1, 1024, 4096));
        assert!(midway.contains("/s ETA "));

        let done = throughput_detail(&speed, &ProgressEvent::new(1, 4096, 4096));
        assert!(done.ends_with("/s"));
    }

    #[tokio::test]
    async fn simulated_send_completes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, vec![b'x'; 2500]).unwrap();

        send(path, None, 1000, Duration::from_millis(10), None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn send_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = send(
            dir.path().join("absent.bin"),
            None,
            1000,
            Duration::ZERO,
            None,
        )
        .await;
        assert!(result.is_err());
    }

    #[test]
    fn wire_chunk_size_limit() {
        assert!(check_wire_chunk_size(MAX_CHUNK_LEN as usize).is_ok());
        assert!(check_wire_chunk_size(MAX_CHUNK_LEN as usize + 1).is_err());
    }

    #[tokio::test]
    async fn oversized_chunk_rejected_before_connecting() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.bin");
        std::fs::write(&path, b"abc").unwrap();

        // Nothing listens here; the size check must fail first.
        let result = send(
            path,
            Some("127.0.0.1:9".parse().unwrap()),
            MAX_CHUNK_LEN as usize + 1,
            Duration::ZERO,
            None,
        )
        .await;
        let err = result.unwrap_err().to_string();
        assert!(err.contains("exceeds the receiver limit"), "{err}");
    }
}
