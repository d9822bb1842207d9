//! CLI configuration.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/chunkup/chunkup.toml`
//! - Windows: `%APPDATA%/chunkup/chunkup.toml`
//!
//! A missing file yields the defaults. Command-line flags override file values.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use bytesize::ByteSize;
use serde::{Deserialize, Serialize};

/// CLI configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliConfig {
    /// Chunk size, human readable ("10MiB", "512KiB", "4096").
    #[serde(default = "default_chunk_size")]
    pub chunk_size: String,

    /// Per-chunk latency of the simulated transport, in milliseconds.
    #[serde(default = "default_simulated_delay_ms")]
    pub simulated_delay_ms: u64,

    /// Upper bound on one chunk send, in seconds. 0 disables the timeout.
    #[serde(default)]
    pub send_timeout_secs: u64,

    /// Directory received files are written to.
    #[serde(default = "default_receive_dir")]
    pub receive_dir: String,
}

fn default_chunk_size() -> String {
    "10MiB".into()
}

fn default_simulated_delay_ms() -> u64 {
    1000
}

fn default_receive_dir() -> String {
    ".".into()
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            simulated_delay_ms: default_simulated_delay_ms(),
            send_timeout_secs: 0,
            receive_dir: default_receive_dir(),
        }
    }
}

impl CliConfig {
    /// Loads configuration from `path`, or the platform default location.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => config_path()?,
        };

        if !path.exists() {
            tracing::debug!(path = %path.display(), "no configuration file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: CliConfig =
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Parsed chunk size in bytes.
    pub fn chunk_size_bytes(&self) -> anyhow::Result<usize> {
        parse_chunk_size(&self.chunk_size)
    }

    pub fn simulated_delay(&self) -> Duration {
        Duration::from_millis(self.simulated_delay_ms)
    }

    pub fn send_timeout(&self) -> Option<Duration> {
        (self.send_timeout_secs > 0).then(|| Duration::from_secs(self.send_timeout_secs))
    }
}

/// Parses a human-readable chunk size. Zero is rejected.
pub fn parse_chunk_size(text: &str) -> anyhow::Result<usize> {
    let size: ByteSize = text
        .trim()
        .parse()
        .map_err(|e: String| anyhow::anyhow!("invalid chunk size {text:?}: {e}"))?;
    if size.as_u64() == 0 {
        anyhow::bail!("chunk size must be positive");
    }
    usize::try_from(size.as_u64()).with_context(|| format!("chunk size {size} too large"))
}

/// Returns the platform-specific configuration file path.
fn config_path() -> anyhow::Result<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        Ok(PathBuf::from(appdata).join("chunkup").join("chunkup.toml"))
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        Ok(PathBuf::from(home)
            .join(".config")
            .join("chunkup")
            .join("chunkup.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = CliConfig::default();
        assert_eq!(
            config.chunk_size_bytes().unwrap(),
            chunkup_transfer::DEFAULT_CHUNK_SIZE
        );
        assert_eq!(config.simulated_delay(), Duration::from_secs(1));
        assert!(config.send_timeout().is_none());
        assert_eq!(config.receive_dir, ".");
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = CliConfig {
            chunk_size: "512KiB".into(),
            simulated_delay_ms: 0,
            send_timeout_secs: 30,
            receive_dir: "/tmp/inbox".into(),
        };

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: CliConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed, config);
        assert_eq!(parsed.send_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn config_partial_toml() {
        let config: CliConfig = toml::from_str("simulated_delay_ms = 250").unwrap();
        assert_eq!(config.simulated_delay_ms, 250);
        assert_eq!(config.chunk_size, "10MiB");
    }

    #[test]
    fn missing_file_yields_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let config = CliConfig::load(Some(&tmp.path().join("absent.toml"))).unwrap();
        assert_eq!(config, CliConfig::default());
    }

    #[test]
    fn load_from_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("chunkup.toml");
        std::fs::write(&path, "chunk_size = \"1KiB\"\nreceive_dir = \"/srv\"\n").unwrap();

        let config = CliConfig::load(Some(&path)).unwrap();
        assert_eq!(config.chunk_size_bytes().unwrap(), 1024);
        assert_eq!(config.receive_dir, "/srv");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("chunkup.toml");
        std::fs::write(&path, "chunk_size = [").unwrap();
        assert!(CliConfig::load(Some(&path)).is_err());
    }

    #[test]
    fn chunk_size_parsing() {
        assert_eq!(parse_chunk_size("4096").unwrap(), 4096);
        assert_eq!(parse_chunk_size("10MiB").unwrap(), 10 * 1024 * 1024);
        assert!(parse_chunk_size("0").is_err());
        assert!(parse_chunk_size("lots").is_err());
    }

    #[test]
    fn config_path_not_empty() {
        let path = config_path().unwrap();
        assert!(path.to_string_lossy().contains("chunkup"));
    }
}
