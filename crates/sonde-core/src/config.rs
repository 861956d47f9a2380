//! Configuration system for Sonde.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $SONDE_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/sonde/config.toml
//!   3. ~/.config/sonde/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SondeConfig {
    pub probe: ProbeConfig,
    pub daemon: DaemonConfig,
}

/// Settings for the measurement client (`sonde-probe`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Daemon address packets are sent to.
    pub destination: String,
    /// Number of packets to emit for one run.
    pub total_packets: u32,
    /// Concurrent sender workers.
    pub workers: usize,
    /// Sleep between sends per worker, microseconds. 0 = no pacing.
    pub send_pacing_us: u64,
    /// How long to keep collecting acknowledgments after the last send
    /// before finalizing. Tunable; in-flight acks past this window count
    /// as loss.
    pub grace_period_ms: u64,
    /// Bounded sleep of the ordered-reporting cursor between polls of the
    /// pending map. Tunable.
    pub poll_interval_us: u64,
}

/// Settings for the receiver daemon (`sonded`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Listen address.
    pub listen: String,
    /// Validator workers. 0 = available parallelism.
    pub workers: usize,
    /// Bounded inbound job queue. Datagrams arriving while it is full
    /// are dropped.
    pub job_queue_capacity: usize,
    /// Bounded diagnostic channel. Lines are dropped when it is full.
    pub diag_queue_capacity: usize,
    /// Socket receive-buffer size hint, bytes. 0 = OS default.
    pub recv_buffer_bytes: usize,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for SondeConfig {
    fn default() -> Self {
        Self {
            probe: ProbeConfig::default(),
            daemon: DaemonConfig::default(),
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            destination: "127.0.0.1:9000".to_string(),
            total_packets: 10_000,
            workers: 10,
            send_pacing_us: 100,
            grace_period_ms: 10_000,
            poll_interval_us: 10,
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:9000".to_string(),
            workers: 0,
            job_queue_capacity: 10_000,
            diag_queue_capacity: 1024,
            recv_buffer_bytes: 25 * 1024 * 1024,
        }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("sonde")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl SondeConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            SondeConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("SONDE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&SondeConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text)
                .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply SONDE_* env var overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("SONDE_PROBE__DESTINATION") {
            self.probe.destination = v;
        }
        if let Ok(v) = std::env::var("SONDE_PROBE__TOTAL_PACKETS") {
            if let Ok(n) = v.parse() {
                self.probe.total_packets = n;
            }
        }
        if let Ok(v) = std::env::var("SONDE_PROBE__WORKERS") {
            if let Ok(n) = v.parse() {
                self.probe.workers = n;
            }
        }
        if let Ok(v) = std::env::var("SONDE_PROBE__GRACE_PERIOD_MS") {
            if let Ok(n) = v.parse() {
                self.probe.grace_period_ms = n;
            }
        }
        if let Ok(v) = std::env::var("SONDE_DAEMON__LISTEN") {
            self.daemon.listen = v;
        }
        if let Ok(v) = std::env::var("SONDE_DAEMON__WORKERS") {
            if let Ok(n) = v.parse() {
                self.daemon.workers = n;
            }
        }
        if let Ok(v) = std::env::var("SONDE_DAEMON__RECV_BUFFER_BYTES") {
            if let Ok(n) = v.parse() {
                self.daemon.recv_buffer_bytes = n;
            }
        }
    }
}
