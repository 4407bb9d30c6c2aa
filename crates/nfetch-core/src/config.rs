//! Configuration loaded from `~/.config/nfetch/config.toml`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::fetch::FetchOptions;
use crate::retry::RetryPolicy;

/// Retry policy for timed-out segment requests (optional `[retry]` table).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts per segment including the first; omitted = retry forever.
    #[serde(default)]
    pub max_attempts: Option<u32>,
    /// Delay before the first retry in milliseconds; doubles per attempt.
    #[serde(default)]
    pub base_delay_ms: u64,
    /// Backoff cap in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_delay_ms() -> u64 {
    30_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: None,
            base_delay_ms: 0,
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NfetchConfig {
    /// Segment size in bytes for content we serve (consumers learn it from the first segment).
    pub chunk_size: u32,
    /// Maximum outstanding segment requests per fetch.
    pub pipeline_depth: usize,
    /// Interest lifetime before the transport reports a timeout.
    pub interest_lifetime_ms: u64,
    /// How often a watching session checks whether the other download finished.
    pub watch_poll_ms: u64,
    /// Streamed segments between progress reports.
    pub stream_progress_every: u64,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryConfig>,
}

impl Default for NfetchConfig {
    fn default() -> Self {
        Self {
            chunk_size: 4096,
            pipeline_depth: 5,
            interest_lifetime_ms: 4000,
            watch_poll_ms: 500,
            stream_progress_every: 64,
            retry: None,
        }
    }
}

impl NfetchConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
            .as_ref()
            .map(RetryPolicy::from)
            .unwrap_or_default()
    }

    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            chunk_size: self.chunk_size,
            pipeline_depth: self.pipeline_depth.max(1),
            interest_lifetime: Duration::from_millis(self.interest_lifetime_ms),
            watch_poll_interval: Duration::from_millis(self.watch_poll_ms.max(1)),
            retry: self.retry_policy(),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("nfetch")?;
    xdg_dirs
        .place_config_file("config.toml")
        .context("cannot create config directory")
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<NfetchConfig> {
    load_or_init_at(&config_path()?)
}

pub fn load_or_init_at(path: &Path) -> Result<NfetchConfig> {
    if !path.exists() {
        let default_cfg = NfetchConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(path, toml).with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let cfg: NfetchConfig =
        toml::from_str(&data).with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}
