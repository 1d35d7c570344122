// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration from command-line flags and the environment.
//!
//! Loaded once at startup. A hangup signal re-reads only the sampler and
//! policy portion ([`Config::reload_sampler`]); provider credentials and the
//! listen port require a full restart.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 8947;
pub const DEFAULT_SAMPLING_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_WORKER_COUNT: usize = 8;
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 20;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("sampling interval must be greater than zero")]
    ZeroSamplingInterval,

    #[error("sampler worker count must be greater than zero")]
    ZeroWorkerCount,

    #[error("could not determine a state directory; pass --state-dir")]
    NoStateDir,
}

/// Command-line flags for `outpostd`.
#[derive(Debug, Parser)]
#[command(name = "outpostd", about = "Outpost workstation control-plane daemon", version)]
pub struct Flags {
    /// TCP port for the HTTP API.
    #[arg(long, env = "OUTPOST_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Root state directory (store, logs, lockfile).
    #[arg(long, env = "OUTPOST_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// Seconds between idle probes of each running workspace.
    #[arg(long, env = "OUTPOST_SAMPLING_INTERVAL", default_value_t = DEFAULT_SAMPLING_INTERVAL_SECS)]
    pub sampling_interval: u64,

    /// Sampler worker pool size.
    #[arg(long, env = "OUTPOST_WORKERS", default_value_t = DEFAULT_WORKER_COUNT)]
    pub workers: usize,

    /// Record idle actions without touching the provider.
    #[arg(long, env = "OUTPOST_DRY_RUN", default_value_t = false)]
    pub dry_run: bool,

    /// Default provider region for launches that don't specify one.
    #[arg(long, env = "OUTPOST_REGION", default_value = "us-east-1")]
    pub region: String,

    /// Private key used for workspace SSH sessions; falls back to the agent.
    #[arg(long, env = "OUTPOST_SSH_KEY")]
    pub ssh_key: Option<PathBuf>,
}

/// The reloadable sampler/policy portion of the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerSettings {
    pub interval: Duration,
    pub worker_count: usize,
    pub probe_timeout: Duration,
}

impl Default for SamplerSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_SAMPLING_INTERVAL_SECS),
            worker_count: DEFAULT_WORKER_COUNT,
            probe_timeout: Duration::from_secs(DEFAULT_PROBE_TIMEOUT_SECS),
        }
    }
}

/// Validated daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub state_dir: PathBuf,
    pub sampler: SamplerSettings,
    pub dry_run: bool,
    pub default_region: String,
    pub ssh_key: Option<PathBuf>,
}

impl Config {
    /// Build and validate a configuration from parsed flags.
    pub fn from_flags(flags: Flags) -> Result<Self, ConfigError> {
        let sampler = sampler_settings(flags.sampling_interval, flags.workers)?;
        let state_dir = match flags.state_dir {
            Some(dir) => dir,
            None => default_state_dir()?,
        };

        Ok(Self {
            port: flags.port,
            state_dir,
            sampler,
            dry_run: flags.dry_run,
            default_region: flags.region,
            ssh_key: flags.ssh_key,
        })
    }

    /// Re-read the sampler portion from the environment (SIGHUP path).
    pub fn reload_sampler(&self) -> Result<SamplerSettings, ConfigError> {
        let interval = env_u64("OUTPOST_SAMPLING_INTERVAL")
            .unwrap_or(self.sampler.interval.as_secs());
        let workers = env_u64("OUTPOST_WORKERS")
            .map(|w| w as usize)
            .unwrap_or(self.sampler.worker_count);
        sampler_settings(interval, workers)
    }

    pub fn store_dir(&self) -> PathBuf {
        self.state_dir.join("store")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.state_dir.join("daemon.pid")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.state_dir.join("logs")
    }
}

fn sampler_settings(interval_secs: u64, workers: usize) -> Result<SamplerSettings, ConfigError> {
    if interval_secs == 0 {
        return Err(ConfigError::ZeroSamplingInterval);
    }
    if workers == 0 {
        return Err(ConfigError::ZeroWorkerCount);
    }
    Ok(SamplerSettings {
        interval: Duration::from_secs(interval_secs),
        worker_count: workers,
        probe_timeout: Duration::from_secs(DEFAULT_PROBE_TIMEOUT_SECS),
    })
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

/// `$XDG_STATE_HOME/outpost` (or the platform equivalent).
fn default_state_dir() -> Result<PathBuf, ConfigError> {
    dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .map(|d| d.join("outpost"))
        .ok_or(ConfigError::NoStateDir)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
