// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon process lifecycle: lockfile, startup order, reconciliation,
//! graceful shutdown, exit codes.

pub mod reconcile;
mod startup;

pub use reconcile::{reconcile, ReconcileReport};
pub use startup::{shutdown, startup, StartupResult};

use std::path::PathBuf;
use thiserror::Error;

/// Exit code for a graceful shutdown.
pub const EXIT_OK: i32 = 0;
/// Exit code for fatal startup errors (bind failure, lock held, bad config).
pub const EXIT_STARTUP: i32 = 1;
/// Exit code when the state store is corrupt or written by a newer build.
pub const EXIT_CORRUPT_STATE: i32 = 2;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    #[error("failed to acquire {0}: daemon already running?")]
    LockFailed(PathBuf),

    #[error("state store unusable: {0}")]
    CorruptState(String),

    #[error("state written by a newer daemon ({found} > {supported}); refusing to start")]
    SchemaDowngrade { found: u32, supported: u32 },

    #[error("failed to bind port {0}: {1}")]
    BindFailed(u16, std::io::Error),

    #[error(transparent)]
    Store(outpost_storage::StoreError),

    #[error("record decode failed: {0}")]
    Codec(outpost_storage::CodecError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<outpost_storage::StoreError> for LifecycleError {
    fn from(e: outpost_storage::StoreError) -> Self {
        match e {
            outpost_storage::StoreError::Corrupt(detail) => LifecycleError::CorruptState(detail),
            other => LifecycleError::Store(other),
        }
    }
}

impl From<outpost_storage::CodecError> for LifecycleError {
    fn from(e: outpost_storage::CodecError) -> Self {
        match e {
            outpost_storage::CodecError::FutureSchema { found, supported } => {
                LifecycleError::SchemaDowngrade { found, supported }
            }
            other => LifecycleError::Codec(other),
        }
    }
}

impl LifecycleError {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            LifecycleError::CorruptState(_) | LifecycleError::SchemaDowngrade { .. } => {
                EXIT_CORRUPT_STATE
            }
            _ => EXIT_STARTUP,
        }
    }
}
