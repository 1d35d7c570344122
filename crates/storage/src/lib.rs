// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! outpost-storage: Durable key-value state for the daemon.
//!
//! A snapshot (zstd-compressed JSON) plus an append-only journal of write
//! operations. Writes are durable on return; `transact` provides optimistic
//! concurrency over per-key versions.

pub mod codec;
pub mod keys;
mod store;

pub use codec::{CodecError, SCHEMA_VERSION};
pub use store::{StateStore, StoreError, TransactOutcome, WriteOp};
