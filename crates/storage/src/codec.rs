// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Versioned record envelope.
//!
//! Every persisted value is wrapped as `{"schemaVersion": N, "payload": ...}`.
//! Missing payload fields default safely on decode (serde defaults); a record
//! written by a newer daemon refuses to decode, which the daemon surfaces as
//! a refusal to start.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Schema version stamped into every record written by this build.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("record schema version {found} is newer than supported {supported}")]
    FutureSchema { found: u32, supported: u32 },

    #[error("record encoding failed: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("record decoding failed: {0}")]
    Decode(#[source] serde_json::Error),
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<T> {
    schema_version: u32,
    payload: T,
}

/// Encode a record into its versioned envelope.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(&Envelope { schema_version: SCHEMA_VERSION, payload: value })
        .map_err(CodecError::Encode)
}

/// Decode a record from its versioned envelope.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    // Peek the version before committing to the payload shape.
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct VersionOnly {
        #[serde(default = "default_version")]
        schema_version: u32,
    }
    fn default_version() -> u32 {
        1
    }

    let v: VersionOnly = serde_json::from_slice(bytes).map_err(CodecError::Decode)?;
    if v.schema_version > SCHEMA_VERSION {
        return Err(CodecError::FutureSchema { found: v.schema_version, supported: SCHEMA_VERSION });
    }

    let envelope: Envelope<T> = serde_json::from_slice(bytes).map_err(CodecError::Decode)?;
    Ok(envelope.payload)
}

#[cfg(test)]
#[path = "codec_tests.rs"]
mod tests;
