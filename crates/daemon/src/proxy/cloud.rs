// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Federated cloud-service sessions.
//!
//! A closed registry of service descriptors maps a service name to its
//! console destination and embedding mode; the daemon mints a federation
//! token through the provider port and hands back a signed URL. No
//! long-lived connection is held — the token lifetime bounds the session.

use outpost_provider::{CloudProvider, ProviderError};
use std::sync::Arc;
use thiserror::Error;

/// Default federation token lifetime.
pub const DEFAULT_TOKEN_SECS: u64 = 3600;

#[derive(Debug, Error)]
pub enum CloudSessionError {
    #[error("unknown cloud service: {0}")]
    UnknownService(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// How the front-end should host the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedMode {
    Iframe,
    NewTab,
}

outpost_core::simple_display! {
    EmbedMode {
        Iframe => "iframe",
        NewTab => "new_tab",
    }
}

/// One entry in the closed service set.
pub struct ServiceDescriptor {
    pub name: &'static str,
    pub embedding: EmbedMode,
    destination: fn(region: &str) -> String,
}

/// The closed set of embeddable services.
///
/// Console and CloudShell refuse to be framed, so they open in a tab.
pub const SERVICES: &[ServiceDescriptor] = &[
    ServiceDescriptor {
        name: "braket",
        embedding: EmbedMode::Iframe,
        destination: |region| {
            format!("https://{region}.console.aws.amazon.com/braket/home?region={region}")
        },
    },
    ServiceDescriptor {
        name: "sagemaker",
        embedding: EmbedMode::Iframe,
        destination: |region| {
            format!("https://{region}.console.aws.amazon.com/sagemaker/home?region={region}")
        },
    },
    ServiceDescriptor {
        name: "console",
        embedding: EmbedMode::NewTab,
        destination: |region| {
            format!("https://{region}.console.aws.amazon.com/console/home?region={region}")
        },
    },
    ServiceDescriptor {
        name: "cloudshell",
        embedding: EmbedMode::NewTab,
        destination: |region| {
            format!("https://{region}.console.aws.amazon.com/cloudshell/home?region={region}")
        },
    },
];

pub fn descriptor(service: &str) -> Option<&'static ServiceDescriptor> {
    SERVICES.iter().find(|d| d.name == service)
}

/// A minted session: signed URL plus the embedding hint.
#[derive(Debug, Clone)]
pub struct CloudSession {
    pub url: String,
    pub embedding: EmbedMode,
    pub expires_at_ms: u64,
}

/// Mint a federated session URL for one of the known services.
pub async fn open(
    provider: Arc<dyn CloudProvider>,
    service: &str,
    region: &str,
    duration_secs: u64,
) -> Result<CloudSession, CloudSessionError> {
    let descriptor =
        descriptor(service).ok_or_else(|| CloudSessionError::UnknownService(service.to_string()))?;

    let token = provider.issue_federation_token(service, region, duration_secs).await?;
    let destination = (descriptor.destination)(region);

    // Standard federation sign-in shape: the destination rides along as a
    // query parameter with the session token.
    let url = format!(
        "https://signin.aws.amazon.com/federation?Action=login&Issuer=outpost&Destination={}&SigninToken={}",
        urlencode(&destination),
        urlencode(&token.session_token),
    );

    Ok(CloudSession { url, embedding: descriptor.embedding, expires_at_ms: token.expires_at_ms })
}

/// Percent-encode the characters that matter in a query value.
fn urlencode(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            other => out.push_str(&format!("%{other:02X}")),
        }
    }
    out
}

#[cfg(test)]
#[path = "cloud_tests.rs"]
mod tests;
