// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential lookup for workspace SSH sessions.
//!
//! Key material is an injected capability: the sampler and proxy layer ask
//! this source rather than scanning the filesystem themselves.

use outpost_core::Workspace;
use outpost_provider::{KeyMaterial, ShellEndpoint};
use std::path::PathBuf;

/// Resolves SSH key material for a workspace.
pub trait CredentialSource: Send + Sync {
    fn key_for(&self, workspace: &Workspace) -> KeyMaterial;
}

/// Uses one configured private key for every workspace, falling back to the
/// SSH agent when none is configured.
pub struct StaticKeySource {
    key_path: Option<PathBuf>,
}

impl StaticKeySource {
    pub fn new(key_path: Option<PathBuf>) -> Self {
        Self { key_path }
    }
}

impl CredentialSource for StaticKeySource {
    fn key_for(&self, _workspace: &Workspace) -> KeyMaterial {
        match &self.key_path {
            Some(path) => KeyMaterial::KeyFile(path.clone()),
            None => KeyMaterial::Agent,
        }
    }
}

/// Build a shell endpoint for a workspace, or None when it has no address.
pub fn endpoint_for(
    workspace: &Workspace,
    credentials: &dyn CredentialSource,
) -> Option<ShellEndpoint> {
    let (host, port) = workspace.ssh_address()?;
    Some(ShellEndpoint {
        host,
        port,
        username: workspace.username.clone(),
        key_material: credentials.key_for(workspace),
    })
}
