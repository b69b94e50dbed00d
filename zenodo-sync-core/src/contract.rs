//! # depositor: interface to the remote deposit-record API
//!
//! This module defines the [`Depositor`] trait and the plain data types that
//! cross it: the remote record snapshot ([`Deposition`]), its attached files,
//! the edit outcome, and the typed [`ApiError`].
//!
//! ## Interface & mocking
//! - Implement [`Depositor`] to create a new client (HTTP, test double, ...).
//! - All methods are async and return typed errors; no network concern leaks
//!   through the trait.
//! - The trait is annotated for `mockall` so tests can generate deterministic
//!   mocks (exported behind the `test-export-mocks` feature).

use async_trait::async_trait;

use mockall::{automock, predicate::*};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::DepositionMetadata;

/// Failure of a remote-client operation. The first two variants are produced
/// by the precondition guard before any request is attempted.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("access token for stage '{stage}' is unset (expected env var {env_var})")]
    MissingToken { stage: String, env_var: String },
    #[error("remote host {host} is unreachable")]
    Offline { host: String },
    #[error("remote rejected request with status {status}: {payload}")]
    Remote { status: u16, payload: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("malformed remote response: {0}")]
    Malformed(String),
}

/// Lifecycle state of a remote deposit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DepositionState {
    Draft,
    Published,
}

/// A file attached to a deposition, with the remote-reported checksum.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositionFile {
    pub filename: String,
    /// Hex MD5 digest as reported by the remote (sometimes prefixed `md5:`).
    pub checksum: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download: Option<String>,
}

impl DepositionFile {
    /// Checksum with any algorithm prefix stripped, for comparison.
    pub fn checksum_hex(&self) -> &str {
        self.checksum
            .strip_prefix("md5:")
            .unwrap_or(&self.checksum)
    }
}

/// Snapshot of a remote deposit record. Owned by the remote service; the
/// local side only ever holds the state from the last fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deposition {
    pub id: u64,
    pub state: DepositionState,
    #[serde(default)]
    pub files: Vec<DepositionFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<DepositionMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi_url: Option<String>,
    /// Explicit content-version number, when known. Carried alongside the
    /// snapshot so callers never derive versions from filenames.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
}

/// Result of asking the remote to reopen a published record for editing.
/// A locked or already-editable record is a non-fatal signal: the caller
/// falls back to opening a new version.
#[derive(Debug, Clone)]
pub enum EditOutcome {
    Opened(Deposition),
    Locked,
}

/// Trait for the eight remote deposit operations. Implemented by the real
/// HTTP client and by test mocks; every implementor must check its
/// preconditions (credential, reachability) before touching the network.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Depositor: Send + Sync {
    /// Allocate a new draft record.
    async fn create(&self) -> Result<Deposition, ApiError>;

    /// Derive a new draft linked to a published record, returning the draft.
    /// The new draft has a fresh id in the same identifier lineage.
    async fn new_version(&self, id: u64) -> Result<Deposition, ApiError>;

    /// Attach file bytes to a draft. When `version` is given the stored
    /// filename carries a `_<version>` suffix before the extension.
    async fn upload_file(
        &self,
        id: u64,
        filename: &str,
        content: &[u8],
        version: Option<u32>,
    ) -> Result<DepositionFile, ApiError>;

    /// Replace the draft's metadata block.
    async fn update_metadata(
        &self,
        id: u64,
        metadata: &DepositionMetadata,
    ) -> Result<Deposition, ApiError>;

    /// Transition a draft to published, assigning a DOI.
    async fn publish(&self, id: u64) -> Result<Deposition, ApiError>;

    /// Reopen a published record for editing; `Locked` is the non-fatal
    /// rejection callers recover from via [`new_version`](Self::new_version).
    async fn edit(&self, id: u64) -> Result<EditOutcome, ApiError>;

    /// Fetch the full current state of a record.
    async fn fetch(&self, id: u64) -> Result<Deposition, ApiError>;

    /// List all records visible under the credential.
    async fn list(&self) -> Result<Vec<Deposition>, ApiError>;
}
