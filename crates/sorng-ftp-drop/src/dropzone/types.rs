//! Shared types for the drop-zone core.

use crate::dropzone::error::DropErrorKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::io::AsyncRead;

// ─── Credentials ─────────────────────────────────────────────────────

/// Identity/secret pair supplied with a request. Never persisted.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub identity: String,
    pub secret: String,
}

impl Credentials {
    pub fn new(identity: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            secret: secret.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identity", &self.identity)
            .field("secret", &"<redacted>")
            .finish()
    }
}

// ─── Policies ────────────────────────────────────────────────────────

/// How a caller's credentials become a remote login.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum AuthMode {
    /// Caller proves knowledge of a shared secret; the service account logs in.
    Shared,
    /// Caller's own credentials are the remote login.
    Remote,
}

impl Default for AuthMode {
    fn default() -> Self {
        Self::Remote
    }
}

/// Where user-visible paths live under the base directory.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum LayoutMode {
    /// `/a/b` maps to `<base>/a/b`.
    Hierarchical,
    /// `/a/b` maps to `<base>/<identity>/a/b`.
    PerUser,
}

impl Default for LayoutMode {
    fn default() -> Self {
        Self::Hierarchical
    }
}

/// How the resolver decides whether a name already exists remotely.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ExistenceStrategy {
    /// MLSD when the server advertises it, LIST scanning otherwise.
    Auto,
    /// MLSD name/type facts.
    Structured,
    /// Raw LIST lines: leading `d` marks a directory, last token is the name.
    ListingScan,
}

impl Default for ExistenceStrategy {
    fn default() -> Self {
        Self::Auto
    }
}

// ─── Listing ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub enum EntryKind {
    ParentDirectory,
    Directory,
    File,
}

/// One row of a browse listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryEntry {
    pub name: String,
    pub kind: EntryKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
}

impl DirectoryEntry {
    pub fn new(name: impl Into<String>, kind: EntryKind) -> Self {
        Self {
            name: name.into(),
            kind,
            size: None,
            modified: None,
        }
    }
}

// ─── Directory creation ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum EnsureOutcome {
    Created,
    Existing,
}

// ─── Uploads ─────────────────────────────────────────────────────────

/// A named byte stream handed over by the HTTP layer.
pub struct UploadFile {
    pub filename: String,
    pub content: Box<dyn AsyncRead + Send + Unpin>,
}

impl UploadFile {
    pub fn new(filename: impl Into<String>, content: Box<dyn AsyncRead + Send + Unpin>) -> Self {
        Self {
            filename: filename.into(),
            content,
        }
    }

    pub fn from_bytes(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(filename, Box::new(std::io::Cursor::new(bytes.into())))
    }
}

impl fmt::Debug for UploadFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadFile")
            .field("filename", &self.filename)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum TransferOutcome {
    #[serde(rename_all = "camelCase")]
    Success { remote_name: String, bytes: u64 },
    #[serde(rename_all = "camelCase")]
    Failure { kind: DropErrorKind, message: String },
}

/// Result for one file of a batch, in input order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransferResult {
    pub original_filename: String,
    #[serde(flatten)]
    pub outcome: TransferOutcome,
}

impl TransferResult {
    pub fn success(original: impl Into<String>, remote_name: impl Into<String>, bytes: u64) -> Self {
        Self {
            original_filename: original.into(),
            outcome: TransferOutcome::Success {
                remote_name: remote_name.into(),
                bytes,
            },
        }
    }

    pub fn failure(original: impl Into<String>, kind: DropErrorKind, message: impl Into<String>) -> Self {
        Self {
            original_filename: original.into(),
            outcome: TransferOutcome::Failure {
                kind,
                message: message.into(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, TransferOutcome::Success { .. })
    }
}

// ─── Render models ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ViewModel {
    pub path: String,
    pub parent: Option<String>,
    pub entries: Vec<DirectoryEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateModel {
    pub path: String,
    pub outcome: EnsureOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UploadModel {
    pub folder: String,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<TransferResult>,
}

impl UploadModel {
    pub fn new(folder: impl Into<String>, results: Vec<TransferResult>) -> Self {
        let succeeded = results.iter().filter(|r| r.is_success()).count();
        Self {
            folder: folder.into(),
            succeeded,
            failed: results.len() - succeeded,
            results,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VerifyModel {
    pub identity: String,
    pub mode: AuthMode,
}
