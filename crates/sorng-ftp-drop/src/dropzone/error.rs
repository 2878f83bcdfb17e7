//! Drop-zone error type.

use serde::{Deserialize, Serialize};
use sorng_ftp::ftp::{FtpError, FtpErrorKind};
use std::fmt;

/// Categorised error for a whole drop-zone operation or a single file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DropError {
    pub kind: DropErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum DropErrorKind {
    /// The remote store refused the login, or the caller's secret is wrong.
    AuthFailed,
    /// The remote store could not be reached at all.
    Unreachable,
    /// A directory on the path does not exist.
    NotFound,
    /// A file occupies the name a directory should take.
    NameConflict,
    /// Bad path, name or filename supplied by the caller.
    Validation,
    /// STOR or data channel failure.
    Transfer,
    /// Local staging I/O failure.
    Io,
    /// Unexpected reply from the remote store.
    Protocol,
    Internal,
}

pub type DropResult<T> = Result<T, DropError>;

impl DropError {
    pub fn new(kind: DropErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            message: msg.into(),
        }
    }

    pub fn auth_failed(msg: impl Into<String>) -> Self {
        Self::new(DropErrorKind::AuthFailed, msg)
    }

    pub fn unreachable(msg: impl Into<String>) -> Self {
        Self::new(DropErrorKind::Unreachable, msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(DropErrorKind::NotFound, msg)
    }

    pub fn name_conflict(msg: impl Into<String>) -> Self {
        Self::new(DropErrorKind::NameConflict, msg)
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::new(DropErrorKind::Validation, msg)
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::new(DropErrorKind::Io, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(DropErrorKind::Internal, msg)
    }

    /// Whether the caller should be asked to authenticate again.
    pub fn is_auth(&self) -> bool {
        matches!(self.kind, DropErrorKind::AuthFailed | DropErrorKind::Unreachable)
    }
}

impl fmt::Display for DropError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.kind, self.message)
    }
}

impl std::error::Error for DropError {}

impl From<std::io::Error> for DropError {
    fn from(e: std::io::Error) -> Self {
        Self::io(e.to_string())
    }
}

/// Map a remote-store failure onto the user-facing taxonomy. Messages
/// stay short; the full reply text goes to the log instead.
impl From<FtpError> for DropError {
    fn from(e: FtpError) -> Self {
        let kind = match e.kind {
            FtpErrorKind::AuthFailed => DropErrorKind::AuthFailed,
            FtpErrorKind::ConnectionFailed => DropErrorKind::Unreachable,
            FtpErrorKind::NotFound => DropErrorKind::NotFound,
            FtpErrorKind::InvalidConfig => DropErrorKind::Validation,
            FtpErrorKind::DataChannelFailed
            | FtpErrorKind::TransferFailed
            | FtpErrorKind::QuotaExceeded
            | FtpErrorKind::Timeout
            | FtpErrorKind::Disconnected
            | FtpErrorKind::IoError => DropErrorKind::Transfer,
            FtpErrorKind::ProtocolError
            | FtpErrorKind::CommandRejected
            | FtpErrorKind::PermissionDenied
            | FtpErrorKind::Unknown => DropErrorKind::Protocol,
        };
        let message = match e.kind {
            FtpErrorKind::PermissionDenied => "permission denied by the file server".to_string(),
            FtpErrorKind::QuotaExceeded => "storage quota exceeded on the file server".to_string(),
            FtpErrorKind::Timeout => "the file server did not respond in time".to_string(),
            FtpErrorKind::Disconnected => "the file server closed the connection".to_string(),
            _ => first_line(&e.message),
        };
        log::debug!("remote failure mapped to {:?}: {}", kind, e);
        Self { kind, message }
    }
}

/// Strip the reply code and continuation lines from a server message.
fn first_line(msg: &str) -> String {
    let line = msg.lines().next().unwrap_or_default().trim();
    let stripped = match line.get(..4) {
        Some(p) if p.as_bytes()[..3].iter().all(u8::is_ascii_digit) => line[4..].trim(),
        _ => line,
    };
    stripped.to_string()
}
