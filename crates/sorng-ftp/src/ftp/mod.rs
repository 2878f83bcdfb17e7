//! # sorng-ftp: Async FTP Client
//!
//! Plain FTP (RFC 959) with the extensions an upload gateway relies on:
//! - **RFC 3659**: MLSD machine listings
//! - **RFC 2389**: FEAT negotiation
//! - **RFC 2428**: EPSV with PASV fallback
//!
//! Architecture:
//! - `types`: data structures, enums, config
//! - `error`: FTP-specific error type
//! - `protocol`: low-level command/response codec
//! - `connection`: TCP transport and greeting
//! - `client`: stateful FTP client (login, CWD, listings)
//! - `parser`: Unix/Windows/MLSD LIST response parsing
//! - `transfer`: data channel management (PASV/EPSV/PORT)
//! - `directory`: MKD
//! - `file_ops`: streaming STOR uploads

pub mod types;
pub mod error;
pub mod protocol;
pub mod connection;
pub mod client;
pub mod parser;
pub mod transfer;
pub mod directory;
pub mod file_ops;

#[cfg(any(test, feature = "fake-server"))]
pub mod testing;

// Re-exports for lib.rs consumers
pub use types::*;
pub use client::FtpClient;
pub use error::{FtpError, FtpErrorKind, FtpResult};
