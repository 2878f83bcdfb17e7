//! # SortOfRemote NG – FTP
//!
//! Async FTP client used by the upload gateway.

pub mod ftp;
