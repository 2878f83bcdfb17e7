//! # SortOfRemote NG – FTP Drop
//!
//! Per-request FTP orchestration behind the browser upload service:
//! authenticate, resolve or create the destination folder, stream the
//! uploaded batch, close the session.

pub mod dropzone;
