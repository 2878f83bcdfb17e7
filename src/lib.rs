//! # SortOfRemote NG – FTP Drop service
//!
//! HTTP surface, configuration and logging for the browser upload
//! drop-zone. The orchestration itself lives in `sorng-ftp-drop`.

pub mod api;
pub mod config;
pub mod logging;
