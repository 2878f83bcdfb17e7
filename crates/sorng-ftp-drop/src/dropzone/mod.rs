//! Drop-zone orchestration.
//!
//! A request flows through [`service::DropService`]: the auth bridge picks
//! the remote login, the gateway opens a session, the resolver / lister /
//! orchestrator do their work and the session is closed again.

pub mod auth;
pub mod config;
pub mod error;
pub mod gateway;
pub mod lister;
pub mod memory;
pub mod naming;
pub mod orchestrator;
pub mod resolver;
pub mod service;
pub mod store;
pub mod target;
pub mod types;

pub use config::DropConfig;
pub use error::{DropError, DropErrorKind, DropResult};
pub use memory::{MemoryConnector, MemoryStore};
pub use service::DropService;
pub use store::{Connector, FtpConnector, RemoteStore};
pub use target::UploadTarget;
pub use types::*;
