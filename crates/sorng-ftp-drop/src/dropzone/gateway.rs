//! Session Gateway: one authenticated remote session per request.

use crate::dropzone::error::{DropError, DropResult};
use crate::dropzone::store::{Connector, RemoteStore};
use crate::dropzone::types::Credentials;
use sorng_ftp::ftp::{FtpEntry, FtpError, FtpErrorKind};
use tokio::io::AsyncRead;
use uuid::Uuid;

/// Opens sessions against the configured remote store.
pub struct SessionGateway<C: Connector> {
    connector: C,
}

impl<C: Connector> SessionGateway<C> {
    pub fn new(connector: C) -> Self {
        Self { connector }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Connect and log in. Login refusals become `AuthFailed`; anything
    /// that stops us reaching the server becomes `Unreachable`.
    pub async fn open(&self, login: &Credentials) -> DropResult<RemoteSession<C::Store>> {
        let endpoint = self.connector.endpoint();
        match self.connector.connect(login).await {
            Ok(store) => {
                let session = RemoteSession::new(store, &login.identity);
                log::debug!(
                    "session {} opened on {} as {}",
                    session.id,
                    endpoint,
                    login.identity
                );
                Ok(session)
            }
            Err(e) if e.kind == FtpErrorKind::AuthFailed => {
                log::info!("login to {} refused for {}: {}", endpoint, login.identity, e);
                Err(DropError::auth_failed("the file server rejected the login"))
            }
            Err(e) if e.is_unreachable() => {
                log::warn!("file server {} unreachable: {}", endpoint, e);
                Err(DropError::unreachable("the file server is not reachable"))
            }
            Err(e) => {
                log::warn!("session setup on {} failed: {}", endpoint, e);
                Err(DropError::unreachable("the file server did not accept a session"))
            }
        }
    }
}

/// An open session. Call [`RemoteSession::close`] on every path; dropping
/// an open session only closes the socket.
pub struct RemoteSession<S: RemoteStore> {
    pub id: String,
    pub identity: String,
    store: S,
    cwd: Option<String>,
    bytes_uploaded: u64,
    closed: bool,
}

impl<S: RemoteStore> RemoteSession<S> {
    pub fn new(store: S, identity: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            identity: identity.to_string(),
            store,
            cwd: None,
            bytes_uploaded: 0,
            closed: false,
        }
    }

    /// Last directory successfully entered.
    pub fn cwd(&self) -> Option<&str> {
        self.cwd.as_deref()
    }

    pub fn bytes_uploaded(&self) -> u64 {
        self.bytes_uploaded
    }

    pub fn supports_structured_listing(&self) -> bool {
        self.store.supports_structured_listing()
    }

    /// CWD; a refusal means the directory does not exist.
    pub async fn enter(&mut self, path: &str) -> DropResult<()> {
        match self.store.change_dir(path).await {
            Ok(()) => {
                self.cwd = Some(path.to_string());
                Ok(())
            }
            Err(e) if is_missing(&e) => {
                log::debug!("session {}: CWD {} refused: {}", self.id, path, e);
                Err(DropError::not_found(format!("directory '{}' does not exist", path)))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn make_dir(&mut self, name: &str) -> DropResult<()> {
        self.store.make_dir(name).await.map_err(DropError::from)
    }

    pub async fn list_structured(&mut self) -> DropResult<Vec<FtpEntry>> {
        self.store.list_structured().await.map_err(DropError::from)
    }

    pub async fn list_lines(&mut self) -> DropResult<Vec<String>> {
        self.store.list_lines().await.map_err(DropError::from)
    }

    pub async fn store(
        &mut self,
        name: &str,
        reader: &mut (dyn AsyncRead + Unpin + Send),
    ) -> DropResult<u64> {
        let n = self.store.store(name, reader).await?;
        self.bytes_uploaded += n;
        Ok(n)
    }

    /// QUIT. Failures are logged, never returned: the request outcome is
    /// already decided when we get here.
    pub async fn close(mut self) {
        self.closed = true;
        match self.store.quit().await {
            Ok(()) => log::debug!(
                "session {} closed ({} bytes uploaded)",
                self.id,
                self.bytes_uploaded
            ),
            Err(e) => log::warn!("session {}: QUIT failed: {}", self.id, e),
        }
    }
}

impl<S: RemoteStore> Drop for RemoteSession<S> {
    fn drop(&mut self) {
        if !self.closed {
            log::warn!("session {} dropped without QUIT", self.id);
        }
    }
}

fn is_missing(e: &FtpError) -> bool {
    matches!(
        e.kind,
        FtpErrorKind::NotFound | FtpErrorKind::CommandRejected | FtpErrorKind::PermissionDenied
    ) || e.code == Some(550)
}
