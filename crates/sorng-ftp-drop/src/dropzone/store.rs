//! Remote store abstraction and its FTP implementation.

use async_trait::async_trait;
use sorng_ftp::ftp::{FtpClient, FtpConnectionConfig, FtpEntry, FtpResult};
use tokio::io::AsyncRead;

use crate::dropzone::types::Credentials;

/// The operations the drop zone needs from one authenticated session.
/// Directory-relative calls act on the current working directory.
#[async_trait]
pub trait RemoteStore: Send {
    /// Whether `list_structured` is backed by MLSD.
    fn supports_structured_listing(&self) -> bool;

    async fn change_dir(&mut self, path: &str) -> FtpResult<()>;

    async fn make_dir(&mut self, name: &str) -> FtpResult<()>;

    /// Entries of the current directory with name and type facts.
    async fn list_structured(&mut self) -> FtpResult<Vec<FtpEntry>>;

    /// Raw LIST lines of the current directory.
    async fn list_lines(&mut self) -> FtpResult<Vec<String>>;

    /// Binary STOR into the current directory; returns bytes sent.
    async fn store(
        &mut self,
        name: &str,
        reader: &mut (dyn AsyncRead + Unpin + Send),
    ) -> FtpResult<u64>;

    async fn quit(&mut self) -> FtpResult<()>;
}

/// Opens authenticated stores.
#[async_trait]
pub trait Connector: Send + Sync {
    type Store: RemoteStore + 'static;

    /// Host label for log lines.
    fn endpoint(&self) -> String;

    async fn connect(&self, login: &Credentials) -> FtpResult<Self::Store>;
}

// ─── FTP ─────────────────────────────────────────────────────────────

#[async_trait]
impl RemoteStore for FtpClient {
    fn supports_structured_listing(&self) -> bool {
        self.features.mlsd
    }

    async fn change_dir(&mut self, path: &str) -> FtpResult<()> {
        self.cwd(path).await.map(|_| ())
    }

    async fn make_dir(&mut self, name: &str) -> FtpResult<()> {
        self.mkdir(name).await.map(|_| ())
    }

    async fn list_structured(&mut self) -> FtpResult<Vec<FtpEntry>> {
        self.mlsd(None).await
    }

    async fn list_lines(&mut self) -> FtpResult<Vec<String>> {
        FtpClient::list_lines(self, None).await
    }

    async fn store(
        &mut self,
        name: &str,
        reader: &mut (dyn AsyncRead + Unpin + Send),
    ) -> FtpResult<u64> {
        self.upload_from(reader, name).await
    }

    async fn quit(&mut self) -> FtpResult<()> {
        FtpClient::quit(self).await
    }
}

/// Connects to one configured FTP server with per-request credentials.
#[derive(Debug, Clone)]
pub struct FtpConnector {
    base: FtpConnectionConfig,
}

impl FtpConnector {
    /// `base` carries host, port, timeouts and data-channel mode; its
    /// username/password are replaced on every connect.
    pub fn new(base: FtpConnectionConfig) -> Self {
        Self { base }
    }
}

#[async_trait]
impl Connector for FtpConnector {
    type Store = FtpClient;

    fn endpoint(&self) -> String {
        format!("{}:{}", self.base.host, self.base.port)
    }

    async fn connect(&self, login: &Credentials) -> FtpResult<FtpClient> {
        let mut config = self.base.clone();
        config.username = login.identity.clone();
        config.password = login.secret.clone();
        FtpClient::connect(config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sorng_ftp::ftp::testing::{FakeFtpServer, FakeUser};
    use sorng_ftp::ftp::FtpErrorKind;

    fn connector(server: &FakeFtpServer) -> FtpConnector {
        FtpConnector::new(FtpConnectionConfig {
            host: "127.0.0.1".into(),
            port: server.port(),
            connect_timeout_sec: 5,
            command_timeout_sec: 5,
            data_timeout_sec: 5,
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn ftp_store_round_trip() {
        let server = FakeFtpServer::start(vec![FakeUser::new("dana", "pw")], true).await;
        let conn = connector(&server);
        let mut store = conn.connect(&Credentials::new("dana", "pw")).await.unwrap();
        assert!(store.supports_structured_listing());

        store.make_dir("/inbox").await.unwrap();
        store.change_dir("/inbox").await.unwrap();
        let mut data: &[u8] = b"payload";
        let n = RemoteStore::store(&mut store, "p.bin", &mut data).await.unwrap();
        assert_eq!(n, 7);

        let entries = store.list_structured().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "p.bin");
        let lines = RemoteStore::list_lines(&mut store).await.unwrap();
        assert!(lines.iter().any(|l| l.ends_with("p.bin")));

        RemoteStore::quit(&mut store).await.unwrap();
        assert_eq!(server.session_counts(), (1, 1));
        assert_eq!(server.file("/inbox/p.bin").unwrap(), b"payload");
    }

    #[tokio::test]
    async fn connector_uses_request_credentials() {
        let server = FakeFtpServer::start(vec![FakeUser::new("dana", "pw")], true).await;
        let conn = connector(&server);
        let err = conn
            .connect(&Credentials::new("dana", "wrong"))
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind, FtpErrorKind::AuthFailed);
        assert_eq!(conn.endpoint(), format!("127.0.0.1:{}", server.port()));
    }
}
