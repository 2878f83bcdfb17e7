//! Directory operations on the remote server.

use crate::ftp::client::{parse_quoted_path, FtpClient};
use crate::ftp::error::FtpResult;

impl FtpClient {
    // ─── MKD ─────────────────────────────────────────────────────

    /// Create a single directory. Returns the path reported by the
    /// server's 257 reply, or `path` when the reply carries none.
    pub async fn mkdir(&mut self, path: &str) -> FtpResult<String> {
        self.ensure_usable()?;
        let resp = self.codec.expect_ok(&format!("MKD {}", path)).await?;
        self.touch();
        Ok(parse_quoted_path(&resp.text()).unwrap_or_else(|_| path.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use crate::ftp::client::FtpClient;
    use crate::ftp::testing::{FakeFtpServer, FakeUser};
    use crate::ftp::{FtpConnectionConfig, FtpErrorKind};

    async fn login(server: &FakeFtpServer) -> FtpClient {
        FtpClient::connect(FtpConnectionConfig {
            host: "127.0.0.1".into(),
            port: server.port(),
            username: "bob".into(),
            password: "pw".into(),
            command_timeout_sec: 5,
            data_timeout_sec: 5,
            ..Default::default()
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn mkdir_creates_and_reports_path() {
        let server = FakeFtpServer::start(vec![FakeUser::new("bob", "pw")], true).await;
        let mut client = login(&server).await;
        let created = client.mkdir("/events").await.unwrap();
        assert_eq!(created, "/events");
        assert!(server.is_dir("/events"));
        client.cwd("/events").await.unwrap();
        assert_eq!(client.info.current_directory, "/events");
    }

    #[tokio::test]
    async fn mkdir_over_existing_is_rejected() {
        let server = FakeFtpServer::start(vec![FakeUser::new("bob", "pw")], true).await;
        server.add_dir("/events");
        let mut client = login(&server).await;
        let err = client.mkdir("/events").await.unwrap_err();
        assert_eq!(err.code, Some(550));
    }

    #[tokio::test]
    async fn cwd_into_missing_is_not_found() {
        let server = FakeFtpServer::start(vec![FakeUser::new("bob", "pw")], true).await;
        let mut client = login(&server).await;
        let err = client.cwd("/nope").await.unwrap_err();
        assert_eq!(err.kind, FtpErrorKind::NotFound);
    }
}
