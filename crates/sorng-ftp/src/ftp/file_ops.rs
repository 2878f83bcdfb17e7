//! File-level operations: streaming uploads via STOR.

use crate::ftp::client::FtpClient;
use crate::ftp::error::{FtpError, FtpResult};
use tokio::io::{AsyncRead, AsyncWriteExt};
use tokio::net::TcpStream;

impl FtpClient {
    // ─── UPLOAD (STOR) ───────────────────────────────────────────

    /// Stream `reader` into `remote_name` in the current directory.
    /// Returns the number of bytes sent.
    pub async fn upload_from<R>(&mut self, reader: &mut R, remote_name: &str) -> FtpResult<u64>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        if remote_name.is_empty() || remote_name.contains('/') {
            return Err(FtpError::invalid_config(format!(
                "Invalid remote file name: '{}'",
                remote_name
            )));
        }

        let (mut tcp, pending) = self.start_transfer(&format!("STOR {}", remote_name)).await?;

        let sent = match send_all(reader, &mut tcp).await {
            Ok(n) => n,
            Err(e) => {
                drop(tcp);
                self.abandon_transfer(pending).await;
                return Err(FtpError::transfer_failed(format!("STOR {}: {}", remote_name, e)));
            }
        };
        drop(tcp);

        self.finish_transfer(pending).await?;
        self.info.bytes_uploaded += sent;
        log::debug!("FTP session {} stored {} ({} bytes)", self.id, remote_name, sent);
        Ok(sent)
    }
}

async fn send_all<R>(reader: &mut R, tcp: &mut TcpStream) -> std::io::Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let sent = tokio::io::copy(reader, tcp).await?;
    tcp.flush().await?;
    tcp.shutdown().await?;
    Ok(sent)
}
