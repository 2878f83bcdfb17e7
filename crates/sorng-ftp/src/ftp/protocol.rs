//! Low-level FTP command/response codec (RFC 959 §4).
//!
//! Handles:
//! - Sending FTP commands terminated with `\r\n`
//! - Reading single-line and multi-line replies
//! - Parsing the 3-digit reply code

use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::types::FtpResponse;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// The FTP command/response codec operating on split halves of the
/// control connection.
pub struct FtpCodec {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    reply_timeout: Duration,
}

impl FtpCodec {
    /// Create a codec from a connected TCP stream.
    pub fn from_tcp(stream: TcpStream, reply_timeout: Duration) -> Self {
        let (rd, wr) = stream.into_split();
        Self {
            reader: BufReader::new(rd),
            writer: wr,
            reply_timeout,
        }
    }

    /// Send a raw FTP command (without trailing CRLF; it is added here).
    pub async fn send_command(&mut self, cmd: &str) -> FtpResult<()> {
        if cmd.contains('\r') || cmd.contains('\n') {
            return Err(FtpError::invalid_config(
                "FTP command must not contain line breaks",
            ));
        }
        let line = format!("{}\r\n", cmd);
        self.writer.write_all(line.as_bytes()).await?;
        log::trace!(">>> {}", redact(cmd));
        Ok(())
    }

    /// Read a single line from the control channel (including CRLF).
    async fn read_line_raw(&mut self) -> FtpResult<String> {
        let mut buf = String::new();
        let n = timeout(self.reply_timeout, self.reader.read_line(&mut buf))
            .await
            .map_err(|_| FtpError::timeout("Timed out waiting for server reply"))??;
        if n == 0 {
            return Err(FtpError::disconnected("Server closed connection"));
        }
        Ok(buf)
    }

    /// Read a complete FTP response (possibly multi-line).
    ///
    /// Multi-line responses look like:
    /// ```text
    /// 220-Welcome to my FTP server
    /// 220-This is line 2
    /// 220 End of greeting
    /// ```
    pub async fn read_response(&mut self) -> FtpResult<FtpResponse> {
        let first = self.read_line_raw().await?;
        let first_trimmed = first.trim_end_matches(|c| c == '\r' || c == '\n');

        let code = parse_code(first_trimmed)?;
        let mut lines = vec![first_trimmed.to_string()];

        // "NNN-" means more lines follow until "NNN " is seen.
        let is_multi = first_trimmed.len() >= 4 && first_trimmed.as_bytes()[3] == b'-';
        if is_multi {
            let terminator = format!("{} ", code);
            loop {
                let next = self.read_line_raw().await?;
                let next_trimmed = next.trim_end_matches(|c| c == '\r' || c == '\n');
                lines.push(next_trimmed.to_string());
                if next_trimmed.starts_with(&terminator) || next_trimmed == code.to_string() {
                    break;
                }
            }
        }

        let resp = FtpResponse { code, lines };
        log::trace!(
            "<<< {}",
            resp.lines.last().map(String::as_str).unwrap_or_default()
        );
        Ok(resp)
    }

    /// Send a command and return the response.
    pub async fn execute(&mut self, cmd: &str) -> FtpResult<FtpResponse> {
        self.send_command(cmd).await?;
        self.read_response().await
    }

    /// Convenience: send a command, expect a specific response-code class.
    pub async fn expect(&mut self, cmd: &str, expected_first_digit: u16) -> FtpResult<FtpResponse> {
        let resp = self.execute(cmd).await?;
        if resp.code / 100 != expected_first_digit {
            return Err(FtpError::from_reply(resp.code, &resp.text()));
        }
        Ok(resp)
    }

    /// Expect a 2xx reply.
    pub async fn expect_ok(&mut self, cmd: &str) -> FtpResult<FtpResponse> {
        self.expect(cmd, 2).await
    }

    /// Address of the server end of the control connection.
    pub fn peer_addr(&self) -> FtpResult<std::net::SocketAddr> {
        Ok(self.writer.peer_addr()?)
    }

    /// Address of our end of the control connection.
    pub fn local_addr(&self) -> FtpResult<std::net::SocketAddr> {
        Ok(self.writer.local_addr()?)
    }
}

/// Parse the 3-digit reply code from the start of a line.
fn parse_code(line: &str) -> FtpResult<u16> {
    let digits = line.get(..3).filter(|d| d.bytes().all(|b| b.is_ascii_digit()));
    match digits {
        Some(d) => d
            .parse::<u16>()
            .map_err(|_| FtpError::protocol_error(format!("Invalid reply code in: '{}'", line))),
        None => Err(FtpError::protocol_error(format!(
            "Invalid reply code in: '{}'",
            line
        ))),
    }
}

/// Hide the argument of PASS in trace output.
fn redact(cmd: &str) -> &str {
    if cmd.get(..4).map_or(false, |p| p.eq_ignore_ascii_case("PASS")) {
        "PASS ****"
    } else {
        cmd
    }
}
