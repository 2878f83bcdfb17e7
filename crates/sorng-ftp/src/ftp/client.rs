//! Stateful FTP client: owns the control connection and issues commands.
//!
//! Lifecycle: `connect()` → authenticate → FEAT/SYST/PWD probing →
//! set TYPE → optionally CWD.
//!
//! The client exposes low-level command helpers used by `directory.rs`
//! and `file_ops.rs` for higher-level operations.

use crate::ftp::connection;
use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::parser;
use crate::ftp::protocol::FtpCodec;
use crate::ftp::transfer::{self, DataChannel};
use crate::ftp::types::*;
use chrono::Utc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use uuid::Uuid;

/// A connected FTP client session.
pub struct FtpClient {
    pub id: String,
    pub codec: FtpCodec,
    pub config: FtpConnectionConfig,
    pub info: FtpSessionInfo,
    pub features: ServerFeatures,
}

impl FtpClient {
    /// Establish a new FTP session.
    pub async fn connect(config: FtpConnectionConfig) -> FtpResult<Self> {
        if config.host.is_empty() {
            return Err(FtpError::invalid_config("Host must not be empty"));
        }

        let session_id = Uuid::new_v4().to_string();
        let (mut codec, banner) = connection::connect(&config).await?;
        let banner_text = banner.text();

        // ── Authenticate ─────────────────────────────────────────
        let user_resp = codec.execute(&format!("USER {}", config.username)).await?;
        match user_resp.code {
            230 => {}
            331 => {
                let pass_resp = codec
                    .execute(&format!("PASS {}", config.password))
                    .await?;
                if !pass_resp.is_completion() {
                    return Err(FtpError::auth_failed(format!(
                        "Login failed: {}",
                        pass_resp.text()
                    ))
                    .with_code(pass_resp.code));
                }
            }
            code => {
                return Err(FtpError::auth_failed(format!(
                    "USER rejected: {}",
                    user_resp.text()
                ))
                .with_code(code));
            }
        }

        // ── FEAT ─────────────────────────────────────────────────
        let features = Self::probe_features(&mut codec).await;

        // ── OPTS UTF8 ON ─────────────────────────────────────────
        if config.utf8 && features.utf8 {
            let _ = codec.execute("OPTS UTF8 ON").await;
        }

        // ── SYST ─────────────────────────────────────────────────
        let system_type = match codec.execute("SYST").await {
            Ok(r) if r.is_success() => Some(r.text().trim_start_matches("215 ").to_string()),
            _ => None,
        };

        // ── PWD ──────────────────────────────────────────────────
        let cwd = Self::get_pwd(&mut codec).await.unwrap_or_else(|_| "/".into());

        // ── TYPE ─────────────────────────────────────────────────
        codec.expect_ok(config.transfer_type.command()).await?;

        // ── Initial CWD ──────────────────────────────────────────
        let initial_dir = if let Some(ref dir) = config.initial_directory {
            let resp = codec.execute(&format!("CWD {}", dir)).await?;
            if resp.is_success() {
                Self::get_pwd(&mut codec).await.unwrap_or_else(|_| dir.clone())
            } else {
                cwd
            }
        } else {
            cwd
        };

        let info = FtpSessionInfo {
            id: session_id.clone(),
            host: config.host.clone(),
            port: config.port,
            username: config.username.clone(),
            connected: true,
            current_directory: initial_dir,
            server_banner: Some(banner_text),
            system_type,
            connected_at: Utc::now(),
            last_activity: Utc::now(),
            transfer_type: config.transfer_type,
            bytes_uploaded: 0,
        };

        log::debug!(
            "FTP session {} logged in to {}:{} as {}",
            session_id,
            config.host,
            config.port,
            config.username
        );

        Ok(Self {
            id: session_id,
            codec,
            config,
            info,
            features,
        })
    }

    /// Send a NOOP to check the control connection.
    pub async fn noop(&mut self) -> FtpResult<()> {
        self.ensure_usable()?;
        self.codec.expect_ok("NOOP").await?;
        self.touch();
        Ok(())
    }

    // ─── PWD / CWD ──────────────────────────────────────────────

    /// Parse the current working directory from a PWD reply.
    pub async fn get_pwd(codec: &mut FtpCodec) -> FtpResult<String> {
        let resp = codec.expect_ok("PWD").await?;
        parse_quoted_path(&resp.text())
    }

    /// Change into `path` and update `current_directory`.
    pub async fn cwd(&mut self, path: &str) -> FtpResult<String> {
        self.ensure_usable()?;
        self.codec.expect_ok(&format!("CWD {}", path)).await?;
        let new_pwd = Self::get_pwd(&mut self.codec)
            .await
            .unwrap_or_else(|_| path.to_string());
        self.info.current_directory = new_pwd.clone();
        self.touch();
        Ok(new_pwd)
    }

    // ─── FEAT probe ──────────────────────────────────────────────

    async fn probe_features(codec: &mut FtpCodec) -> ServerFeatures {
        match codec.execute("FEAT").await {
            Ok(resp) if resp.is_success() => ServerFeatures::from_feat_lines(resp.lines.iter().skip(1)),
            _ => ServerFeatures::default(),
        }
    }

    // ─── Data channel helper ─────────────────────────────────────

    /// Open a data channel with the current configuration.
    pub async fn open_data_channel(&mut self) -> FtpResult<DataChannel> {
        let data_timeout = self.data_timeout();
        transfer::open_data_channel(
            &mut self.codec,
            self.config.data_channel_mode,
            &self.config.host,
            self.config.pasv_use_control_host,
            data_timeout,
            self.config.active_bind_address.as_deref(),
        )
        .await
    }

    pub(crate) fn data_timeout(&self) -> Duration {
        Duration::from_secs(self.config.data_timeout_sec)
    }

    /// Open a data channel, issue `cmd` and return the connected stream
    /// plus whether a completion reply is still owed by the server.
    pub(crate) async fn start_transfer(&mut self, cmd: &str) -> FtpResult<(TcpStream, bool)> {
        self.ensure_usable()?;
        let channel = self.open_data_channel().await?;
        let resp = self.codec.execute(cmd).await?;
        if !resp.is_preliminary() && !resp.is_completion() {
            return Err(FtpError::from_reply(resp.code, &resp.text()));
        }
        let pending = resp.is_preliminary();
        match channel.into_stream(self.data_timeout()).await {
            Ok(stream) => Ok((stream, pending)),
            Err(e) => {
                self.abandon_transfer(pending).await;
                Err(e)
            }
        }
    }

    /// Consume the closing reply of a transfer that failed on the data
    /// side. The data stream must already be dropped so the server sees
    /// EOF. If the reply cannot be read the control channel is out of
    /// step and the session is marked unusable.
    pub(crate) async fn abandon_transfer(&mut self, completion_pending: bool) {
        if !completion_pending {
            return;
        }
        match self.codec.read_response().await {
            Ok(done) => log::debug!(
                "FTP session {} transfer abandoned, server replied {}",
                self.id,
                done.code
            ),
            Err(e) => {
                log::warn!(
                    "FTP session {} lost track of the control channel: {}",
                    self.id,
                    e
                );
                self.info.connected = false;
            }
        }
    }

    /// Read the 226/250 that closes a transfer.
    pub(crate) async fn finish_transfer(&mut self, completion_pending: bool) -> FtpResult<()> {
        if completion_pending {
            let done = match self.codec.read_response().await {
                Ok(done) => done,
                Err(e) => {
                    self.info.connected = false;
                    return Err(e);
                }
            };
            if !done.is_completion() {
                return Err(FtpError::from_reply(done.code, &done.text()));
            }
        }
        self.touch();
        Ok(())
    }

    // ─── Listing ─────────────────────────────────────────────────

    /// Retrieve a directory listing (prefers MLSD, falls back to LIST).
    pub async fn list(&mut self, path: Option<&str>, prefer_mlsd: bool) -> FtpResult<Vec<FtpEntry>> {
        if prefer_mlsd && self.features.mlsd {
            self.mlsd(path).await
        } else {
            let lines = self.list_lines(path).await?;
            Ok(parser::parse_listing(&lines.join("\n")))
        }
    }

    /// Issue MLSD and parse the fact lines.
    pub async fn mlsd(&mut self, path: Option<&str>) -> FtpResult<Vec<FtpEntry>> {
        let cmd = with_arg("MLSD", path);
        let data = self.retrieve_data_as_string(&cmd).await?;
        Ok(parser::parse_listing(&data))
    }

    /// Issue LIST and return the raw, non-empty lines.
    pub async fn list_lines(&mut self, path: Option<&str>) -> FtpResult<Vec<String>> {
        let cmd = with_arg("LIST", path);
        let data = self.retrieve_data_as_string(&cmd).await?;
        Ok(data
            .lines()
            .map(|l| l.trim_end().to_string())
            .filter(|l| !l.is_empty())
            .collect())
    }

    /// Generic helper: open data channel, send command, collect body as String.
    pub async fn retrieve_data_as_string(&mut self, cmd: &str) -> FtpResult<String> {
        let (mut stream, pending) = self.start_transfer(cmd).await?;
        let mut buf = Vec::new();
        let read = stream.read_to_end(&mut buf).await;
        drop(stream);
        if let Err(e) = read {
            self.abandon_transfer(pending).await;
            return Err(e.into());
        }
        self.finish_transfer(pending).await?;
        // Legacy servers emit Latin-1 names; keep them readable.
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    // ─── QUIT ────────────────────────────────────────────────────

    /// Gracefully close the session.
    pub async fn quit(&mut self) -> FtpResult<()> {
        if !self.info.connected {
            return Ok(());
        }
        self.info.connected = false;
        let resp = self.codec.execute("QUIT").await?;
        log::debug!("FTP session {} closed ({})", self.id, resp.code);
        Ok(())
    }

    // ─── Utility ─────────────────────────────────────────────────

    pub(crate) fn touch(&mut self) {
        self.info.last_activity = Utc::now();
    }

    pub fn is_connected(&self) -> bool {
        self.info.connected
    }

    pub(crate) fn ensure_usable(&self) -> FtpResult<()> {
        if self.info.connected {
            Ok(())
        } else {
            Err(FtpError::disconnected(format!(
                "FTP session {} is no longer usable",
                self.id
            )))
        }
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────

fn with_arg(cmd: &str, arg: Option<&str>) -> String {
    match arg {
        Some(a) if !a.is_empty() => format!("{} {}", cmd, a),
        _ => cmd.to_string(),
    }
}

/// Parse `257 "/some/path"` into the path string. Embedded quotes are
/// doubled per RFC 959.
pub(crate) fn parse_quoted_path(text: &str) -> FtpResult<String> {
    let start = text
        .find('"')
        .ok_or_else(|| FtpError::protocol_error(format!("Cannot parse path from: {}", text)))?;
    let mut out = String::new();
    let mut chars = text[start + 1..].chars().peekable();
    while let Some(c) = chars.next() {
        if c == '"' {
            if chars.peek() == Some(&'"') {
                chars.next();
                out.push('"');
            } else {
                return Ok(out);
            }
        } else {
            out.push(c);
        }
    }
    Err(FtpError::protocol_error(format!(
        "Unterminated path in: {}",
        text
    )))
}
