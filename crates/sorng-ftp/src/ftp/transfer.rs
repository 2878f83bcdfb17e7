//! Data-channel management for FTP transfers.
//!
//! Supports three modes (RFC 959 + RFC 2428):
//! - **PASV**: server opens a port, client connects
//! - **EPSV**: extended passive (IPv6-ready), falls back to PASV
//! - **PORT**: client opens a port, server connects after the transfer
//!   command has been issued

use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::protocol::FtpCodec;
use crate::ftp::types::DataChannelMode;
use lazy_static::lazy_static;
use regex::Regex;
use std::net::{IpAddr, SocketAddr};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{timeout, Duration};

lazy_static! {
    static ref PASV_RE: Regex =
        Regex::new(r"(\d+),(\d+),(\d+),(\d+),(\d+),(\d+)").expect("valid PASV regex");
    static ref EPSV_RE: Regex = Regex::new(r"\|\|\|(\d+)\|").expect("valid EPSV regex");
}

/// A data channel that is either already connected (passive modes) or
/// waiting for the server to dial in (active mode).
pub enum DataChannel {
    Connected(TcpStream),
    Listening(TcpListener),
}

impl DataChannel {
    /// Resolve into a connected stream. Call only after the transfer
    /// command (LIST/MLSD/STOR) has been accepted by the server.
    pub async fn into_stream(self, data_timeout: Duration) -> FtpResult<TcpStream> {
        match self {
            DataChannel::Connected(tcp) => Ok(tcp),
            DataChannel::Listening(listener) => {
                let (tcp, _) = timeout(data_timeout, listener.accept())
                    .await
                    .map_err(|_| FtpError::data_channel("PORT accept timed out"))?
                    .map_err(|e| FtpError::data_channel(format!("PORT accept: {}", e)))?;
                Ok(tcp)
            }
        }
    }
}

/// Open a data channel according to the configured mode.
pub async fn open_data_channel(
    codec: &mut FtpCodec,
    mode: DataChannelMode,
    host: &str,
    use_control_host: bool,
    data_timeout: Duration,
    active_bind: Option<&str>,
) -> FtpResult<DataChannel> {
    match mode {
        DataChannelMode::Passive => {
            open_pasv(codec, use_control_host, data_timeout).await.map(DataChannel::Connected)
        }
        DataChannelMode::ExtendedPassive => match open_epsv(codec, host, data_timeout).await {
            Ok(tcp) => Ok(DataChannel::Connected(tcp)),
            Err(e) if e.code.map_or(false, |c| (500..=504).contains(&c)) => {
                log::debug!("EPSV refused ({}), falling back to PASV", e);
                open_pasv(codec, use_control_host, data_timeout)
                    .await
                    .map(DataChannel::Connected)
            }
            Err(e) => Err(e),
        },
        DataChannelMode::Active => open_port(codec, active_bind).await.map(DataChannel::Listening),
    }
}

// ─── PASV ────────────────────────────────────────────────────────────

/// Issue `PASV`, parse the response, connect to the returned address.
///
/// Response format: `227 Entering Passive Mode (h1,h2,h3,h4,p1,p2)`
async fn open_pasv(
    codec: &mut FtpCodec,
    use_control_host: bool,
    data_timeout: Duration,
) -> FtpResult<TcpStream> {
    let resp = codec.expect_ok("PASV").await?;
    let mut addr = parse_pasv_response(&resp.text())?;
    if use_control_host {
        addr.set_ip(codec.peer_addr()?.ip());
    }
    let tcp = timeout(data_timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| FtpError::data_channel("PASV data connect timed out"))?
        .map_err(|e| FtpError::data_channel(format!("PASV data connect: {}", e)))?;
    Ok(tcp)
}

/// Parse `(h1,h2,h3,h4,p1,p2)` from a 227 response.
fn parse_pasv_response(text: &str) -> FtpResult<SocketAddr> {
    let caps = PASV_RE
        .captures(text)
        .ok_or_else(|| FtpError::protocol_error(format!("Cannot parse PASV: {}", text)))?;

    let nums: Vec<u8> = (1..=6)
        .map(|i| {
            caps[i]
                .parse::<u8>()
                .map_err(|_| FtpError::protocol_error("PASV number out of range"))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let ip = IpAddr::from([nums[0], nums[1], nums[2], nums[3]]);
    let port = (nums[4] as u16) * 256 + (nums[5] as u16);
    Ok(SocketAddr::new(ip, port))
}

// ─── EPSV ────────────────────────────────────────────────────────────

/// Issue `EPSV`, parse port, connect to the *same host* on that port.
///
/// Response format: `229 Entering Extended Passive Mode (|||port|)`
async fn open_epsv(
    codec: &mut FtpCodec,
    host: &str,
    data_timeout: Duration,
) -> FtpResult<TcpStream> {
    let resp = codec.expect_ok("EPSV").await?;
    let port = parse_epsv_response(&resp.text())?;
    let addr = format!("{}:{}", host, port);
    let tcp = timeout(data_timeout, TcpStream::connect(&addr))
        .await
        .map_err(|_| FtpError::data_channel("EPSV data connect timed out"))?
        .map_err(|e| FtpError::data_channel(format!("EPSV data connect: {}", e)))?;
    Ok(tcp)
}

fn parse_epsv_response(text: &str) -> FtpResult<u16> {
    let caps = EPSV_RE
        .captures(text)
        .ok_or_else(|| FtpError::protocol_error(format!("Cannot parse EPSV: {}", text)))?;
    caps[1]
        .parse::<u16>()
        .map_err(|_| FtpError::protocol_error("EPSV port out of range"))
}

// ─── PORT ────────────────────────────────────────────────────────────

/// Bind a local TCP listener and announce it via `PORT`. The accept
/// happens in [`DataChannel::into_stream`].
async fn open_port(codec: &mut FtpCodec, bind_addr: Option<&str>) -> FtpResult<TcpListener> {
    // Default to the interface the control connection uses so the
    // advertised address is reachable from the server.
    let bind_ip = match bind_addr {
        Some(b) => b
            .parse::<IpAddr>()
            .map_err(|e| FtpError::invalid_config(format!("Bad active bind address: {}", e)))?,
        None => codec.local_addr()?.ip(),
    };
    let listener = TcpListener::bind(SocketAddr::new(bind_ip, 0))
        .await
        .map_err(|e| FtpError::data_channel(format!("PORT bind: {}", e)))?;
    let local = listener
        .local_addr()
        .map_err(|e| FtpError::data_channel(format!("PORT local_addr: {}", e)))?;

    codec.expect_ok(&format_port_command(local)?).await?;
    Ok(listener)
}

fn format_port_command(local: SocketAddr) -> FtpResult<String> {
    let ip = match local.ip() {
        IpAddr::V4(v4) => v4,
        _ => return Err(FtpError::data_channel("PORT requires IPv4")),
    };
    let o = ip.octets();
    let port = local.port();
    Ok(format!(
        "PORT {},{},{},{},{},{}",
        o[0],
        o[1],
        o[2],
        o[3],
        port / 256,
        port % 256
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pasv_reply_parsed() {
        let addr = parse_pasv_response("227 Entering Passive Mode (192,168,1,20,195,80).").unwrap();
        assert_eq!(addr, "192.168.1.20:50000".parse().unwrap());
    }

    #[test]
    fn pasv_reply_without_parens() {
        let addr = parse_pasv_response("227 Entering Passive Mode 10,0,0,1,4,1").unwrap();
        assert_eq!(addr.port(), 1025);
    }

    #[test]
    fn pasv_out_of_range_rejected() {
        assert!(parse_pasv_response("227 (300,1,1,1,1,1)").is_err());
    }

    #[test]
    fn epsv_reply_parsed() {
        assert_eq!(
            parse_epsv_response("229 Entering Extended Passive Mode (|||6446|)").unwrap(),
            6446
        );
    }

    #[test]
    fn port_command_encodes_address() {
        let cmd = format_port_command("127.0.0.1:50000".parse().unwrap()).unwrap();
        assert_eq!(cmd, "PORT 127,0,0,1,195,80");
    }
}
