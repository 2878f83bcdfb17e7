//! Startup configuration: CLI flags with environment fallbacks.
//!
//! The `FTP_*` names match the variables existing deployments already set;
//! everything specific to the drop zone lives under `DROP_*`.

use clap::Parser;
use serde::de::DeserializeOwned;
use sorng_ftp::ftp::DataChannelMode;
use sorng_ftp_drop::dropzone::{AuthMode, DropConfig, DropResult, ExistenceStrategy, LayoutMode};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ftp-drop", version, about = "Browser upload drop-zone in front of an FTP server")]
pub struct Cli {
    #[arg(long, env = "FTP_HOST", default_value = "localhost", help = "Remote FTP host")]
    pub ftp_host: String,
    #[arg(long, env = "FTP_PORT", default_value_t = 21, help = "Remote FTP port")]
    pub ftp_port: u16,
    #[arg(
        long,
        env = "FTP_USER",
        default_value = "",
        help = "Service account used in shared-secret mode"
    )]
    pub ftp_user: String,
    #[arg(
        long,
        env = "FTP_PASS",
        default_value = "",
        hide_env_values = true,
        help = "Service account password"
    )]
    pub ftp_pass: String,
    #[arg(long, env = "FTP_PATH", default_value = "/", help = "Remote base directory")]
    pub ftp_path: String,
    #[arg(
        long,
        env = "DROP_TEMPLATE",
        default_value = "_template",
        help = "Template directory under the base; empty disables cloning"
    )]
    pub template: String,
    #[arg(
        long,
        env = "DROP_AUTH_MODE",
        default_value = "remote",
        value_parser = parse_kebab::<AuthMode>,
        help = "remote: forward credentials to the FTP server; shared: one secret, service account"
    )]
    pub auth_mode: AuthMode,
    #[arg(long, env = "DROP_SHARED_SECRET", hide_env_values = true, help = "Secret for shared mode")]
    pub shared_secret: Option<String>,
    #[arg(
        long,
        env = "DROP_LAYOUT",
        default_value = "hierarchical",
        value_parser = parse_kebab::<LayoutMode>,
        help = "hierarchical or per-user"
    )]
    pub layout: LayoutMode,
    #[arg(
        long,
        env = "DROP_EXISTENCE",
        default_value = "auto",
        value_parser = parse_kebab::<ExistenceStrategy>,
        help = "auto, structured or listing-scan"
    )]
    pub existence: ExistenceStrategy,
    #[arg(
        long,
        env = "DROP_DATA_CHANNEL",
        default_value = "passive",
        value_parser = parse_kebab::<DataChannelMode>,
        help = "passive, extendedPassive or active"
    )]
    pub data_channel: DataChannelMode,
    #[arg(long, env = "DROP_CONNECT_TIMEOUT", default_value_t = 15)]
    pub connect_timeout: u64,
    #[arg(long, env = "DROP_COMMAND_TIMEOUT", default_value_t = 30)]
    pub command_timeout: u64,
    #[arg(long, env = "DROP_DATA_TIMEOUT", default_value_t = 60)]
    pub data_timeout: u64,
    #[arg(long, env = "DROP_REALM", default_value = "ftp-drop", help = "Basic auth realm")]
    pub realm: String,
    #[arg(short = 'b', long, env = "DROP_BIND", default_value = "127.0.0.1:8080")]
    pub bind: SocketAddr,
    #[arg(
        long,
        env = "DROP_MAX_UPLOAD_MB",
        default_value_t = 512,
        help = "Largest accepted request body, in MiB"
    )]
    pub max_upload_mb: usize,
    #[arg(long, env = "DROP_LOG_FILE", help = "Also write logs to this file")]
    pub log_file: Option<PathBuf>,
    #[arg(long, env = "DROP_JSON_LOGS", help = "Log as JSON lines")]
    pub json_logs: bool,
}

/// Everything the binary needs after parsing.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub drop: DropConfig,
    pub bind: SocketAddr,
    pub max_upload_bytes: usize,
    pub log_file: Option<PathBuf>,
    pub json_logs: bool,
}

impl Cli {
    /// Build and validate the runtime configuration.
    pub fn into_config(self) -> DropResult<AppConfig> {
        let drop = DropConfig {
            host: self.ftp_host,
            port: self.ftp_port,
            service_user: self.ftp_user,
            service_password: self.ftp_pass,
            base_directory: self.ftp_path,
            template_name: Some(self.template).filter(|t| !t.is_empty()),
            auth_mode: self.auth_mode,
            shared_secret: self.shared_secret.filter(|s| !s.is_empty()),
            layout: self.layout,
            existence: self.existence,
            data_channel_mode: self.data_channel,
            connect_timeout_sec: self.connect_timeout,
            command_timeout_sec: self.command_timeout,
            data_timeout_sec: self.data_timeout,
            realm: self.realm,
        };
        drop.validate()?;
        Ok(AppConfig {
            drop,
            bind: self.bind,
            max_upload_bytes: self.max_upload_mb.saturating_mul(1024 * 1024),
            log_file: self.log_file,
            json_logs: self.json_logs,
        })
    }
}

/// Parse a flag value through the type's serde names.
fn parse_kebab<T: DeserializeOwned>(raw: &str) -> Result<T, String> {
    serde_json::from_value(serde_json::Value::String(raw.to_string()))
        .map_err(|_| format!("unknown value '{}'", raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["ftp-drop"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn flags_map_onto_drop_config() {
        let cfg = parse(&[
            "--ftp-host",
            "files.example.org",
            "--ftp-path",
            "/events",
            "--layout",
            "per-user",
            "--existence",
            "listing-scan",
            "--data-channel",
            "active",
            "--max-upload-mb",
            "2",
        ])
        .into_config()
        .unwrap();
        assert_eq!(cfg.drop.host, "files.example.org");
        assert_eq!(cfg.drop.base_directory, "/events");
        assert_eq!(cfg.drop.layout, LayoutMode::PerUser);
        assert_eq!(cfg.drop.existence, ExistenceStrategy::ListingScan);
        assert_eq!(cfg.drop.data_channel_mode, DataChannelMode::Active);
        assert_eq!(cfg.max_upload_bytes, 2 * 1024 * 1024);
    }

    #[test]
    fn empty_template_disables_cloning() {
        let cfg = parse(&["--template", ""]).into_config().unwrap();
        assert_eq!(cfg.drop.template_name, None);
    }

    #[test]
    fn shared_mode_without_secret_is_rejected() {
        let err = parse(&["--auth-mode", "shared", "--ftp-user", "svc"])
            .into_config()
            .unwrap_err();
        assert!(err.message.contains("secret"));
    }

    #[test]
    fn unknown_mode_is_a_parse_error() {
        assert!(Cli::try_parse_from(["ftp-drop", "--layout", "flat"]).is_err());
    }
}
