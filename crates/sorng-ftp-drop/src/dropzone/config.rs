//! Drop-zone configuration.

use crate::dropzone::error::{DropError, DropResult};
use crate::dropzone::naming::normalize_segment;
use crate::dropzone::types::{AuthMode, Credentials, ExistenceStrategy, LayoutMode};
use serde::{Deserialize, Serialize};
use sorng_ftp::ftp::{DataChannelMode, FtpConnectionConfig, TransferType};
use std::fmt;

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DropConfig {
    /// Remote FTP host.
    pub host: String,
    pub port: u16,
    /// Service account used in shared-secret mode.
    pub service_user: String,
    pub service_password: String,
    /// Remote directory that acts as the drop-zone root.
    pub base_directory: String,
    /// Directory under the root whose subdirectories seed new top-level
    /// folders. Hidden from root listings.
    pub template_name: Option<String>,
    pub auth_mode: AuthMode,
    pub shared_secret: Option<String>,
    pub layout: LayoutMode,
    pub existence: ExistenceStrategy,
    pub data_channel_mode: DataChannelMode,
    pub connect_timeout_sec: u64,
    pub command_timeout_sec: u64,
    pub data_timeout_sec: u64,
    /// Realm announced in `WWW-Authenticate`.
    pub realm: String,
}

impl Default for DropConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 21,
            service_user: String::new(),
            service_password: String::new(),
            base_directory: "/".into(),
            template_name: Some("_template".into()),
            auth_mode: AuthMode::default(),
            shared_secret: None,
            layout: LayoutMode::default(),
            existence: ExistenceStrategy::default(),
            data_channel_mode: DataChannelMode::default(),
            connect_timeout_sec: 15,
            command_timeout_sec: 30,
            data_timeout_sec: 60,
            realm: "ftp-drop".into(),
        }
    }
}

impl fmt::Debug for DropConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DropConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("service_user", &self.service_user)
            .field("base_directory", &self.base_directory)
            .field("template_name", &self.template_name)
            .field("auth_mode", &self.auth_mode)
            .field("layout", &self.layout)
            .field("existence", &self.existence)
            .field("data_channel_mode", &self.data_channel_mode)
            .field("realm", &self.realm)
            .finish_non_exhaustive()
    }
}

impl DropConfig {
    /// Check the configuration once at startup.
    pub fn validate(&self) -> DropResult<()> {
        if self.host.trim().is_empty() {
            return Err(DropError::validation("FTP host must not be empty"));
        }
        if self.port == 0 {
            return Err(DropError::validation("FTP port must not be 0"));
        }
        if !self.base_directory.starts_with('/') {
            return Err(DropError::validation(format!(
                "base directory must be absolute, got '{}'",
                self.base_directory
            )));
        }
        if self
            .base_directory
            .split('/')
            .any(|s| s == "." || s == "..")
        {
            return Err(DropError::validation("base directory must not contain '.' or '..'"));
        }
        if let Some(name) = &self.template_name {
            if name.is_empty() || name.contains('/') || name == "." || name == ".." {
                return Err(DropError::validation(format!(
                    "template name '{}' must be a single directory name",
                    name
                )));
            }
        }
        if self.auth_mode == AuthMode::Shared {
            if self.shared_secret.as_deref().map_or(true, str::is_empty) {
                return Err(DropError::validation("shared auth mode needs a shared secret"));
            }
            if self.service_user.is_empty() {
                return Err(DropError::validation("shared auth mode needs a service account"));
            }
        }
        if self.connect_timeout_sec == 0 || self.command_timeout_sec == 0 || self.data_timeout_sec == 0 {
            return Err(DropError::validation("timeouts must be at least one second"));
        }
        if self.realm.contains('"') {
            return Err(DropError::validation("realm must not contain '\"'"));
        }
        Ok(())
    }

    /// Connection settings shared by every session; credentials are
    /// filled in per request.
    pub fn connection_config(&self) -> FtpConnectionConfig {
        FtpConnectionConfig {
            host: self.host.clone(),
            port: self.port,
            username: String::new(),
            password: String::new(),
            transfer_type: TransferType::Binary,
            data_channel_mode: self.data_channel_mode,
            initial_directory: None,
            connect_timeout_sec: self.connect_timeout_sec,
            command_timeout_sec: self.command_timeout_sec,
            data_timeout_sec: self.data_timeout_sec,
            ..FtpConnectionConfig::default()
        }
    }

    pub fn service_account(&self) -> Credentials {
        Credentials::new(self.service_user.clone(), self.service_password.clone())
    }

    /// Whether a user-supplied name would collide with the template.
    pub fn is_template(&self, name: &str) -> bool {
        match (&self.template_name, normalize_segment(name)) {
            (Some(t), Ok(n)) => *t == n,
            _ => false,
        }
    }
}
