//! Authentication Bridge: turns request credentials into a remote login.

use crate::dropzone::error::{DropError, DropResult};
use crate::dropzone::types::{AuthMode, Credentials};

#[derive(Clone)]
pub struct AuthBridge {
    mode: AuthMode,
    shared_secret: Option<String>,
    service_account: Credentials,
}

impl AuthBridge {
    pub fn new(mode: AuthMode, shared_secret: Option<String>, service_account: Credentials) -> Self {
        Self {
            mode,
            shared_secret,
            service_account,
        }
    }

    pub fn mode(&self) -> AuthMode {
        self.mode
    }

    /// Credentials to open the remote session with. In shared mode a wrong
    /// secret is refused here, before any connection is made.
    pub fn login_for(&self, caller: &Credentials) -> DropResult<Credentials> {
        if caller.identity.trim().is_empty() {
            return Err(DropError::auth_failed("a user name is required"));
        }
        match self.mode {
            AuthMode::Remote => {
                if caller.secret.is_empty() {
                    return Err(DropError::auth_failed("a password is required"));
                }
                Ok(caller.clone())
            }
            AuthMode::Shared => {
                let expected = self
                    .shared_secret
                    .as_deref()
                    .ok_or_else(|| DropError::internal("shared secret is not configured"))?;
                if constant_time_eq(expected.as_bytes(), caller.secret.as_bytes()) {
                    Ok(self.service_account.clone())
                } else {
                    log::info!("shared-secret login refused for {}", caller.identity);
                    Err(DropError::auth_failed("wrong password"))
                }
            }
        }
    }
}

impl std::fmt::Debug for AuthBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthBridge")
            .field("mode", &self.mode)
            .field("service_account", &self.service_account)
            .finish_non_exhaustive()
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
