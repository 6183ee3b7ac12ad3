//! Certificate-validation toggle for the tunnel client
//!
//! The tunnel client is a Node program and reads `NODE_TLS_REJECT_UNAUTHORIZED`.
//! The parent's value is captured once at startup and never mutated; a
//! disabled setting is written into the child's environment only, so it ends
//! with the child and the parent's value is intact on every exit path.

use std::ffi::{OsStr, OsString};
use tokio::process::Command;

/// Environment variable read by the tunnel client
pub const TLS_REJECT_UNAUTHORIZED: &str = "NODE_TLS_REJECT_UNAUTHORIZED";

/// Whether the tunnel client validates TLS certificates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CertValidation {
    #[default]
    Enabled,
    Disabled,
}

/// Parent value of the toggle, captured at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsTrustScope {
    original: Option<OsString>,
}

impl TlsTrustScope {
    pub fn capture() -> Self {
        Self {
            original: std::env::var_os(TLS_REJECT_UNAUTHORIZED),
        }
    }

    pub fn original(&self) -> Option<&OsStr> {
        self.original.as_deref()
    }

    /// Configure the child's copy of the toggle for `setting`
    pub fn apply(&self, cmd: &mut Command, setting: CertValidation) {
        match (setting, &self.original) {
            (CertValidation::Disabled, _) => {
                cmd.env(TLS_REJECT_UNAUTHORIZED, "0");
            }
            (CertValidation::Enabled, Some(value)) => {
                cmd.env(TLS_REJECT_UNAUTHORIZED, value);
            }
            (CertValidation::Enabled, None) => {
                cmd.env_remove(TLS_REJECT_UNAUTHORIZED);
            }
        }
    }

    /// Whether the parent's environment still holds the captured value
    pub fn is_intact(&self) -> bool {
        std::env::var_os(TLS_REJECT_UNAUTHORIZED) == self.original
    }
}

impl Default for TlsTrustScope {
    fn default() -> Self {
        Self::capture()
    }
}
