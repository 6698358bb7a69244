//! Session configuration.
//!
//! - [`SessionConfig`]: where to connect and how to secure the session
//! - [`timeouts`]: per-step timeouts
//! - [`job`]: the TOML job file read by the `mailsend` binary

pub mod job;
pub mod timeouts;

use serde::{Deserialize, Serialize};

pub use self::{job::JobConfig, timeouts::ClientTimeouts};
use crate::credentials::Credentials;

/// Port for SMTP submission over implicit TLS (RFC 8314).
pub const IMPLICIT_TLS_PORT: u16 = 465;

/// How the session is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SecurityMode {
    /// Never attempt TLS.
    RequireNone,

    /// Use implicit TLS on port 465, otherwise STARTTLS when the relay
    /// advertises it. Plaintext is used only when the relay offers no TLS.
    #[default]
    AutoNegotiate,
}

impl From<bool> for SecurityMode {
    /// `true` means "use a secure connection if available".
    fn from(secure: bool) -> Self {
        if secure {
            Self::AutoNegotiate
        } else {
            Self::RequireNone
        }
    }
}

/// Everything needed to open one SMTP session.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub security: SecurityMode,

    /// Name sent with EHLO/HELO.
    #[serde(default = "default_helo_name")]
    pub helo_name: String,

    /// Accept self-signed or otherwise invalid certificates.
    ///
    /// **SECURITY WARNING**: only for test relays.
    #[serde(default)]
    pub accept_invalid_certs: bool,

    #[serde(default)]
    pub timeouts: ClientTimeouts,

    #[serde(skip)]
    pub credentials: Option<Credentials>,
}

fn default_port() -> u16 {
    25
}

fn default_helo_name() -> String {
    "localhost".to_string()
}

impl SessionConfig {
    /// A configuration for `host` on port 25 with [`SecurityMode::AutoNegotiate`].
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: default_port(),
            security: SecurityMode::default(),
            helo_name: default_helo_name(),
            accept_invalid_certs: false,
            timeouts: ClientTimeouts::default(),
            credentials: None,
        }
    }

    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub const fn with_security(mut self, security: SecurityMode) -> Self {
        self.security = security;
        self
    }

    #[must_use]
    pub fn with_credentials(mut self, credentials: Option<Credentials>) -> Self {
        self.credentials = credentials;
        self
    }

    #[must_use]
    pub fn with_helo_name(mut self, helo_name: impl Into<String>) -> Self {
        self.helo_name = helo_name.into();
        self
    }

    #[must_use]
    pub const fn with_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    #[must_use]
    pub fn with_timeouts(mut self, timeouts: ClientTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// `host:port`, suitable for `TcpStream::connect`.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Whether TLS is negotiated before the greeting rather than via STARTTLS.
    #[must_use]
    pub fn uses_implicit_tls(&self) -> bool {
        self.security == SecurityMode::AutoNegotiate && self.port == IMPLICIT_TLS_PORT
    }
}
