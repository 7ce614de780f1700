//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Upstream identity handshake failure: unreachable, timed out, non-2xx,
    /// or no session cookie in the response.
    Login(String),
    /// Upstream rejected the credential with a 401/403 status.
    AuthRejected(u16),
    /// Transport-level upstream failure: network error, timeout, or an
    /// unexpected status code.
    Upstream(String),
    /// HTTP server bind or serve failure.
    Server(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Login(msg) => write!(f, "login: {msg}"),
            Self::AuthRejected(status) => write!(f, "auth rejected: upstream status {status}"),
            Self::Upstream(msg) => write!(f, "upstream: {msg}"),
            Self::Server(msg) => write!(f, "server: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}
