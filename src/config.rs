//! Global configuration parsing and validation.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::{AppError, Result};

/// Nested upstream tracker connectivity settings.
///
/// The identity endpoint establishes the session; the status endpoint is the
/// form-encoded RPC surface the session cookie is replayed against.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", default)]
pub struct UpstreamConfig {
    /// Base URL of the tracker backend, scheme included, no trailing slash.
    pub base_url: String,
    /// Path of the identity-verification page that sets session cookies.
    pub identity_path: String,
    /// Pre-shared opaque parameter carried on the identity request.
    pub identity_param: String,
    /// Path of the JSON status RPC endpoint.
    pub status_path: String,
    /// Fixed account identifier sent with every status request.
    pub account_id: String,
    /// Fixed project identifier sent with every status request.
    pub project_id: String,
    /// Accept self-signed / invalid upstream certificates.
    pub accept_invalid_certs: bool,
    /// Upper bound on the identity handshake, in seconds.
    pub login_timeout_seconds: u64,
    /// Upper bound on a single status fetch, in seconds.
    pub request_timeout_seconds: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            identity_path: default_identity_path(),
            identity_param: default_identity_param(),
            status_path: default_status_path(),
            account_id: default_account_id(),
            project_id: default_project_id(),
            accept_invalid_certs: true,
            login_timeout_seconds: default_login_timeout_seconds(),
            request_timeout_seconds: default_request_timeout_seconds(),
        }
    }
}

fn default_base_url() -> String {
    "https://app.bongoiot.com".into()
}

fn default_identity_path() -> String {
    "/jsp/quickview.jsp".into()
}

fn default_identity_param() -> String {
    "MzQ0OTMwJkJ1cyZFTg==".into()
}

fn default_status_path() -> String {
    "/GenerateJSON".into()
}

fn default_account_id() -> String {
    "195425".into()
}

fn default_project_id() -> String {
    "37".into()
}

fn default_login_timeout_seconds() -> u64 {
    10
}

fn default_request_timeout_seconds() -> u64 {
    15
}

/// Session credential lifetime policy.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", default)]
pub struct SessionConfig {
    /// Minutes a login cookie is trusted before re-login; 0 revalidates on
    /// every demand.
    pub ttl_minutes: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_minutes: default_ttl_minutes(),
        }
    }
}

fn default_ttl_minutes() -> u64 {
    20
}

/// Snapshot cache freshness and fallback policy.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", default)]
pub struct CacheConfig {
    /// Seconds a cached snapshot is served without touching the upstream.
    pub freshness_seconds: u64,
    /// Maximum age in seconds of a snapshot served as a failure fallback;
    /// 0 disables the ceiling and serves snapshots of any age.
    pub staleness_ceiling_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            freshness_seconds: default_freshness_seconds(),
            staleness_ceiling_seconds: default_staleness_ceiling_seconds(),
        }
    }
}

fn default_freshness_seconds() -> u64 {
    5
}

fn default_staleness_ceiling_seconds() -> u64 {
    60
}

fn default_http_port() -> u16 {
    3000
}

/// Global configuration parsed from `config.toml`.
///
/// Every field has a default, so the binary runs with no config file at all.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", default)]
pub struct GlobalConfig {
    /// Port the proxy listens on.
    pub http_port: u16,
    /// Upstream tracker connectivity.
    pub upstream: UpstreamConfig,
    /// Session credential lifetime.
    pub session: SessionConfig,
    /// Snapshot cache policy.
    pub cache: CacheConfig,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            http_port: default_http_port(),
            upstream: UpstreamConfig::default(),
            session: SessionConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Full identity-verification URL including the pre-shared parameter.
    #[must_use]
    pub fn identity_url(&self) -> String {
        format!(
            "{}{}?param={}",
            self.upstream.base_url, self.upstream.identity_path, self.upstream.identity_param
        )
    }

    /// Full status RPC URL including the fixed method selector.
    #[must_use]
    pub fn status_url(&self) -> String {
        format!(
            "{}{}?method={}",
            self.upstream.base_url,
            self.upstream.status_path,
            crate::upstream::STATUS_METHOD
        )
    }

    /// Session credential time-to-live. Zero means revalidate on every demand.
    #[must_use]
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session.ttl_minutes * 60)
    }

    /// Bound on the identity handshake.
    #[must_use]
    pub fn login_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream.login_timeout_seconds)
    }

    /// Bound on a single status fetch.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream.request_timeout_seconds)
    }

    /// Window within which a cached snapshot short-circuits the upstream.
    #[must_use]
    pub fn freshness_window(&self) -> Duration {
        Duration::from_secs(self.cache.freshness_seconds)
    }

    /// Maximum fallback snapshot age; `None` when the ceiling is disabled.
    #[must_use]
    pub fn staleness_ceiling(&self) -> Option<Duration> {
        match self.cache.staleness_ceiling_seconds {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.upstream.base_url.is_empty() {
            return Err(AppError::Config("upstream.base_url must not be empty".into()));
        }
        if !self.upstream.base_url.starts_with("http://")
            && !self.upstream.base_url.starts_with("https://")
        {
            return Err(AppError::Config(
                "upstream.base_url must start with http:// or https://".into(),
            ));
        }
        if self.upstream.base_url.ends_with('/') {
            return Err(AppError::Config(
                "upstream.base_url must not end with a trailing slash".into(),
            ));
        }
        if self.upstream.account_id.is_empty() || self.upstream.project_id.is_empty() {
            return Err(AppError::Config(
                "upstream.account_id and upstream.project_id must not be empty".into(),
            ));
        }
        if self.upstream.login_timeout_seconds == 0 {
            return Err(AppError::Config(
                "upstream.login_timeout_seconds must be greater than zero".into(),
            ));
        }
        if self.upstream.request_timeout_seconds == 0 {
            return Err(AppError::Config(
                "upstream.request_timeout_seconds must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
