//! reqwest-backed production implementation of [`TrackerBackend`].

use std::future::Future;
use std::pin::Pin;

use reqwest::header::{COOKIE, SET_COOKIE, USER_AGENT};
use reqwest::StatusCode;

use super::{classify_payload, StatusQuery, StatusReply, TrackerBackend, STATUS_CLASS, STATUS_METHOD};
use crate::config::GlobalConfig;
use crate::{AppError, Result};

/// The identity page refuses non-browser clients, so the handshake presents
/// a desktop browser identity.
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Join `Set-Cookie` header values into a single `Cookie` header string.
///
/// Each value is truncated at its first attribute delimiter (`;`) and the
/// surviving `name=value` pairs are rejoined with `; `.
fn join_session_cookies<'a>(raw: impl Iterator<Item = &'a str>) -> String {
    raw.filter_map(|value| value.split(';').next())
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .collect::<Vec<_>>()
        .join("; ")
}

/// HTTPS client for the tracker platform.
pub struct TrackerClient {
    http: reqwest::Client,
    identity_url: String,
    status_url: String,
    account_id: String,
    project_id: String,
}

impl TrackerClient {
    /// Build a client from configuration.
    ///
    /// The per-request timeout bounds every status fetch; the tracker's
    /// certificate chain is commonly self-signed, so validation is relaxed
    /// when `upstream.accept_invalid_certs` is set.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the underlying HTTP client cannot be
    /// constructed.
    pub fn new(config: &GlobalConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(config.upstream.accept_invalid_certs)
            .timeout(config.request_timeout())
            .build()
            .map_err(|err| AppError::Config(format!("failed to build http client: {err}")))?;

        Ok(Self {
            http,
            identity_url: config.identity_url(),
            status_url: config.status_url(),
            account_id: config.upstream.account_id.clone(),
            project_id: config.upstream.project_id.clone(),
        })
    }
}

impl TrackerBackend for TrackerClient {
    fn login(&self) -> Pin<Box<dyn Future<Output = Result<String>> + Send + '_>> {
        Box::pin(async move {
            let response = self
                .http
                .get(&self.identity_url)
                .header(USER_AGENT, BROWSER_USER_AGENT)
                .send()
                .await
                .map_err(|err| AppError::Login(format!("identity endpoint unreachable: {err}")))?;

            let status = response.status();
            if !status.is_success() {
                return Err(AppError::Login(format!(
                    "identity endpoint returned status {status}"
                )));
            }

            let cookie = join_session_cookies(
                response
                    .headers()
                    .get_all(SET_COOKIE)
                    .iter()
                    .filter_map(|value| value.to_str().ok()),
            );
            if cookie.is_empty() {
                return Err(AppError::Login(
                    "identity response carried no session cookie".into(),
                ));
            }

            Ok(cookie)
        })
    }

    fn vehicle_status<'a>(
        &'a self,
        cookie: &'a str,
        query: &'a StatusQuery,
    ) -> Pin<Box<dyn Future<Output = Result<StatusReply>> + Send + 'a>> {
        Box::pin(async move {
            let form = [
                ("user_id", self.account_id.as_str()),
                ("project_id", self.project_id.as_str()),
                ("javaclassmethodname", STATUS_METHOD),
                ("javaclassname", STATUS_CLASS),
                ("link_id", query.vehicle_id.as_str()),
                ("sImeiNo", query.imei.as_str()),
                ("vehicleType", query.kind_or_default()),
            ];

            let response = self
                .http
                .post(&self.status_url)
                .header(COOKIE, cookie)
                .form(&form)
                .send()
                .await
                .map_err(|err| {
                    if err.is_timeout() {
                        AppError::Upstream(format!("status fetch timed out: {err}"))
                    } else {
                        AppError::Upstream(format!("status fetch failed: {err}"))
                    }
                })?;

            let status = response.status();
            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                return Err(AppError::AuthRejected(status.as_u16()));
            }
            if !status.is_success() {
                return Err(AppError::Upstream(format!(
                    "status endpoint returned status {status}"
                )));
            }

            let body = response
                .text()
                .await
                .map_err(|err| AppError::Upstream(format!("failed to read status body: {err}")))?;

            Ok(classify_payload(&body))
        })
    }
}
