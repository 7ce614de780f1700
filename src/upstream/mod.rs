//! Upstream tracker backend abstraction.
//!
//! The [`TrackerBackend`] trait decouples the session and caching engine
//! from the wire protocol of the tracker platform, so tests drive the engine
//! with a scripted fake while production uses the reqwest-based
//! [`client::TrackerClient`].

pub mod client;

use std::future::Future;
use std::pin::Pin;

use serde_json::Value;

use crate::Result;

/// Fixed remote-procedure method selector of the status RPC.
pub const STATUS_METHOD: &str = "getVehicleStatus";

/// Fixed remote-procedure class name of the status RPC.
pub const STATUS_CLASS: &str = "com.uffizio.tools.projectmanager.GenerateJSONAjax";

/// Vehicle kind sent when the caller does not supply one.
pub const DEFAULT_VEHICLE_KIND: &str = "Bus";

/// Parameters identifying one vehicle status request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusQuery {
    /// Upstream vehicle link identifier.
    pub vehicle_id: String,
    /// Device IMEI the upstream associates with the vehicle.
    pub imei: String,
    /// Vehicle kind tag; [`DEFAULT_VEHICLE_KIND`] when absent.
    pub kind: Option<String>,
}

impl StatusQuery {
    /// The kind tag to send upstream, applying the fixed default.
    #[must_use]
    pub fn kind_or_default(&self) -> &str {
        self.kind.as_deref().unwrap_or(DEFAULT_VEHICLE_KIND)
    }
}

/// Classified body of a 2xx status response.
///
/// The upstream signals a silently expired session by answering with its
/// HTML login page instead of JSON, so a successful transport still has two
/// meanings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusReply {
    /// Structured payload; the only shape the cache ever stores.
    Data(Value),
    /// Ambiguous non-structured body: the session is dead.
    SessionDead,
}

/// Classify a status response body.
///
/// A body parsing as a JSON object or array is valid data. Anything else
/// (HTML, a bare JSON string, an empty body) is the session-dead signature.
#[must_use]
pub fn classify_payload(body: &str) -> StatusReply {
    match serde_json::from_str::<Value>(body) {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => StatusReply::Data(value),
        _ => StatusReply::SessionDead,
    }
}

/// Wire-protocol interface to the tracker platform.
///
/// Both operations are the engine's only suspension points and must bound
/// their wait internally or be wrapped in a timeout by the caller.
pub trait TrackerBackend: Send + Sync {
    /// Perform the identity handshake and return the assembled session
    /// cookie string.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Login`](crate::AppError::Login) when the endpoint
    /// is unreachable, answers non-2xx, or sets no session cookie.
    fn login(&self) -> Pin<Box<dyn Future<Output = Result<String>> + Send + '_>>;

    /// Fetch the raw status reply for one vehicle using `cookie`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::AuthRejected`](crate::AppError::AuthRejected) on a
    /// 401/403 status and [`AppError::Upstream`](crate::AppError::Upstream)
    /// on any other transport failure.
    fn vehicle_status<'a>(
        &'a self,
        cookie: &'a str,
        query: &'a StatusQuery,
    ) -> Pin<Box<dyn Future<Output = Result<StatusReply>> + Send + 'a>>;
}
