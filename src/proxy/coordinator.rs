//! Fetch-or-serve-from-cache orchestration.
//!
//! For every vehicle request the coordinator runs the same sequence: serve a
//! fresh snapshot when one exists, otherwise acquire a credential, fetch,
//! classify, and either cache valid data or walk the bounded retry and
//! fallback paths. Every outcome resolves to a JSON value; no caller ever
//! sees a raw upstream body or a propagated fault.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::GlobalConfig;
use crate::proxy::SnapshotCache;
use crate::session::{Credential, SessionManager};
use crate::upstream::{StatusQuery, StatusReply, TrackerBackend};
use crate::AppError;

/// Result of one fetch-and-classify round.
enum Attempt {
    /// Valid data, already written to the cache.
    Success(Value),
    /// Credential was invalidated; one fresh-login retry is warranted.
    Retry(&'static str),
    /// Unrecoverable for this request; fall back.
    Fail(&'static str),
}

/// Orchestrates cache, session, and upstream for vehicle status requests.
pub struct FetchCoordinator {
    backend: Arc<dyn TrackerBackend>,
    session: Arc<SessionManager>,
    cache: SnapshotCache,
    freshness_window: Duration,
    staleness_ceiling: Option<Duration>,
}

impl FetchCoordinator {
    /// Wire a coordinator to its backend and session manager.
    #[must_use]
    pub fn new(
        backend: Arc<dyn TrackerBackend>,
        session: Arc<SessionManager>,
        config: &GlobalConfig,
    ) -> Self {
        Self {
            backend,
            session,
            cache: SnapshotCache::default(),
            freshness_window: config.freshness_window(),
            staleness_ceiling: config.staleness_ceiling(),
        }
    }

    /// Resolve the status payload for one vehicle.
    ///
    /// The freshness check runs before any credential work, so a warm cache
    /// sheds load without touching the session. A session-dead or
    /// auth-rejected classification invalidates the credential and earns
    /// exactly one retry with a forced re-login; a second such result stops
    /// and falls back, bounding the worst case at two fetches and two logins
    /// per request.
    pub async fn vehicle_status(&self, query: &StatusQuery) -> Value {
        if let Some(snapshot) = self.cache.fresh(&query.vehicle_id, self.freshness_window) {
            debug!(vehicle_id = %query.vehicle_id, "serving fresh snapshot");
            return snapshot;
        }

        let credential = match self.session.acquire(false).await {
            Ok(credential) => credential,
            Err(err) => {
                warn!(vehicle_id = %query.vehicle_id, %err, "credential acquisition failed");
                return self.fallback(&query.vehicle_id, "login failed");
            }
        };

        match self.attempt_fetch(&credential, query).await {
            Attempt::Success(payload) => payload,
            Attempt::Fail(reason) => self.fallback(&query.vehicle_id, reason),
            Attempt::Retry(reason) => {
                info!(
                    vehicle_id = %query.vehicle_id,
                    reason,
                    "retrying once with a fresh login"
                );
                let credential = match self.session.acquire(true).await {
                    Ok(credential) => credential,
                    Err(err) => {
                        warn!(vehicle_id = %query.vehicle_id, %err, "re-login failed");
                        return self.fallback(&query.vehicle_id, "login failed");
                    }
                };
                match self.attempt_fetch(&credential, query).await {
                    Attempt::Success(payload) => payload,
                    Attempt::Retry(reason) | Attempt::Fail(reason) => {
                        self.fallback(&query.vehicle_id, reason)
                    }
                }
            }
        }
    }

    /// One fetch-and-classify round. Writes the cache on valid data and
    /// invalidates the credential on both session-failure signals.
    async fn attempt_fetch(&self, credential: &Credential, query: &StatusQuery) -> Attempt {
        match self.backend.vehicle_status(&credential.token, query).await {
            Ok(StatusReply::Data(payload)) => {
                self.cache.store(&query.vehicle_id, payload.clone());
                Attempt::Success(payload)
            }
            Ok(StatusReply::SessionDead) => {
                warn!(vehicle_id = %query.vehicle_id, "ambiguous upstream body, resetting session");
                self.session.invalidate();
                Attempt::Retry("invalid upstream data")
            }
            Err(AppError::AuthRejected(status)) => {
                warn!(vehicle_id = %query.vehicle_id, status, "upstream rejected credential");
                self.session.invalidate();
                Attempt::Retry("auth rejected")
            }
            Err(err) => {
                warn!(vehicle_id = %query.vehicle_id, %err, "status fetch failed");
                Attempt::Fail("fetch error")
            }
        }
    }

    /// Availability-over-freshness fallback: a stale snapshot inside the
    /// ceiling beats an error marker; the marker is the floor, never a raw
    /// upstream string.
    fn fallback(&self, vehicle_id: &str, reason: &str) -> Value {
        if let Some(snapshot) = self.cache.stale(vehicle_id, self.staleness_ceiling) {
            info!(vehicle_id, reason, "serving stale snapshot fallback");
            return snapshot;
        }
        json!({ "error": reason })
    }
}
