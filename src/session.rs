//! Session credential lifecycle: lazy-TTL acquisition, single-flight login
//! collapse, and invalidation on upstream failure signals.
//!
//! The upstream trusts a cookie established by an identity handshake and
//! drops it at unpredictable times, so the manager re-checks freshness on
//! every demand instead of running a background timer. Concurrent demand
//! while no valid credential exists collapses into one login: the first
//! caller spawns the login task, every caller awaits the same outcome slot.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::upstream::TrackerBackend;
use crate::{AppError, Result};

/// A session cookie plus its freshness bookkeeping.
#[derive(Debug, Clone)]
pub struct Credential {
    /// Joined cookie string replayed on status requests.
    pub token: String,
    /// Completion time of the login that produced this credential.
    pub acquired_at: Instant,
}

impl Credential {
    /// Whether this credential is still inside `ttl`.
    ///
    /// A zero `ttl` means the credential is never trusted and every demand
    /// revalidates through the login gate.
    #[must_use]
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        !ttl.is_zero() && self.acquired_at.elapsed() < ttl
    }
}

/// Outcome published to every caller awaiting one login attempt.
///
/// The failure side is a plain message so the outcome can be cloned to all
/// waiters; each converts it back into [`AppError::Login`].
type LoginOutcome = std::result::Result<Credential, String>;

/// Slot every concurrent caller awaits; `None` until the login resolves.
type OutcomeSlot = watch::Receiver<Option<LoginOutcome>>;

struct SessionState {
    credential: Option<Credential>,
    in_flight: Option<OutcomeSlot>,
}

/// Owns the shared upstream session credential.
pub struct SessionManager {
    backend: Arc<dyn TrackerBackend>,
    ttl: Duration,
    login_timeout: Duration,
    state: Arc<Mutex<SessionState>>,
}

impl SessionManager {
    /// Create a manager with the given credential TTL and login bound.
    #[must_use]
    pub fn new(backend: Arc<dyn TrackerBackend>, ttl: Duration, login_timeout: Duration) -> Self {
        Self {
            backend,
            ttl,
            login_timeout,
            state: Arc::new(Mutex::new(SessionState {
                credential: None,
                in_flight: None,
            })),
        }
    }

    /// Return a valid credential, logging in if necessary.
    ///
    /// A fresh credential returns immediately with no I/O. When a login is
    /// already in flight the caller awaits that same operation and receives
    /// its outcome, success or failure, instead of starting another. The
    /// in-flight check-and-set happens under one lock hold, so at most one
    /// login request is outstanding at any instant.
    ///
    /// `force_refresh` discards the current credential first; used by the
    /// retry path after a session-dead or auth-rejected classification.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Login`] when the handshake fails or exceeds the
    /// configured bound. The in-flight slot is cleared on failure, so the
    /// next caller starts a new attempt.
    pub async fn acquire(&self, force_refresh: bool) -> Result<Credential> {
        let mut rx = {
            let mut state = self.lock_state();

            if !force_refresh {
                if let Some(credential) = state.credential.as_ref() {
                    if credential.is_fresh(self.ttl) {
                        return Ok(credential.clone());
                    }
                }
            }

            // Expired or forced: nothing may observe the old token anymore.
            state.credential = None;

            if let Some(rx) = state.in_flight.as_ref() {
                rx.clone()
            } else {
                let (tx, rx) = watch::channel(None);
                state.in_flight = Some(rx.clone());
                self.spawn_login(tx);
                rx
            }
        };

        loop {
            if let Some(outcome) = rx.borrow_and_update().clone() {
                return outcome.map_err(AppError::Login);
            }
            rx.changed()
                .await
                .map_err(|_| AppError::Login("login task dropped before resolving".into()))?;
        }
    }

    /// Discard the current credential so the next demand re-logs in.
    ///
    /// A no-op when no credential exists; never touches an in-flight login.
    pub fn invalidate(&self) {
        let mut state = self.lock_state();
        if state.credential.take().is_some() {
            debug!("session credential invalidated");
        }
    }

    /// Start the login task owning the handshake and the outcome slot.
    ///
    /// Runs detached from any caller so a waiter cancelled mid-acquire can
    /// never strand the in-flight marker: the task clears the slot on every
    /// path before publishing the outcome.
    fn spawn_login(&self, tx: watch::Sender<Option<LoginOutcome>>) {
        let backend = Arc::clone(&self.backend);
        let state = Arc::clone(&self.state);
        let login_timeout = self.login_timeout;

        tokio::spawn(async move {
            info!("logging in to tracker upstream");

            let outcome: LoginOutcome =
                match tokio::time::timeout(login_timeout, backend.login()).await {
                    Ok(Ok(token)) => {
                        info!("upstream login succeeded");
                        Ok(Credential {
                            token,
                            acquired_at: Instant::now(),
                        })
                    }
                    Ok(Err(err)) => {
                        warn!(%err, "upstream login failed");
                        Err(err.to_string())
                    }
                    Err(_) => {
                        warn!(timeout = ?login_timeout, "upstream login timed out");
                        Err(format!(
                            "login timed out after {}s",
                            login_timeout.as_secs()
                        ))
                    }
                };

            {
                let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
                if let Ok(credential) = &outcome {
                    state.credential = Some(credential.clone());
                }
                state.in_flight = None;
            }

            // Publish after the slot is released so a waiter observing a
            // failure can immediately start a fresh attempt.
            let _ = tx.send(Some(outcome));
        });
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
