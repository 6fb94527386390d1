use std::fmt;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

/// Authentication status of the session.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "camelCase")]
pub enum AuthStatus {
    #[default]
    Unauthenticated,
    Authenticating,
    Authenticated,
    RefreshRequested,
    Refreshing,
    /// A refresh just finished; normal error surfacing resumes.
    Done,
}

impl AuthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthStatus::Unauthenticated => "unauthenticated",
            AuthStatus::Authenticating => "authenticating",
            AuthStatus::Authenticated => "authenticated",
            AuthStatus::RefreshRequested => "refreshRequested",
            AuthStatus::Refreshing => "refreshing",
            AuthStatus::Done => "done",
        }
    }

    /// True while a silent refresh is requested or running.
    pub fn is_refresh_pending(&self) -> bool {
        matches!(self, AuthStatus::RefreshRequested | AuthStatus::Refreshing)
    }
}

impl fmt::Display for AuthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What drives the status from one state to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    SignInStarted,
    SignInSucceeded,
    /// A persisted token was found at startup.
    SessionRestored,
    RefreshRequested,
    RefreshStarted,
    /// The refresh completed, successfully or not.
    RefreshFinished,
    SignedOut,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid auth transition: {event:?} while {from}")]
pub struct InvalidTransition {
    pub from: AuthStatus,
    pub event: AuthEvent,
}

/// Returns the status an event leads to, or `None` when it is not allowed.
pub fn next_status(from: AuthStatus, event: AuthEvent) -> Option<AuthStatus> {
    use AuthEvent as E;
    use AuthStatus as S;

    match (from, event) {
        (_, E::SignedOut) => Some(S::Unauthenticated),
        (S::Unauthenticated, E::SignInStarted) => Some(S::Authenticating),
        (S::Authenticating, E::SignInSucceeded) => Some(S::Authenticated),
        (S::Unauthenticated, E::SessionRestored) => Some(S::Authenticated),
        (S::Authenticated | S::Done, E::RefreshRequested) => Some(S::RefreshRequested),
        (S::RefreshRequested, E::RefreshStarted) => Some(S::Refreshing),
        (S::Refreshing, E::RefreshFinished) => Some(S::Done),
        _ => None,
    }
}

/// Holds the current status and publishes every accepted transition.
pub struct StatusMachine {
    current: Mutex<AuthStatus>,
    changes: watch::Sender<AuthStatus>,
}

impl StatusMachine {
    pub fn new() -> Self {
        let (changes, _) = watch::channel(AuthStatus::Unauthenticated);
        StatusMachine {
            current: Mutex::new(AuthStatus::Unauthenticated),
            changes,
        }
    }

    pub fn current(&self) -> AuthStatus {
        *self.current.lock().expect("auth status mutex poisoned")
    }

    /// Applies an event atomically; the status is unchanged on error.
    pub fn apply(&self, event: AuthEvent) -> Result<AuthStatus, InvalidTransition> {
        let mut current = self.current.lock().expect("auth status mutex poisoned");
        let from = *current;
        let to = next_status(from, event).ok_or(InvalidTransition { from, event })?;
        *current = to;
        debug!(
            event_name = "auth.status.transition",
            event_domain = "auth",
            from = from.as_str(),
            to = to.as_str(),
            "auth status {} -> {} on {:?}",
            from,
            to,
            event
        );
        self.changes.send_replace(to);
        Ok(to)
    }

    /// Observes status changes.
    pub fn subscribe(&self) -> watch::Receiver<AuthStatus> {
        self.changes.subscribe()
    }
}

impl Default for StatusMachine {
    fn default() -> Self {
        Self::new()
    }
}
