//! Authentication session: status machine, bearer token and silent refresh.
//!
//! Only one refresh runs at a time. The first caller of [`AuthSession::refresh`]
//! passes the `RefreshRequested` gate and spawns the refresh as a task; every
//! caller arriving while it is pending awaits the same task output instead of
//! starting another one. The task runs to completion even when every caller
//! gives up waiting, so the status always leaves `refreshing`.

use std::sync::{Arc, Mutex};

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::refresher::Refresher;
use super::status::{AuthEvent, AuthStatus, InvalidTransition, StatusMachine};
use crate::error::PipelineError;
use crate::metrics::{Metrics, MetricsRecorder};
use crate::store::TokenStore;

type SharedRefresh = Shared<BoxFuture<'static, Result<String, String>>>;

struct InFlight {
    generation: u64,
    refresh: SharedRefresh,
}

pub struct AuthSession {
    status: Arc<StatusMachine>,
    tokens: Arc<TokenStore>,
    refresher: Arc<dyn Refresher>,
    metrics: Metrics,
    in_flight: Arc<Mutex<Option<InFlight>>>,
    generations: Mutex<u64>,
}

impl AuthSession {
    pub fn new(tokens: Arc<TokenStore>, refresher: Arc<dyn Refresher>, metrics: Metrics) -> Self {
        AuthSession {
            status: Arc::new(StatusMachine::new()),
            tokens,
            refresher,
            metrics,
            in_flight: Arc::new(Mutex::new(None)),
            generations: Mutex::new(0),
        }
    }

    pub fn status(&self) -> AuthStatus {
        self.status.current()
    }

    pub fn status_machine(&self) -> &Arc<StatusMachine> {
        &self.status
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthStatus> {
        self.status.subscribe()
    }

    pub fn tokens(&self) -> &Arc<TokenStore> {
        &self.tokens
    }

    /// Marks the start of an interactive sign-in.
    pub fn begin_sign_in(&self) -> Result<AuthStatus, InvalidTransition> {
        self.status.apply(AuthEvent::SignInStarted)
    }

    /// Stores the token obtained by the sign-in flow.
    pub async fn complete_sign_in(&self, token: &str) -> Result<AuthStatus, String> {
        self.tokens.write(token).await?;
        let status = self
            .status
            .apply(AuthEvent::SignInSucceeded)
            .map_err(|e| e.to_string())?;
        info!("Signed in");
        Ok(status)
    }

    /// Abandons a sign-in that did not produce a token.
    pub fn fail_sign_in(&self) -> AuthStatus {
        self.signed_out()
    }

    /// Clears the token and returns to `unauthenticated`.
    pub async fn sign_out(&self) -> Result<AuthStatus, String> {
        self.tokens.clear().await?;
        info!("Signed out");
        Ok(self.signed_out())
    }

    /// Resumes a session whose token survived in persisted storage.
    /// Returns whether a session was restored.
    pub async fn restore(&self) -> Result<bool, String> {
        if self.status() != AuthStatus::Unauthenticated {
            return Ok(false);
        }
        if self.tokens.read().await?.is_none() {
            return Ok(false);
        }
        match self.status.apply(AuthEvent::SessionRestored) {
            Ok(_) => {
                info!("Restored session from persisted token");
                Ok(true)
            }
            // Another caller changed the status in between.
            Err(_) => Ok(false),
        }
    }

    /// Obtains a fresh token, joining the refresh already in flight if any.
    ///
    /// Fails with `Unauthenticated` when there is no session to refresh and
    /// with `RefreshFailed` when the refresher could not produce a token; the
    /// session is signed out in the latter case.
    pub async fn refresh(&self) -> Result<String, PipelineError> {
        let (generation, pending) = {
            let mut slot = self.in_flight.lock().expect("refresh slot mutex poisoned");
            match slot.as_ref() {
                Some(in_flight) => {
                    debug!("Joining in-flight token refresh");
                    (in_flight.generation, in_flight.refresh.clone())
                }
                None => {
                    if let Err(e) = self.status.apply(AuthEvent::RefreshRequested) {
                        debug!("Not refreshing: {}", e);
                        return Err(PipelineError::Unauthenticated);
                    }
                    let generation = self.next_generation();
                    let task = tokio::spawn({
                        let refresh = run_refresh(
                            self.status.clone(),
                            self.tokens.clone(),
                            self.refresher.clone(),
                            self.metrics.clone(),
                        );
                        let in_flight = self.in_flight.clone();
                        async move {
                            let result = refresh.await;
                            release_slot(&in_flight, generation);
                            result
                        }
                    });
                    let refresh = async move {
                        task.await
                            .unwrap_or_else(|e| Err(format!("Refresh task failed: {}", e)))
                    }
                    .boxed()
                    .shared();
                    *slot = Some(InFlight {
                        generation,
                        refresh: refresh.clone(),
                    });
                    (generation, refresh)
                }
            }
        };

        let result = pending.await;
        // Also covers a task that panicked before releasing the slot.
        release_slot(&self.in_flight, generation);
        result.map_err(PipelineError::RefreshFailed)
    }

    fn next_generation(&self) -> u64 {
        let mut generations = self.generations.lock().expect("generation mutex poisoned");
        *generations += 1;
        *generations
    }

    fn signed_out(&self) -> AuthStatus {
        self.status
            .apply(AuthEvent::SignedOut)
            .unwrap_or(AuthStatus::Unauthenticated)
    }
}

fn release_slot(in_flight: &Mutex<Option<InFlight>>, generation: u64) {
    let mut slot = in_flight.lock().expect("refresh slot mutex poisoned");
    if slot.as_ref().map(|f| f.generation) == Some(generation) {
        *slot = None;
    }
}

async fn run_refresh(
    status: Arc<StatusMachine>,
    tokens: Arc<TokenStore>,
    refresher: Arc<dyn Refresher>,
    metrics: Metrics,
) -> Result<String, String> {
    status
        .apply(AuthEvent::RefreshStarted)
        .map_err(|e| format!("Refresh abandoned: {}", e))?;

    let current = tokens.read().await.unwrap_or_else(|e| {
        warn!("Could not read current token before refresh: {}", e);
        None
    });

    info!(
        event_name = "auth.refresh.start",
        event_domain = "auth",
        refresher = refresher.get_name(),
        "refreshing bearer token"
    );

    let outcome = match refresher.refresh(current.as_deref()).await {
        Ok(token) => tokens.write(&token).await.map(|_| token),
        Err(e) => Err(e),
    };

    if let Err(e) = status.apply(AuthEvent::RefreshFinished) {
        // Signed out while the refresh was running.
        debug!("Refresh finished after status change: {}", e);
    }

    match outcome {
        Ok(token) => {
            metrics.record_refresh("success");
            info!(
                event_name = "auth.refresh.success",
                event_domain = "auth",
                refresher = refresher.get_name(),
                "bearer token refreshed"
            );
            Ok(token)
        }
        Err(e) => {
            metrics.record_refresh("failure");
            warn!(
                event_name = "auth.refresh.failure",
                event_domain = "auth",
                refresher = refresher.get_name(),
                "token refresh failed: {}",
                e
            );
            if let Err(clear_err) = tokens.clear().await {
                warn!("Failed to clear rejected token: {}", clear_err);
            }
            let _ = status.apply(AuthEvent::SignedOut);
            Err(e)
        }
    }
}
