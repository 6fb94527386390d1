//! Shared client state.
//!
//! Everything the pipeline stages share across operations: configuration,
//! the bearer token slot, the auth session and the error surface.

use std::sync::Arc;

use crate::auth::AuthSession;
use crate::config::ConfigV1;
use crate::metrics::Metrics;
use crate::store::TokenStore;
use crate::surface::ErrorSurface;

/// Cloned into every stage that needs it; all fields are shared handles.
#[derive(Clone)]
pub struct ClientContext {
    /// Configuration loaded at startup.
    pub config: Arc<ConfigV1>,
    /// Bearer token slot read by the auth stage.
    pub tokens: Arc<TokenStore>,
    /// Authentication status and single-flight refresh.
    pub session: Arc<AuthSession>,
    /// User-visible errors, drained by the presenter.
    pub errors: Arc<ErrorSurface>,
    pub metrics: Metrics,
}
