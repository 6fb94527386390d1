//! Client initialization.
//!
//! Builds the token store, auth session, error surface and pipeline from the
//! configuration. The stage order is fixed here: auth, error, retry,
//! normalize, then the transport.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::auth::{create_refresher, AuthSession};
use crate::client::GraphQLClient;
use crate::config::ConfigV1;
use crate::metrics::Metrics;
use crate::pipeline::{
    AuthStage, ErrorStage, HttpTransport, NormalizeStage, Pipeline, RetryPolicy, RetryStage,
    Stage, Transport,
};
use crate::state::ClientContext;
use crate::store::{create_backend, TokenStore};
use crate::surface::ErrorSurface;

/// Creates the shared state. Must run inside a Tokio runtime: the token store
/// starts listening for changes made by other contexts.
pub fn build_context(config: Arc<ConfigV1>, metrics: Metrics) -> ClientContext {
    let backend = create_backend(&config.storage);
    let tokens = Arc::new(TokenStore::new(
        backend.clone(),
        config.storage.token_key.clone(),
    ));
    if tokens.listen().is_none() {
        info!(
            "Storage '{}' has no change feed; token changes from other contexts are not observed",
            backend.get_name()
        );
    }

    let refresher = create_refresher(&config.refresh, &config.storage, backend);
    let session = Arc::new(AuthSession::new(tokens.clone(), refresher, metrics.clone()));
    let errors = Arc::new(ErrorSurface::new(config.errors.max_records));

    ClientContext {
        config,
        tokens,
        session,
        errors,
        metrics,
    }
}

/// Assembles the stages in transmission order over the given transport.
pub fn build_pipeline(context: &ClientContext, transport: Arc<dyn Transport>) -> Pipeline {
    let stages: Vec<Arc<dyn Stage>> = vec![
        Arc::new(AuthStage::new(context.tokens.clone())),
        Arc::new(ErrorStage::new(
            context.session.clone(),
            context.errors.clone(),
            context.metrics.clone(),
        )),
        Arc::new(RetryStage::new(
            RetryPolicy::from_config(&context.config.retry),
            context.metrics.clone(),
        )),
        Arc::new(NormalizeStage::new()),
    ];
    Pipeline::new(stages, transport)
}

/// Creates the HTTP transport for the configured endpoint.
pub fn build_transport(config: &ConfigV1, metrics: Metrics) -> Arc<dyn Transport> {
    let endpoint = config.graphql.resolve_endpoint();
    if endpoint.starts_with('/') {
        warn!(
            "GraphQL endpoint '{}' is relative; set graphql.endpoint to an absolute URL",
            endpoint
        );
    }
    Arc::new(
        HttpTransport::new(
            endpoint,
            Duration::from_millis(config.graphql.request_timeout_ms),
            metrics,
        )
        .with_debug_query(config.graphql.debug_query),
    )
}

/// Builds a client over an explicit transport and resumes a persisted session.
pub async fn build_client_with_transport(
    config: Arc<ConfigV1>,
    transport: Arc<dyn Transport>,
) -> Result<GraphQLClient, String> {
    assemble(config, Metrics::new(), transport).await
}

/// Builds a client talking HTTP to the configured endpoint.
pub async fn build_client(config: Arc<ConfigV1>) -> Result<GraphQLClient, String> {
    let metrics = Metrics::new();
    let transport = build_transport(&config, metrics.clone());
    assemble(config, metrics, transport).await
}

async fn assemble(
    config: Arc<ConfigV1>,
    metrics: Metrics,
    transport: Arc<dyn Transport>,
) -> Result<GraphQLClient, String> {
    let context = build_context(config, metrics);
    if context.session.restore().await? {
        info!("Resumed session from '{}'", context.tokens.key());
    }
    let pipeline = build_pipeline(&context, transport);
    info!(stages = ?pipeline.stage_names(), "GraphQL client ready");
    Ok(GraphQLClient::new(context, pipeline))
}
