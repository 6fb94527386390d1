//! Turns failures into user-visible error records and recovers expired
//! sessions.
//!
//! An `UNAUTHENTICATED` answer triggers one silent refresh (shared with every
//! other operation failing at the same time) and a single re-submission with
//! the new token. Authentication errors never reach the error surface. Every
//! other GraphQL or transport failure is queued as an [`ErrorRecord`] unless a
//! refresh is pending, and the operation is rejected either way.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::auth_stage::{attach_bearer, detach_bearer};
use super::base::{Next, Stage};
use crate::auth::AuthSession;
use crate::error::PipelineError;
use crate::metrics::{Metrics, MetricsRecorder};
use crate::models::{ErrorRecord, GraphQLResponse, Operation};
use crate::surface::ErrorSurface;
use crate::utils::throttle::LogThrottle;

const SUPPRESSED_LOG_INTERVAL: Duration = Duration::from_secs(10);

pub struct ErrorStage {
    session: Arc<AuthSession>,
    errors: Arc<ErrorSurface>,
    metrics: Metrics,
    throttle: LogThrottle,
}

impl ErrorStage {
    pub fn new(session: Arc<AuthSession>, errors: Arc<ErrorSurface>, metrics: Metrics) -> Self {
        ErrorStage {
            session,
            errors,
            metrics,
            throttle: LogThrottle::new(SUPPRESSED_LOG_INTERVAL),
        }
    }

    async fn refresh_and_resubmit(
        &self,
        mut operation: Operation,
        next: Next<'_>,
    ) -> Result<GraphQLResponse, PipelineError> {
        let current = self.session.tokens().read().await.unwrap_or_else(|e| {
            warn!("Could not read bearer token: {}", e);
            None
        });

        // Another operation may already have replaced the rejected token.
        let token = match current {
            Some(current) if operation.bearer.as_deref() != Some(current.as_str()) => {
                debug!(
                    operation_id = %operation.id,
                    "Token changed since '{}' was sent; re-submitting",
                    operation.display_name()
                );
                current
            }
            _ => {
                info!(
                    operation_id = %operation.id,
                    status = %self.session.status(),
                    "'{}' was rejected as unauthenticated; refreshing token",
                    operation.display_name()
                );
                self.session.refresh().await?
            }
        };

        operation.auth_retried = true;
        detach_bearer(&mut operation);
        attach_bearer(&mut operation, &token);

        let result = next.run(operation.clone()).await;
        if is_unauthenticated(&result) {
            warn!(
                operation_id = %operation.id,
                "'{}' still unauthenticated after token refresh",
                operation.display_name()
            );
            return Err(PipelineError::Unauthenticated);
        }
        self.settle(result)
    }

    /// Queues records for the failures in `result` and rejects it if failed.
    fn settle(
        &self,
        result: Result<GraphQLResponse, PipelineError>,
    ) -> Result<GraphQLResponse, PipelineError> {
        match result {
            Ok(response) if !response.has_errors() => Ok(response),
            Ok(response) => {
                for error in response.errors.iter().filter(|e| !e.is_unauthenticated()) {
                    warn!(code = error.code(), "[GraphQL error]: {}", error.message);
                    self.surface(ErrorRecord::graphql(error.message.clone()));
                }
                Err(PipelineError::GraphQL(response.errors))
            }
            Err(error) if error.is_transport() => {
                warn!("[Network error]: {}", error);
                self.surface(ErrorRecord::network(&error));
                Err(error)
            }
            Err(error) => Err(error),
        }
    }

    fn surface(&self, record: ErrorRecord) {
        let origin = record.origin.as_str();
        let status = self.session.status();
        if self.errors.push_unless_refreshing(record, status) {
            self.metrics.record_surfaced_error(origin);
            return;
        }
        if !status.is_refresh_pending() {
            // The surface is configured to keep nothing.
            return;
        }
        self.metrics.record_suppressed_error(origin);
        if let Some(skipped) = self.throttle.should_emit(origin) {
            info!(
                origin,
                status = %status,
                skipped,
                "Suppressing {} errors while the token is refreshed",
                origin
            );
        }
    }
}

fn is_unauthenticated(result: &Result<GraphQLResponse, PipelineError>) -> bool {
    match result {
        Ok(response) => response.is_unauthenticated(),
        Err(error) => error.graphql_errors().iter().any(|e| e.is_unauthenticated()),
    }
}

#[async_trait]
impl Stage for ErrorStage {
    fn get_name(&self) -> &str {
        "error"
    }

    async fn handle(
        &self,
        operation: Operation,
        next: Next<'_>,
    ) -> Result<GraphQLResponse, PipelineError> {
        let result = next.run(operation.clone()).await;
        if is_unauthenticated(&result) {
            if operation.auth_retried {
                return Err(PipelineError::Unauthenticated);
            }
            return self.refresh_and_resubmit(operation, next).await;
        }
        self.settle(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthEvent, AuthStatus, NoRefresher, Refresher};
    use crate::models::{ErrorOrigin, GraphQLError};
    use crate::pipeline::{AuthStage, Transport};
    use crate::store::{MemoryStorage, TokenStore};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FixedRefresher(&'static str);

    #[async_trait]
    impl Refresher for FixedRefresher {
        fn get_name(&self) -> &str {
            "fixed"
        }

        async fn refresh(&self, _current: Option<&str>) -> Result<String, String> {
            Ok(self.0.to_string())
        }
    }

    /// Answers from a queue of canned results, recording the bearer of each send.
    struct Scripted {
        answers: Mutex<Vec<Result<GraphQLResponse, PipelineError>>>,
        bearers: Mutex<Vec<Option<String>>>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(mut answers: Vec<Result<GraphQLResponse, PipelineError>>) -> Self {
            answers.reverse();
            Scripted {
                answers: Mutex::new(answers),
                bearers: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Transport for Scripted {
        fn get_name(&self) -> &str {
            "scripted"
        }

        async fn send(&self, operation: Operation) -> Result<GraphQLResponse, PipelineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.bearers.lock().unwrap().push(operation.bearer.clone());
            self.answers.lock().unwrap().pop().unwrap_or_else(|| Ok(ok()))
        }
    }

    fn ok() -> GraphQLResponse {
        GraphQLResponse {
            data: Some(json!({"me": {"id": "1"}})),
            errors: vec![],
        }
    }

    fn failing(code: &str, message: &str) -> GraphQLResponse {
        GraphQLResponse {
            data: None,
            errors: vec![GraphQLError::new(message).with_code(code)],
        }
    }

    struct Fixture {
        session: Arc<AuthSession>,
        errors: Arc<ErrorSurface>,
        stages: Vec<Arc<dyn Stage>>,
    }

    async fn fixture(refresher: Arc<dyn Refresher>, token: Option<&str>) -> Fixture {
        let tokens = Arc::new(TokenStore::new(Arc::new(MemoryStorage::new()), "accessToken"));
        let session = Arc::new(AuthSession::new(tokens.clone(), refresher, Metrics::new()));
        if let Some(token) = token {
            session.begin_sign_in().unwrap();
            session.complete_sign_in(token).await.unwrap();
        }
        let errors = Arc::new(ErrorSurface::unbounded());
        let stages: Vec<Arc<dyn Stage>> = vec![
            Arc::new(AuthStage::new(tokens)),
            Arc::new(ErrorStage::new(session.clone(), errors.clone(), Metrics::new())),
        ];
        Fixture {
            session,
            errors,
            stages,
        }
    }

    #[tokio::test]
    async fn test_success_passes_through() {
        let f = fixture(Arc::new(NoRefresher::new()), Some("tok")).await;
        let transport = Scripted::new(vec![Ok(ok())]);
        let response = Next::new(&f.stages, &transport)
            .run(Operation::new("me { id }"))
            .await
            .unwrap();
        assert_eq!(response, ok());
        assert!(f.errors.is_empty());
    }

    #[tokio::test]
    async fn test_graphql_error_surfaced_and_rejected() {
        let f = fixture(Arc::new(NoRefresher::new()), Some("tok")).await;
        let transport = Scripted::new(vec![Ok(failing("NOT_FOUND", "Not found"))]);
        let result = Next::new(&f.stages, &transport)
            .run(Operation::new("me { id }"))
            .await;

        assert!(matches!(result, Err(PipelineError::GraphQL(ref e)) if e[0].message == "Not found"));
        let records = f.errors.drain();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].origin, ErrorOrigin::Graphql);
        assert_eq!(records[0].message, "Not found");
    }

    #[tokio::test]
    async fn test_network_error_surfaced_with_prefix() {
        let f = fixture(Arc::new(NoRefresher::new()), None).await;
        let transport = Scripted::new(vec![Err(PipelineError::Network("connection refused".into()))]);
        let result = Next::new(&f.stages, &transport)
            .run(Operation::new("q"))
            .await;

        assert!(matches!(result, Err(PipelineError::Network(_))));
        let records = f.errors.drain();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].origin, ErrorOrigin::Network);
        assert_eq!(records[0].message, "[Network error]: connection refused");
    }

    #[tokio::test]
    async fn test_unauthenticated_refreshes_and_resubmits() {
        let f = fixture(Arc::new(FixedRefresher("fresh")), Some("stale")).await;
        let transport = Scripted::new(vec![
            Ok(failing("UNAUTHENTICATED", "expired")),
            Ok(ok()),
        ]);
        let response = Next::new(&f.stages, &transport)
            .run(Operation::new("me { id }"))
            .await
            .unwrap();

        assert_eq!(response, ok());
        assert_eq!(
            *transport.bearers.lock().unwrap(),
            vec![Some("stale".to_string()), Some("fresh".to_string())]
        );
        assert_eq!(f.session.status(), AuthStatus::Done);
        assert!(f.errors.is_empty());
    }

    #[tokio::test]
    async fn test_second_unauthenticated_rejects_without_surfacing() {
        let f = fixture(Arc::new(FixedRefresher("fresh")), Some("stale")).await;
        let transport = Scripted::new(vec![
            Ok(failing("UNAUTHENTICATED", "expired")),
            Ok(failing("UNAUTHENTICATED", "still expired")),
        ]);
        let result = Next::new(&f.stages, &transport)
            .run(Operation::new("q"))
            .await;

        assert!(matches!(result, Err(PipelineError::Unauthenticated)));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
        assert!(f.errors.is_empty());
    }

    #[tokio::test]
    async fn test_failed_refresh_signs_out_without_surfacing() {
        let f = fixture(Arc::new(NoRefresher::new()), Some("stale")).await;
        let transport = Scripted::new(vec![Ok(failing("UNAUTHENTICATED", "expired"))]);
        let result = Next::new(&f.stages, &transport)
            .run(Operation::new("q"))
            .await;

        assert!(matches!(result, Err(PipelineError::RefreshFailed(_))));
        assert_eq!(f.session.status(), AuthStatus::Unauthenticated);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
        assert!(f.errors.is_empty());
    }

    #[tokio::test]
    async fn test_unauthenticated_without_session_is_rejected() {
        let f = fixture(Arc::new(FixedRefresher("fresh")), None).await;
        let transport = Scripted::new(vec![Ok(failing("UNAUTHENTICATED", "sign in"))]);
        let result = Next::new(&f.stages, &transport)
            .run(Operation::new("q"))
            .await;

        assert!(matches!(result, Err(PipelineError::Unauthenticated)));
        assert_eq!(f.session.status(), AuthStatus::Unauthenticated);
        assert!(f.errors.is_empty());
    }

    #[tokio::test]
    async fn test_rotated_token_resubmits_without_refresh() {
        let refresher = Arc::new(CountingFixed(AtomicUsize::new(0)));
        let f = fixture(refresher.clone(), Some("stale")).await;
        let transport = Scripted::new(vec![Ok(failing("UNAUTHENTICATED", "expired")), Ok(ok())]);

        // Another context rotates the token before the answer is processed.
        let mut operation = Operation::new("q");
        operation.bearer = Some("older".to_string());
        f.session.tokens().write("rotated").await.unwrap();
        let stages = &f.stages[1..];
        Next::new(stages, &transport).run(operation).await.unwrap();

        assert_eq!(refresher.0.load(Ordering::SeqCst), 0);
        assert_eq!(
            transport.bearers.lock().unwrap()[1].as_deref(),
            Some("rotated")
        );
    }

    struct CountingFixed(AtomicUsize);

    #[async_trait]
    impl Refresher for CountingFixed {
        fn get_name(&self) -> &str {
            "counting"
        }

        async fn refresh(&self, _current: Option<&str>) -> Result<String, String> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok("fresh".to_string())
        }
    }

    #[tokio::test]
    async fn test_errors_suppressed_while_refresh_pending() {
        let f = fixture(Arc::new(NoRefresher::new()), Some("tok")).await;
        let stage = ErrorStage::new(f.session.clone(), f.errors.clone(), Metrics::new());
        f.session
            .status_machine()
            .apply(AuthEvent::RefreshRequested)
            .unwrap();

        stage.settle(Ok(failing("NOT_FOUND", "Not found"))).unwrap_err();
        stage
            .settle(Err(PipelineError::Network("down".into())))
            .unwrap_err();
        assert!(f.errors.is_empty());

        // Surfacing resumes once the refresh is over.
        f.session.status_machine().apply(AuthEvent::RefreshStarted).unwrap();
        f.session.status_machine().apply(AuthEvent::RefreshFinished).unwrap();
        stage.settle(Ok(failing("NOT_FOUND", "Not found"))).unwrap_err();
        assert_eq!(f.errors.len(), 1);
    }

    #[tokio::test]
    async fn test_zero_bound_surface_counts_nothing_as_surfaced() {
        let f = fixture(Arc::new(NoRefresher::new()), Some("tok")).await;
        let metrics = Metrics::new();
        let stage = ErrorStage::new(
            f.session.clone(),
            Arc::new(ErrorSurface::new(Some(0))),
            metrics.clone(),
        );

        stage.settle(Ok(failing("NOT_FOUND", "Not found"))).unwrap_err();

        let rendered = metrics.render();
        assert!(!rendered.contains("surfaced_errors_total{"));
        assert!(!rendered.contains("suppressed_errors_total{"));
    }
}
