//! HTTP server setup

use std::future::Future;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::app::options::ServerOptions;
use crate::errors::OrchestratorError;
use crate::server::handlers::{
    create_service_handler, delete_service_handler, deployments_handler, get_service_handler,
    health_handler, list_services_handler, logs_handler, metrics_handler, reconcile_handler,
    restart_handler, start_handler, stop_handler, templates_handler, version_handler,
};
use crate::server::state::ServerState;

/// Build the router
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        // Health and version
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        // Services
        .route(
            "/services",
            get(list_services_handler).post(create_service_handler),
        )
        .route(
            "/services/{id}",
            get(get_service_handler).delete(delete_service_handler),
        )
        .route("/services/{id}/start", post(start_handler))
        .route("/services/{id}/stop", post(stop_handler))
        .route("/services/{id}/restart", post(restart_handler))
        .route("/services/{id}/logs", get(logs_handler))
        .route("/services/{id}/metrics", get(metrics_handler))
        .route("/services/{id}/deployments", get(deployments_handler))
        // Templates
        .route("/templates", get(templates_handler))
        // Reconciliation
        .route("/reconcile", post(reconcile_handler))
        // State and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Start the HTTP server
pub async fn serve(
    options: &ServerOptions,
    state: Arc<ServerState>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<JoinHandle<Result<(), OrchestratorError>>, OrchestratorError> {
    let app = router(state);

    let addr = format!("{}:{}", options.host, options.port);
    info!("Starting HTTP server on {}", addr);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| OrchestratorError::ServerError(e.to_string()))?;

    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| OrchestratorError::ServerError(e.to_string()))
    });

    Ok(handle)
}
