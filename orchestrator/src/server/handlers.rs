//! HTTP request handlers

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Path, State},
    http::{request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use service_api::{
    ControlResponse, ErrorResponse, HealthResponse, ListResponse, LogsResponse, ReconcileResponse,
    VersionResponse, TENANT_ID_HEADER, USER_ID_HEADER,
};
use tracing::error;
use uuid::Uuid;

use crate::errors::{ErrorKind, OrchestratorError};
use crate::models::service::CreateServiceRequest;
use crate::server::state::ServerState;
use crate::version;

/// Authenticated caller, taken from headers set by the upstream gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: Uuid,
    /// None for system-wide callers, which see every tenant's services
    pub tenant_id: Option<Uuid>,
}

fn header_uuid(headers: &HeaderMap, name: &str) -> Result<Option<Uuid>, OrchestratorError> {
    let Some(value) = headers.get(name) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| OrchestratorError::ValidationError(format!("{} is not valid text", name)))?
        .trim();
    if value.is_empty() {
        return Ok(None);
    }
    Uuid::parse_str(value)
        .map(Some)
        .map_err(|_| OrchestratorError::ValidationError(format!("{} must be a UUID", name)))
}

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = OrchestratorError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = header_uuid(&parts.headers, USER_ID_HEADER)?.ok_or_else(|| {
            OrchestratorError::ValidationError(format!("{} header is required", USER_ID_HEADER))
        })?;
        let tenant_id = header_uuid(&parts.headers, TENANT_ID_HEADER)?;
        Ok(Self { user_id, tenant_id })
    }
}

/// HTTP status for an error
pub fn status_code(err: &OrchestratorError) -> StatusCode {
    match err {
        OrchestratorError::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
        OrchestratorError::SchedulerUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        OrchestratorError::SchedulerRejected(_) => StatusCode::BAD_GATEWAY,
        OrchestratorError::ConcurrentModification(_) => StatusCode::CONFLICT,
        err => match err.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Upstream => StatusCode::BAD_GATEWAY,
            ErrorKind::Persistence | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        },
    }
}

impl IntoResponse for OrchestratorError {
    fn into_response(self) -> Response {
        let status = status_code(&self);
        if status.is_server_error() {
            error!(code = self.code(), "Request failed: {}", self);
        }

        let body = ErrorResponse {
            error: self.code().to_string(),
            message: self.to_string(),
            kind: self.kind().as_str().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "svcorch".to_string(),
        version: version::VERSION.to_string(),
    })
}

/// Version handler
pub async fn version_handler() -> impl IntoResponse {
    Json(VersionResponse {
        version: version::VERSION.to_string(),
        revision: version::REVISION.map(str::to_string),
    })
}

pub async fn create_service_handler(
    State(state): State<Arc<ServerState>>,
    caller: Caller,
    Json(request): Json<CreateServiceRequest>,
) -> Result<impl IntoResponse, OrchestratorError> {
    let service = state
        .orchestrator
        .create(request, caller.user_id, caller.tenant_id)
        .await?;
    Ok((StatusCode::CREATED, Json(service)))
}

pub async fn list_services_handler(
    State(state): State<Arc<ServerState>>,
    caller: Caller,
) -> Result<impl IntoResponse, OrchestratorError> {
    let services = state.orchestrator.list(caller.tenant_id).await?;
    Ok(Json(ListResponse::new(services)))
}

pub async fn get_service_handler(
    State(state): State<Arc<ServerState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, OrchestratorError> {
    let service = state.orchestrator.get(id, caller.tenant_id).await?;
    Ok(Json(service))
}

pub async fn delete_service_handler(
    State(state): State<Arc<ServerState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, OrchestratorError> {
    state.orchestrator.get(id, caller.tenant_id).await?;
    Err(OrchestratorError::NotImplemented(
        "service deletion".to_string(),
    ))
}

pub async fn start_handler(
    State(state): State<Arc<ServerState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, OrchestratorError> {
    state.orchestrator.get(id, caller.tenant_id).await?;
    let deployment = state.orchestrator.start(id, caller.user_id).await?;
    Ok((StatusCode::ACCEPTED, Json(deployment)))
}

pub async fn stop_handler(
    State(state): State<Arc<ServerState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, OrchestratorError> {
    state.orchestrator.get(id, caller.tenant_id).await?;
    let service = state.orchestrator.stop(id, caller.user_id).await?;
    Ok(Json(ControlResponse {
        success: true,
        service_id: service.id.to_string(),
        message: Some("Service stopped".to_string()),
    }))
}

pub async fn restart_handler(
    State(state): State<Arc<ServerState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, OrchestratorError> {
    state.orchestrator.get(id, caller.tenant_id).await?;
    let ack = state.orchestrator.restart(id, caller.user_id).await?;
    Ok(Json(ControlResponse {
        success: true,
        service_id: id.to_string(),
        message: Some(format!("Restart evaluation {}", ack.eval_id)),
    }))
}

pub async fn logs_handler(
    State(state): State<Arc<ServerState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, OrchestratorError> {
    let lines = state.orchestrator.service_logs(id, caller.tenant_id).await?;
    let total = lines.len();
    Ok(Json(LogsResponse { lines, total }))
}

pub async fn metrics_handler(
    State(state): State<Arc<ServerState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, OrchestratorError> {
    let metrics = state
        .orchestrator
        .service_metrics(id, caller.tenant_id)
        .await?;
    Ok(Json(metrics))
}

pub async fn deployments_handler(
    State(state): State<Arc<ServerState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, OrchestratorError> {
    let deployments = state.orchestrator.deployments(id, caller.tenant_id).await?;
    Ok(Json(ListResponse::new(deployments)))
}

pub async fn templates_handler(
    State(state): State<Arc<ServerState>>,
    _caller: Caller,
) -> Result<impl IntoResponse, OrchestratorError> {
    let templates = state.orchestrator.templates().await?;
    Ok(Json(ListResponse::new(templates)))
}

/// Run one reconciliation pass; system callers only
pub async fn reconcile_handler(
    State(state): State<Arc<ServerState>>,
    caller: Caller,
) -> Result<impl IntoResponse, OrchestratorError> {
    if caller.tenant_id.is_some() {
        return Err(OrchestratorError::ValidationError(
            "reconciliation is not available to tenant callers".to_string(),
        ));
    }

    let report = state.orchestrator.reconcile().await?;
    Ok(Json(ReconcileResponse {
        examined: report.examined,
        updated: report.updated,
        unchanged: report.unchanged,
        skipped: report.skipped,
        errors: report.errors,
        duration_ms: report.duration_ms,
        finished_at: report.finished_at,
    }))
}
