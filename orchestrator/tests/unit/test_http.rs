//! HTTP API tests, driven through the router without a socket

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use svcorch::scheduler::SchedulerJobStatus;
use svcorch::server::serve::router;
use svcorch::server::state::ServerState;
use service_api::{TENANT_ID_HEADER, USER_ID_HEADER};

use crate::common::Harness;

fn app(h: &Harness) -> Router {
    router(Arc::new(ServerState::new(h.orchestrator.clone())))
}

fn request(method: Method, uri: &str, user: Option<Uuid>, tenant: Option<Uuid>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header(USER_ID_HEADER, user.to_string());
    }
    if let Some(tenant) = tenant {
        builder = builder.header(TENANT_ID_HEADER, tenant.to_string());
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    // Extractor rejections answer in plain text
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn create_body(name: &str) -> Value {
    json!({
        "name": name,
        "type": "database",
        "config": {
            "image": "postgres:16",
            "job_file": "postgres.nomad",
            "custom_variables": {"X": "1"}
        }
    })
}

#[tokio::test]
async fn test_health() {
    let h = Harness::new().await;
    let (status, body) = send(app(&h), request(Method::GET, "/health", None, None, None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_create_service() {
    let h = Harness::new().await;
    let (status, body) = send(
        app(&h),
        request(
            Method::POST,
            "/services",
            Some(h.user_id),
            Some(h.tenant_id),
            Some(create_body("db1")),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["name"], "db1");
    assert_eq!(body["status"], "stopped");
    assert_eq!(body["tenant_id"], h.tenant_id.to_string());
}

#[tokio::test]
async fn test_duplicate_create_conflicts() {
    let h = Harness::new().await;
    let create = || {
        request(
            Method::POST,
            "/services",
            Some(h.user_id),
            Some(h.tenant_id),
            Some(create_body("db1")),
        )
    };

    send(app(&h), create()).await;
    let (status, body) = send(app(&h), create()).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "duplicate_service");
    assert_eq!(body["kind"], "conflict");
}

#[tokio::test]
async fn test_missing_user_header() {
    let h = Harness::new().await;
    let (status, body) = send(app(&h), request(Method::GET, "/services", None, None, None)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn test_invalid_service_id() {
    let h = Harness::new().await;
    let (status, _) = send(
        app(&h),
        request(Method::GET, "/services/not-a-uuid", Some(h.user_id), None, None),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_not_implemented() {
    let h = Harness::new().await;
    let (_, created) = send(
        app(&h),
        request(Method::POST, "/services", Some(h.user_id), None, Some(create_body("db1"))),
    )
    .await;
    let uri = format!("/services/{}", created["id"].as_str().unwrap());

    let (status, body) = send(app(&h), request(Method::DELETE, &uri, Some(h.user_id), None, None)).await;

    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
    assert_eq!(body["error"], "not_implemented");
}

#[tokio::test]
async fn test_tenant_isolation() {
    let h = Harness::new().await;
    let (_, created) = send(
        app(&h),
        request(
            Method::POST,
            "/services",
            Some(h.user_id),
            Some(h.tenant_id),
            Some(create_body("db1")),
        ),
    )
    .await;
    let id = created["id"].as_str().unwrap().to_string();
    let other_tenant = Some(Uuid::new_v4());

    for (method, uri) in [
        (Method::GET, format!("/services/{}", id)),
        (Method::POST, format!("/services/{}/start", id)),
        (Method::POST, format!("/services/{}/stop", id)),
        (Method::GET, format!("/services/{}/logs", id)),
    ] {
        let (status, body) = send(app(&h), request(method, &uri, Some(h.user_id), other_tenant, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);
        assert_eq!(body["error"], "service_not_found");
    }
    assert_eq!(h.scheduler.submit_count(), 0);

    let (_, listed) = send(
        app(&h),
        request(Method::GET, "/services", Some(h.user_id), other_tenant, None),
    )
    .await;
    assert_eq!(listed["total"], 0);
}

#[tokio::test]
async fn test_start_stop_over_http() {
    let h = Harness::new().await;
    let (_, created) = send(
        app(&h),
        request(
            Method::POST,
            "/services",
            Some(h.user_id),
            Some(h.tenant_id),
            Some(create_body("db1")),
        ),
    )
    .await;
    let id = created["id"].as_str().unwrap().to_string();

    let (status, deployment) = send(
        app(&h),
        request(Method::POST, &format!("/services/{}/start", id), Some(h.user_id), Some(h.tenant_id), None),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(deployment["status"], "pending");

    // Stopping before the job runs is a conflict
    let stop = || {
        request(Method::POST, &format!("/services/{}/stop", id), Some(h.user_id), Some(h.tenant_id), None)
    };
    let (status, body) = send(app(&h), stop()).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "not_running");

    h.scheduler.set_status(Some(SchedulerJobStatus::Running));
    let (status, report) = send(
        app(&h),
        request(Method::POST, "/reconcile", Some(h.user_id), None, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["updated"], 1);

    let (status, body) = send(app(&h), stop()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (_, history) = send(
        app(&h),
        request(Method::GET, &format!("/services/{}/deployments", id), Some(h.user_id), Some(h.tenant_id), None),
    )
    .await;
    assert_eq!(history["total"], 1);
    assert_eq!(history["items"][0]["status"], "completed");
}

#[tokio::test]
async fn test_reconcile_rejected_for_tenants() {
    let h = Harness::new().await;
    let (status, _) = send(
        app(&h),
        request(Method::POST, "/reconcile", Some(h.user_id), Some(h.tenant_id), None),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_metrics_without_deployment() {
    let h = Harness::new().await;
    let (_, created) = send(
        app(&h),
        request(Method::POST, "/services", Some(h.user_id), None, Some(create_body("db1"))),
    )
    .await;
    let uri = format!("/services/{}/metrics", created["id"].as_str().unwrap());

    let (status, body) = send(app(&h), request(Method::GET, &uri, Some(h.user_id), None, None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "no_active_deployment");
}

#[tokio::test]
async fn test_templates() {
    let h = Harness::new().await;
    let (status, body) = send(
        app(&h),
        request(Method::GET, "/templates", Some(h.user_id), None, None),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["job_file"], "postgres.nomad");
}
