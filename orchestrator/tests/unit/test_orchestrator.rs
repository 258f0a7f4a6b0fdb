//! Service lifecycle tests against an in-process scheduler

use std::sync::atomic::Ordering;
use std::sync::Arc;

use svcorch::deploy::ServiceMetrics;
use svcorch::errors::OrchestratorError;
use svcorch::models::deployment::DeploymentStatus;
use svcorch::models::service::{ServiceStatus, ServiceType};
use svcorch::scheduler::{SchedulerJobStatus, UsageStats};
use uuid::Uuid;

use crate::common::{db_request, FakeScheduler, FlakyStore, Harness};

#[tokio::test]
async fn test_create_starts_stopped() {
    let h = Harness::new().await;

    let service = h
        .orchestrator
        .create(db_request("db1"), h.user_id, Some(h.tenant_id))
        .await
        .unwrap();

    assert_eq!(service.status, ServiceStatus::Stopped);
    assert_eq!(service.tenant_id, Some(h.tenant_id));
    assert_eq!(service.created_by, h.user_id);
}

#[tokio::test]
async fn test_create_duplicate_rejected() {
    let h = Harness::new().await;
    h.orchestrator
        .create(db_request("db1"), h.user_id, Some(h.tenant_id))
        .await
        .unwrap();

    let err = h
        .orchestrator
        .create(db_request("db1"), h.user_id, Some(h.tenant_id))
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::DuplicateService { .. }));

    // Same name under another type is a different service
    let mut other = db_request("db1");
    other.service_type = ServiceType::Custom;
    h.orchestrator
        .create(other, h.user_id, Some(h.tenant_id))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_create_quota() {
    let h = Harness::with_scheduler(FakeScheduler::default(), 2).await;

    for name in ["db1", "db2"] {
        h.orchestrator
            .create(db_request(name), h.user_id, Some(h.tenant_id))
            .await
            .unwrap();
    }

    let err = h
        .orchestrator
        .create(db_request("db3"), h.user_id, Some(h.tenant_id))
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::QuotaExceeded { max_services: 2 }));
    assert_eq!(h.store.count_services(Some(h.tenant_id)).await.unwrap(), 2);

    // System services are not counted against any tenant
    h.orchestrator
        .create(db_request("db3"), h.user_id, None)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_create_unknown_tenant() {
    let h = Harness::new().await;
    let err = h
        .orchestrator
        .create(db_request("db1"), h.user_id, Some(Uuid::new_v4()))
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::TenantNotFound(_)));
}

#[tokio::test]
async fn test_create_invalid_request() {
    let h = Harness::new().await;
    let mut request = db_request("db1");
    request.config.job_file = String::new();

    let err = h
        .orchestrator
        .create(request, h.user_id, Some(h.tenant_id))
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::ValidationError(_)));
}

#[tokio::test]
async fn test_start_renders_and_submits() {
    let h = Harness::new().await;
    let service = h
        .orchestrator
        .create(db_request("db1"), h.user_id, Some(h.tenant_id))
        .await
        .unwrap();

    let deployment = h.orchestrator.start(service.id, h.user_id).await.unwrap();

    assert_eq!(deployment.status, DeploymentStatus::Pending);
    assert_eq!(deployment.deployed_by, h.user_id);
    let prefix = format!("{}-db1-", &h.tenant_id.to_string()[..8]);
    assert!(deployment.job_id.starts_with(&prefix));

    let document = h.scheduler.last_document();
    assert!(document.contains(&format!("job \"{}\"", deployment.job_id)));
    assert!(document.contains("image = \"postgres:16\""));
    assert!(document.contains("x = \"1\""));
    assert!(document.contains("pw = \"secret\""));
    assert!(!document.contains("{{"));

    let service = h.orchestrator.get(service.id, None).await.unwrap();
    assert_eq!(service.status, ServiceStatus::Pending);
}

#[tokio::test]
async fn test_start_running_never_submits() {
    let h = Harness::new().await;
    let service = h
        .orchestrator
        .create(db_request("db1"), h.user_id, Some(h.tenant_id))
        .await
        .unwrap();
    h.force_status(&service, ServiceStatus::Stopped, ServiceStatus::Running)
        .await;

    let err = h.orchestrator.start(service.id, h.user_id).await.unwrap_err();

    assert!(matches!(err, OrchestratorError::AlreadyRunning(_)));
    assert_eq!(h.scheduler.submit_count(), 0);
    assert!(h.orchestrator.deployments(service.id, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_start_while_pending_is_in_progress() {
    let h = Harness::new().await;
    let service = h
        .orchestrator
        .create(db_request("db1"), h.user_id, Some(h.tenant_id))
        .await
        .unwrap();
    h.orchestrator.start(service.id, h.user_id).await.unwrap();

    let err = h.orchestrator.start(service.id, h.user_id).await.unwrap_err();

    assert!(matches!(err, OrchestratorError::DeploymentInProgress(_)));
    assert_eq!(h.scheduler.submit_count(), 1);
}

#[tokio::test]
async fn test_concurrent_starts_leave_one_active_deployment() {
    let h = Harness::new().await;
    let service = h
        .orchestrator
        .create(db_request("db1"), h.user_id, Some(h.tenant_id))
        .await
        .unwrap();

    let first = h.orchestrator.clone();
    let second = h.orchestrator.clone();
    let (a, b) = tokio::join!(
        first.start(service.id, h.user_id),
        second.start(service.id, h.user_id)
    );

    let results = [a, b];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, OrchestratorError::DeploymentInProgress(_))));

    let active = h
        .orchestrator
        .deployments(service.id, None)
        .await
        .unwrap()
        .into_iter()
        .filter(|d| d.status.is_active())
        .count();
    assert_eq!(active, 1);
    assert_eq!(h.scheduler.submit_count(), 1);
}

#[tokio::test]
async fn test_start_missing_template() {
    let h = Harness::new().await;
    let mut request = db_request("db1");
    request.config.job_file = "missing.nomad".to_string();
    let service = h
        .orchestrator
        .create(request, h.user_id, Some(h.tenant_id))
        .await
        .unwrap();

    let err = h.orchestrator.start(service.id, h.user_id).await.unwrap_err();

    assert!(matches!(err, OrchestratorError::TemplateNotFound(_)));
    assert_eq!(h.scheduler.submit_count(), 0);
    assert!(h.orchestrator.deployments(service.id, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_start_submit_failure_marks_deployment_failed() {
    let h = Harness::new().await;
    let service = h
        .orchestrator
        .create(db_request("db1"), h.user_id, Some(h.tenant_id))
        .await
        .unwrap();
    h.scheduler.fail_submit.store(true, Ordering::SeqCst);

    let err = h.orchestrator.start(service.id, h.user_id).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::SchedulerRejected(_)));

    let deployments = h.orchestrator.deployments(service.id, None).await.unwrap();
    assert_eq!(deployments.len(), 1);
    assert_eq!(deployments[0].status, DeploymentStatus::Failed);
    assert!(deployments[0].error_msg.is_some());
    assert!(deployments[0].completed_at.is_some());

    let service = h.orchestrator.get(service.id, None).await.unwrap();
    assert_eq!(service.status, ServiceStatus::Stopped);

    // A failed attempt does not block the next one
    h.scheduler.fail_submit.store(false, Ordering::SeqCst);
    h.orchestrator.start(service.id, h.user_id).await.unwrap();
    assert_eq!(
        h.orchestrator.deployments(service.id, None).await.unwrap().len(),
        2
    );
}

#[tokio::test]
async fn test_start_claim_failure_submits_nothing() {
    let store = Arc::new(FlakyStore::default());
    let h = Harness::with_store(store.clone()).await;
    let service = h.create("db1").await;
    store.fail_claims.store(1, Ordering::SeqCst);

    let err = h.orchestrator.start(service.id, h.user_id).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::PersistenceError(_)));
    assert_eq!(h.scheduler.submit_count(), 0);
    assert!(h.orchestrator.deployments(service.id, None).await.unwrap().is_empty());
    let unchanged = h.orchestrator.get(service.id, None).await.unwrap();
    assert_eq!(unchanged.status, ServiceStatus::Stopped);

    h.orchestrator.start(service.id, h.user_id).await.unwrap();
    assert_eq!(h.scheduler.submit_count(), 1);
}

#[tokio::test]
async fn test_start_moves_service_with_claim() {
    let store = Arc::new(FlakyStore::default());
    let h = Harness::with_store(store.clone()).await;
    let service = h.create("db1").await;

    // Nothing is written after the submission succeeds
    store.fail_transitions.store(usize::MAX, Ordering::SeqCst);
    let deployment = h.orchestrator.start(service.id, h.user_id).await.unwrap();

    let pending = h.orchestrator.get(service.id, None).await.unwrap();
    assert_eq!(pending.status, ServiceStatus::Pending);
    assert_eq!(deployment.status, DeploymentStatus::Pending);
}

#[tokio::test]
async fn test_stop_requires_running() {
    let h = Harness::new().await;
    let service = h
        .orchestrator
        .create(db_request("db1"), h.user_id, Some(h.tenant_id))
        .await
        .unwrap();

    let err = h.orchestrator.stop(service.id, h.user_id).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::NotRunning(_)));
    assert!(h.scheduler.cancelled.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_stop_running_without_deployment() {
    let h = Harness::new().await;
    let service = h
        .orchestrator
        .create(db_request("db1"), h.user_id, Some(h.tenant_id))
        .await
        .unwrap();
    h.force_status(&service, ServiceStatus::Stopped, ServiceStatus::Running)
        .await;

    let err = h.orchestrator.stop(service.id, h.user_id).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::NoActiveDeployment(_)));
}

#[tokio::test]
async fn test_database_lifecycle() {
    let h = Harness::new().await;
    let service = h
        .orchestrator
        .create(db_request("db1"), h.user_id, Some(h.tenant_id))
        .await
        .unwrap();

    let deployment = h.orchestrator.start(service.id, h.user_id).await.unwrap();

    h.scheduler.set_status(Some(SchedulerJobStatus::Running));
    let report = h.orchestrator.reconcile().await.unwrap();
    assert_eq!(report.updated, 1);

    let running = h.orchestrator.get(service.id, None).await.unwrap();
    assert_eq!(running.status, ServiceStatus::Running);

    let stopped = h.orchestrator.stop(service.id, h.user_id).await.unwrap();
    assert_eq!(stopped.status, ServiceStatus::Stopped);
    assert_eq!(
        h.scheduler.cancelled.lock().unwrap().as_slice(),
        [deployment.job_id.clone()]
    );

    let history = h.orchestrator.deployments(service.id, None).await.unwrap();
    assert_eq!(history[0].status, DeploymentStatus::Completed);
    assert!(history[0].started_at.is_some());

    let err = h.orchestrator.stop(service.id, h.user_id).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::NotRunning(_)));
}

#[tokio::test]
async fn test_stop_with_scheduler_unavailable() {
    let h = Harness::new().await;
    let service = h.create("db1").await;
    h.orchestrator.start(service.id, h.user_id).await.unwrap();
    h.scheduler.set_status(Some(SchedulerJobStatus::Running));
    h.orchestrator.reconcile().await.unwrap();
    let before = h.orchestrator.deployments(service.id, None).await.unwrap();

    h.scheduler.fail_cancel.store(true, Ordering::SeqCst);
    let err = h.orchestrator.stop(service.id, h.user_id).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::SchedulerUnavailable(_)));

    let service = h.orchestrator.get(service.id, None).await.unwrap();
    assert_eq!(service.status, ServiceStatus::Running);
    let after = h.orchestrator.deployments(service.id, None).await.unwrap();
    assert_eq!(before, after);
    assert_eq!(after[0].status, DeploymentStatus::Running);
    assert!(h.scheduler.cancelled.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_stop_writes_nothing_when_store_fails() {
    let store = Arc::new(FlakyStore::default());
    let h = Harness::with_store(store.clone()).await;
    let service = h.create("db1").await;
    h.orchestrator.start(service.id, h.user_id).await.unwrap();
    h.scheduler.set_status(Some(SchedulerJobStatus::Running));
    h.orchestrator.reconcile().await.unwrap();

    store.fail_transitions.store(1, Ordering::SeqCst);
    let err = h.orchestrator.stop(service.id, h.user_id).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::PersistenceError(_)));

    // Service and deployment move together, so neither moved
    let service = h.orchestrator.get(service.id, None).await.unwrap();
    assert_eq!(service.status, ServiceStatus::Running);
    let history = h.orchestrator.deployments(service.id, None).await.unwrap();
    assert_eq!(history[0].status, DeploymentStatus::Running);
}

#[tokio::test]
async fn test_restart_keeps_status() {
    let h = Harness::new().await;
    let service = h
        .orchestrator
        .create(db_request("db1"), h.user_id, Some(h.tenant_id))
        .await
        .unwrap();
    h.orchestrator.start(service.id, h.user_id).await.unwrap();
    h.scheduler.set_status(Some(SchedulerJobStatus::Running));
    h.orchestrator.reconcile().await.unwrap();

    let ack = h.orchestrator.restart(service.id, h.user_id).await.unwrap();
    assert_eq!(ack.eval_id, "eval-restart");
    assert_eq!(h.scheduler.restarts.load(Ordering::SeqCst), 1);

    h.scheduler.restart_conflict.store(true, Ordering::SeqCst);
    let err = h.orchestrator.restart(service.id, h.user_id).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::ConcurrentModification(_)));

    let service = h.orchestrator.get(service.id, None).await.unwrap();
    assert_eq!(service.status, ServiceStatus::Running);
}

#[tokio::test]
async fn test_restart_stopped_rejected() {
    let h = Harness::new().await;
    let service = h
        .orchestrator
        .create(db_request("db1"), h.user_id, Some(h.tenant_id))
        .await
        .unwrap();

    let err = h.orchestrator.restart(service.id, h.user_id).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::NotRunning(_)));
    assert_eq!(h.scheduler.restarts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_logs_and_metrics_without_deployment() {
    let h = Harness::with_scheduler(FakeScheduler::with_logs(&["ready"]), 5).await;
    let service = h
        .orchestrator
        .create(db_request("db1"), h.user_id, Some(h.tenant_id))
        .await
        .unwrap();

    let lines = h.orchestrator.service_logs(service.id, None).await.unwrap();
    assert!(lines.is_empty());

    let metrics = h.orchestrator.service_metrics(service.id, None).await.unwrap();
    assert_eq!(
        metrics,
        ServiceMetrics::NoActiveDeployment {
            service_id: service.id
        }
    );
}

#[tokio::test]
async fn test_logs_and_metrics_of_running_service() {
    let scheduler = FakeScheduler::with_logs(&["listening on 5432", "ready"]);
    let h = Harness::with_scheduler(scheduler, 5).await;
    let service = h
        .orchestrator
        .create(db_request("db1"), h.user_id, Some(h.tenant_id))
        .await
        .unwrap();
    let deployment = h.orchestrator.start(service.id, h.user_id).await.unwrap();
    h.scheduler.set_status(Some(SchedulerJobStatus::Running));
    h.orchestrator.reconcile().await.unwrap();

    let lines = h.orchestrator.service_logs(service.id, None).await.unwrap();
    assert_eq!(lines, vec!["listening on 5432", "ready"]);

    match h.orchestrator.service_metrics(service.id, None).await.unwrap() {
        ServiceMetrics::Reported { job_id, usage, .. } => {
            assert_eq!(job_id, deployment.job_id);
            assert!(matches!(usage, UsageStats::Available(_)));
        }
        other => panic!("unexpected metrics: {:?}", other),
    }
}

#[tokio::test]
async fn test_tenant_scoping() {
    let h = Harness::new().await;
    let service = h
        .orchestrator
        .create(db_request("db1"), h.user_id, Some(h.tenant_id))
        .await
        .unwrap();
    let other_tenant = Uuid::new_v4();

    assert!(matches!(
        h.orchestrator.get(service.id, Some(other_tenant)).await,
        Err(OrchestratorError::ServiceNotFound(_))
    ));
    assert!(h.orchestrator.list(Some(other_tenant)).await.unwrap().is_empty());
    assert_eq!(h.orchestrator.list(Some(h.tenant_id)).await.unwrap().len(), 1);
    assert_eq!(h.orchestrator.list(None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_templates_from_jobs_dir() {
    let h = Harness::new().await;
    std::fs::write(h.jobs_path().join("grafana.hcl"), "job {}").unwrap();
    std::fs::write(h.jobs_path().join("README.md"), "docs").unwrap();

    let mut templates = h.orchestrator.templates().await.unwrap();
    templates.sort_by(|a, b| a.name.cmp(&b.name));

    let names: Vec<&str> = templates.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["grafana", "postgres"]);
    assert_eq!(templates[0].service_type, ServiceType::Monitoring);
    assert_eq!(templates[1].service_type, ServiceType::Database);
    assert_eq!(templates[1].job_file, "postgres.nomad");
}
