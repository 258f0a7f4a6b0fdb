//! FSM unit tests

use svcorch::deploy::fsm::{ServiceEvent, ServiceFsm};
use svcorch::errors::OrchestratorError;
use svcorch::models::service::ServiceStatus;
use uuid::Uuid;

#[test]
fn test_fsm_initial_state() {
    let fsm = ServiceFsm::new(Uuid::new_v4(), ServiceStatus::default());
    assert_eq!(fsm.state(), ServiceStatus::Stopped);
}

#[test]
fn test_fsm_start_stop_flow() {
    let mut fsm = ServiceFsm::new(Uuid::new_v4(), ServiceStatus::Stopped);

    // Stopped -> Pending
    fsm.process(ServiceEvent::Start).unwrap();
    assert_eq!(fsm.state(), ServiceStatus::Pending);

    // Pending -> Running
    fsm.process(ServiceEvent::Observed(ServiceStatus::Running)).unwrap();
    assert_eq!(fsm.state(), ServiceStatus::Running);

    // Running -> Stopped
    fsm.process(ServiceEvent::Stop).unwrap();
    assert_eq!(fsm.state(), ServiceStatus::Stopped);
}

#[test]
fn test_fsm_rejected_transition_keeps_state() {
    let id = Uuid::new_v4();
    let mut fsm = ServiceFsm::new(id, ServiceStatus::Stopped);

    match fsm.process(ServiceEvent::Stop) {
        Err(OrchestratorError::NotRunning(service_id)) => assert_eq!(service_id, id),
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(fsm.state(), ServiceStatus::Stopped);
}

#[test]
fn test_fsm_observation_overrides_any_state() {
    for from in [
        ServiceStatus::Stopped,
        ServiceStatus::Pending,
        ServiceStatus::Running,
        ServiceStatus::Error,
    ] {
        let mut fsm = ServiceFsm::new(Uuid::new_v4(), from);
        fsm.process(ServiceEvent::Observed(ServiceStatus::Error)).unwrap();
        assert_eq!(fsm.state(), ServiceStatus::Error);
    }
}

#[test]
fn test_fsm_restart_from_error_is_rejected() {
    let mut fsm = ServiceFsm::new(Uuid::new_v4(), ServiceStatus::Error);
    assert!(matches!(
        fsm.process(ServiceEvent::Restart),
        Err(OrchestratorError::NotRunning(_))
    ));
}
