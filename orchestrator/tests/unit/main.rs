//! Orchestrator integration tests

mod test_fsm;
mod test_http;
mod test_orchestrator;
