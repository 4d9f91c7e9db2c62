//! SIGTERM runs the termination sequence and lets the process finish.

use std::time::Duration;

use controller_gateway::lifecycle::SupervisorState;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use serde_json::json;

mod common;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn sigterm_stops_listener_then_controller() {
    let service = common::start_service().await;

    let before = service.client.call("status", vec![json!(common::SECRET)]).await;
    assert!(before.is_ok());

    kill(Pid::this(), Signal::SIGTERM).unwrap();

    let summary = tokio::time::timeout(Duration::from_secs(10), service.task)
        .await
        .expect("service did not stop after SIGTERM")
        .unwrap()
        .unwrap();

    assert_eq!(summary.state, SupervisorState::Stopped);
    assert!(service.controller.is_stopping());
    assert!(!service.controller.stop_deployment_requested());
}
