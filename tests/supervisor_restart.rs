//! A listener that cannot bind is restarted until it can.

use std::net::TcpListener;
use std::time::Duration;

use controller_gateway::lifecycle::SupervisorState;
use controller_gateway::{NodeController, Service};
use serde_json::json;

mod common;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn busy_port_crashes_then_binds_once_released() {
    let dir = tempfile::tempdir().unwrap();
    common::write_inputs(dir.path());

    let blocker = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = blocker.local_addr().unwrap().port();

    let mut config = common::config_in(dir.path());
    config.listener.port = port;
    config.supervisor.restart_delay_ms = 100;

    let service = Service::prepare(config, NodeController::new).await.unwrap();
    let spawned = common::spawn(service);
    let running = common::running(spawned, &format!("https://127.0.0.1:{}", port), dir);

    // The blocker never accepts, so calls would hang rather than fail.
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(!running.task.is_finished());
    drop(blocker);

    let mut answered = false;
    for _ in 0..50 {
        if running
            .client
            .call("status", vec![json!(common::SECRET)])
            .await
            .is_ok()
        {
            answered = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert!(answered, "gateway never recovered after the port was released");

    running.coordinator.terminate();
    let summary = running.task.await.unwrap().unwrap();
    assert!(summary.crashes >= 1, "{:?}", summary);
    assert_eq!(summary.invocations, summary.crashes + 1);
    assert_eq!(summary.state, SupervisorState::Stopped);
}
