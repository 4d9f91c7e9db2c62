//! Shared utilities for the end-to-end tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use controller_gateway::config::schema::ServiceConfig;
use controller_gateway::lifecycle::{RunSummary, ShutdownCoordinator, StartupError};
use controller_gateway::rpc::GatewayHandle;
use controller_gateway::{NodeController, Service};
use controller_sdk::ControllerClient;
use tempfile::TempDir;
use tokio::task::JoinHandle;

pub const SECRET: &str = "integration-secret";

const CERT: &str = include_str!("../fixtures/cert.pem");
const KEY: &str = include_str!("../fixtures/key.pem");

/// Config pointing at files under `dir`, bound to an ephemeral loopback port.
pub fn config_in(dir: &Path) -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.paths.secret_file = dir.join("secret.key");
    config.paths.cert_file = dir.join("mycert.pem");
    config.paths.key_file = dir.join("mykey.pem");
    config.listener.bind_address = "127.0.0.1".to_string();
    config.listener.port = 0;
    config.listener.shutdown_grace_secs = 1;
    config.readiness.poll_interval_secs = 1;
    config.singleton.enabled = false;
    config
}

pub fn write_inputs(dir: &Path) {
    std::fs::write(dir.join("secret.key"), format!("{}\n", SECRET)).unwrap();
    std::fs::write(dir.join("mycert.pem"), CERT).unwrap();
    std::fs::write(dir.join("mykey.pem"), KEY).unwrap();
}

/// A service running in the background.
pub struct RunningService {
    pub client: ControllerClient,
    pub handle: GatewayHandle,
    pub coordinator: Arc<ShutdownCoordinator>,
    pub controller: Arc<NodeController>,
    pub task: JoinHandle<Result<RunSummary, StartupError>>,
    _dir: TempDir,
}

/// Prepare a service from default test inputs and wait until it listens.
pub async fn start_service() -> RunningService {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path());

    let service = Service::prepare(config_in(dir.path()), NodeController::new)
        .await
        .unwrap();
    let handle = service.gateway_handle();
    let task = spawn(service);
    let addr = handle.listening().await.expect("gateway did not bind");
    running(task, &format!("https://{}", addr), dir)
}

pub struct Spawned {
    handle: GatewayHandle,
    coordinator: Arc<ShutdownCoordinator>,
    controller: Arc<NodeController>,
    task: JoinHandle<Result<RunSummary, StartupError>>,
}

/// Run a prepared service in the background without waiting for it.
pub fn spawn(service: Service<NodeController>) -> Spawned {
    Spawned {
        handle: service.gateway_handle(),
        coordinator: service.coordinator(),
        controller: service.controller().clone(),
        task: tokio::spawn(service.run()),
    }
}

pub fn running(spawned: Spawned, url: &str, dir: TempDir) -> RunningService {
    RunningService {
        client: ControllerClient::with_options(url, true).unwrap(),
        handle: spawned.handle,
        coordinator: spawned.coordinator,
        controller: spawned.controller,
        task: spawned.task,
        _dir: dir,
    }
}
