//! Startup orchestration.
//!
//! # Order
//! ```text
//! wait for secret → wait for cert + key → kill other instances
//!     → build controller → build gateway → install SIGTERM handler
//!     → spawn supervisor → job_start (blocking) → join supervisor
//! ```
//!
//! Nothing listens until both readiness gates and the singleton guard have
//! passed. The process does not finish until the supervisor returns, even
//! when the controller's main loop ends first.

use std::net::{AddrParseError, SocketAddr};
use std::sync::Arc;

use thiserror::Error;

use crate::config::ServiceConfig;
use crate::controller::{Controller, ControllerContext};
use crate::lifecycle::readiness::ReadinessGate;
use crate::lifecycle::shutdown::ShutdownCoordinator;
use crate::lifecycle::signals;
use crate::lifecycle::singleton::{
    ProcessIdentity, SingletonError, SingletonGuard, SystemProcessTable,
};
use crate::lifecycle::state::RunningState;
use crate::lifecycle::supervisor::{RunSummary, Supervisor};
use crate::net::{probe_certificates, TlsError};
use crate::observability::metrics;
use crate::rpc::{AuthorizedRpcGateway, GatewayHandle, GatewaySettings};
use crate::security::{probe_secret, Secret};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("singleton enforcement failed: {0}")]
    Singleton(#[from] SingletonError),

    #[error("TLS setup failed: {0}")]
    Tls(#[from] TlsError),

    #[error("invalid listen address: {0}")]
    Address(#[from] AddrParseError),

    #[error("cannot install signal handler: {0}")]
    Signal(#[source] std::io::Error),

    #[error("task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// A fully wired service that has not started serving yet.
pub struct Service<C> {
    config: ServiceConfig,
    secret: Secret,
    running: Arc<RunningState>,
    controller: Arc<C>,
    gateway: Arc<AuthorizedRpcGateway<C>>,
    coordinator: Arc<ShutdownCoordinator>,
}

impl<C: Controller> Service<C> {
    /// Wait for the service's inputs, enforce a single instance and build
    /// every component.
    pub async fn prepare<F>(config: ServiceConfig, build: F) -> Result<Self, StartupError>
    where
        F: FnOnce(ControllerContext) -> C,
    {
        let poll = config.readiness.poll_interval();
        let paths = &config.paths;

        let secret = ReadinessGate::new("secret key", poll)
            .wait(|| probe_secret(&paths.secret_file))
            .await;
        let material = ReadinessGate::new("certificates", poll)
            .wait(|| probe_certificates(&paths.cert_file, &paths.key_file))
            .await;

        if config.singleton.enabled {
            let identity = match &config.singleton.process_name {
                Some(name) => ProcessIdentity::new(name.clone()),
                None => ProcessIdentity::current()?,
            };
            SingletonGuard::for_current_process(SystemProcessTable, identity, config.singleton.settle())
                .enforce()
                .await?;
        }

        let addr: SocketAddr = config.listener.socket_address().parse()?;
        let tls = material.rustls_config().await?;

        let running = Arc::new(RunningState::new());
        metrics::record_done_initializing(false);

        let controller = Arc::new(build(ControllerContext {
            secret: secret.clone(),
            state: running.clone(),
            config: config.controller.clone(),
        }));

        let settings = GatewaySettings {
            addr,
            max_body_bytes: config.listener.max_body_bytes,
            shutdown_grace: config.listener.shutdown_grace(),
        };
        let gateway = Arc::new(AuthorizedRpcGateway::new(
            controller.clone(),
            settings,
            tls,
            running.clone(),
        ));

        let coordinator = Arc::new(ShutdownCoordinator::new(
            running.clone(),
            Arc::new(gateway.handle()),
            controller.clone(),
            secret.clone(),
        ));

        tracing::info!(job = %gateway.job(), address = %addr, "Service prepared");

        Ok(Self {
            config,
            secret,
            running,
            controller,
            gateway,
            coordinator,
        })
    }

    pub fn controller(&self) -> &Arc<C> {
        &self.controller
    }

    pub fn running_state(&self) -> &Arc<RunningState> {
        &self.running
    }

    /// Stop handle for the RPC listener.
    pub fn gateway_handle(&self) -> GatewayHandle {
        self.gateway.handle()
    }

    /// The sequence SIGTERM triggers.
    pub fn coordinator(&self) -> Arc<ShutdownCoordinator> {
        self.coordinator.clone()
    }

    /// Serve until terminated.
    pub async fn run(self) -> Result<RunSummary, StartupError> {
        let signal_task =
            signals::on_terminate(self.coordinator.clone()).map_err(StartupError::Signal)?;

        let supervisor = Supervisor::new(self.running.clone(), self.config.supervisor.restart_delay());
        let gateway = self.gateway.clone();
        let supervisor_task = tokio::spawn(async move {
            let gateway = &*gateway;
            supervisor.run(move || gateway.serve()).await
        });

        let controller = self.controller.clone();
        let secret = self.secret.clone();
        match tokio::task::spawn_blocking(move || controller.job_start(secret.expose())).await? {
            Ok(()) => tracing::info!("Controller finished, waiting for the RPC server"),
            Err(e) => tracing::error!(error = %e, "Controller main loop failed"),
        }

        let summary = supervisor_task.await?;
        signal_task.abort();

        tracing::info!(
            invocations = summary.invocations,
            crashes = summary.crashes,
            "Supervisor finished"
        );
        Ok(summary)
    }
}

/// Prepare and run the service with the controller `build` creates.
pub async fn run<C, F>(config: ServiceConfig, build: F) -> Result<RunSummary, StartupError>
where
    C: Controller,
    F: FnOnce(ControllerContext) -> C,
{
    Service::prepare(config, build).await?.run().await
}
