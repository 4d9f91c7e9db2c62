//! Termination sequence.
//!
//! On a terminate request the stop flag is set first, so the supervisor
//! cannot restart the listener once it returns. The listener is stopped
//! next, and the controller is asked to stop last, keeping the deployment
//! running.

use std::sync::Arc;

use crate::controller::{Controller, ControllerError};
use crate::lifecycle::state::RunningState;
use crate::security::Secret;

/// Stops the current listener.
pub trait StopServer: Send + Sync {
    fn stop(&self);
}

/// The part of the controller the termination sequence needs.
pub trait ControllerShutdown: Send + Sync {
    fn terminate(&self, stop_deployment: bool, secret: &str) -> Result<(), ControllerError>;
}

impl<C: Controller> ControllerShutdown for C {
    fn terminate(&self, stop_deployment: bool, secret: &str) -> Result<(), ControllerError> {
        Controller::kill(self, stop_deployment, secret).map(|_| ())
    }
}

pub struct ShutdownCoordinator {
    state: Arc<RunningState>,
    server: Arc<dyn StopServer>,
    controller: Arc<dyn ControllerShutdown>,
    secret: Secret,
}

impl ShutdownCoordinator {
    pub fn new(
        state: Arc<RunningState>,
        server: Arc<dyn StopServer>,
        controller: Arc<dyn ControllerShutdown>,
        secret: Secret,
    ) -> Self {
        Self {
            state,
            server,
            controller,
            secret,
        }
    }

    /// Run the termination sequence. Later calls are no-ops.
    pub fn terminate(&self) {
        if !self.state.mark_signal_received() {
            tracing::debug!("Termination already in progress");
            return;
        }
        tracing::info!("Received terminate request, shutting down");

        self.server.stop();

        if let Err(e) = self.controller.terminate(false, self.secret.expose()) {
            tracing::error!(error = %e, "Controller did not stop cleanly");
        }
    }
}
