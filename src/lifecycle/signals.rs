//! OS signal handling.
//!
//! Only SIGTERM is handled. Every other signal keeps its default
//! disposition.

use std::sync::Arc;

use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinHandle;

use crate::lifecycle::shutdown::ShutdownCoordinator;

/// Install the SIGTERM handler.
///
/// The handler is registered before this returns, so a signal delivered
/// afterwards is never lost. Each delivery runs the termination sequence
/// inline on the signal task; repeats after the first are no-ops.
pub fn on_terminate(coordinator: Arc<ShutdownCoordinator>) -> std::io::Result<JoinHandle<()>> {
    let mut terminate = signal(SignalKind::terminate())?;

    Ok(tokio::spawn(async move {
        while terminate.recv().await.is_some() {
            tracing::info!("Received SIGTERM");
            coordinator.terminate();
        }
    }))
}
