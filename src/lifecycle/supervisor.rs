//! Crash-restart loop around the RPC serve call.
//!
//! # States
//! ```text
//! Starting → Running → Crashed → Running → ... → Stopped
//! ```
//! A serve call that returns an error, or panics, is logged and restarted.
//! Only a clean return, or a stop already requested before the next
//! attempt, reaches `Stopped`.

use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;

use crate::lifecycle::state::RunningState;
use crate::observability::metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Starting,
    Running,
    Crashed,
    Stopped,
}

/// What happened over the supervisor's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub invocations: u64,
    pub crashes: u64,
    pub state: SupervisorState,
}

pub struct Supervisor {
    running: Arc<RunningState>,
    restart_delay: Duration,
}

impl Supervisor {
    pub fn new(running: Arc<RunningState>, restart_delay: Duration) -> Self {
        Self {
            running,
            restart_delay,
        }
    }

    /// Run `serve` until it returns `Ok` or a stop is requested.
    pub async fn run<F, Fut, E>(&self, mut serve: F) -> RunSummary
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: Display,
    {
        let mut summary = RunSummary {
            invocations: 0,
            crashes: 0,
            state: SupervisorState::Starting,
        };

        loop {
            if self.running.signal_received() {
                tracing::info!("Stop requested, supervisor exiting");
                break;
            }

            summary.state = SupervisorState::Running;
            summary.invocations += 1;

            match AssertUnwindSafe(serve()).catch_unwind().await {
                Ok(Ok(())) => {
                    tracing::info!(invocations = summary.invocations, "Server returned cleanly");
                    break;
                }
                Ok(Err(e)) => {
                    tracing::error!(error = %e, restarts = summary.crashes + 1, "Server failed, restarting");
                }
                Err(panic) => {
                    tracing::error!(
                        error = panic_message(panic.as_ref()),
                        restarts = summary.crashes + 1,
                        "Server panicked, restarting"
                    );
                }
            }

            summary.state = SupervisorState::Crashed;
            summary.crashes += 1;
            metrics::record_restart();

            if self.restart_delay.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(self.restart_delay).await;
            }
        }

        summary.state = SupervisorState::Stopped;
        summary
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}
