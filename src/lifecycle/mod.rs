//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     readiness.rs (secret, certs) → singleton.rs → build components
//!
//! Serving (supervisor.rs):
//!     serve → crash → restart ... until stopped
//!
//! Shutdown (signals.rs → shutdown.rs):
//!     SIGTERM → set stop flag → stop listener → stop controller
//! ```
//!
//! # Design Decisions
//! - Readiness gates have no timeout
//! - Only the supervisor decides when serving is over
//! - The stop flag is set before the listener stops, never after

pub mod readiness;
pub mod shutdown;
pub mod signals;
pub mod singleton;
pub mod startup;
pub mod state;
pub mod supervisor;

pub use readiness::ReadinessGate;
pub use shutdown::{ControllerShutdown, ShutdownCoordinator, StopServer};
pub use singleton::{ProcessIdentity, SingletonGuard};
pub use startup::{Service, StartupError};
pub use state::RunningState;
pub use supervisor::{RunSummary, Supervisor, SupervisorState};
