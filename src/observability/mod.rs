//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! lifecycle, rpc, controller
//!     → tracing events → logging.rs (fmt layer, env filter)
//!     → counters/gauges → metrics.rs (Prometheus scrape, optional)
//! ```

pub mod logging;
pub mod metrics;
