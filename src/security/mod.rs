//! Security subsystem.
//!
//! # Responsibilities
//! - Hold the shared secret that authorizes every remote call
//!
//! # Design Decisions
//! - The gateway never checks the secret itself; each controller operation
//!   calls [`Secret::verify`] on its trailing `secret` argument
//! - Transport security (TLS) lives in `net::tls`

pub mod secret;

pub use secret::{probe_secret, Secret};
