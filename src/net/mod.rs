//! Network layer.
//!
//! # Responsibilities
//! - Load and validate the server certificate and key
//! - Produce the rustls configuration for the listener
//!
//! Binding and accepting are owned by `axum_server` inside the RPC gateway.

pub mod tls;

pub use tls::{probe_certificates, CertificateMaterial, TlsError};
