//! Controller Gateway Library
//!
//! Bootstrap and supervision shell that exposes a node controller over an
//! authenticated JSON-RPC endpoint on TLS.

pub mod config;
pub mod controller;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod rpc;
pub mod security;

pub use config::schema::ServiceConfig;
pub use controller::{Controller, ControllerContext, ControllerError, NodeController};
pub use lifecycle::startup::{run, Service, StartupError};
pub use rpc::AuthorizedRpcGateway;
pub use security::Secret;
