//! Remote procedure call subsystem.
//!
//! # Data Flow
//! ```text
//! HTTPS POST /  (axum-server, rustls, no client auth)
//!     → gateway.rs   parse JSON-RPC request
//!     → methods.rs   resolve name in the allow-list, order params
//!     → Controller   operation runs on the blocking pool, checks secret
//!     → protocol.rs  result or fault back to the caller
//! ```
//!
//! # Design Decisions
//! - The allow-list is a declarative table built once; unknown names
//!   never reach the controller
//! - Authorization is the controller's job, per operation
//! - A failed call is a fault for that caller only

pub mod error;
pub mod gateway;
pub mod methods;
pub mod protocol;

pub use error::CallError;
pub use gateway::{AuthorizedRpcGateway, GatewayError, GatewayHandle, GatewaySettings, GatewayState};
pub use methods::{MethodRegistration, MethodTable};
