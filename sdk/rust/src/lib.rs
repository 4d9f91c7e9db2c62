//! Client for the controller gateway's JSON-RPC surface.

mod client;

pub use client::{ClientError, ControllerClient, Fault};
