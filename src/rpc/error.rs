//! Call-level faults.

use thiserror::Error;

use crate::controller::ControllerError;

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;
pub const CONTROLLER_ERROR: i32 = -32000;
pub const UNAUTHORIZED: i32 = -32001;

/// Why a single call failed. Never affects other callers or the server.
#[derive(Debug, Error)]
pub enum CallError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("method not found: {0}")]
    MethodNotFound(String),

    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error(transparent)]
    Controller(#[from] ControllerError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CallError {
    pub fn code(&self) -> i32 {
        match self {
            CallError::Parse(_) => PARSE_ERROR,
            CallError::InvalidRequest(_) => INVALID_REQUEST,
            CallError::MethodNotFound(_) => METHOD_NOT_FOUND,
            CallError::InvalidParams(_) => INVALID_PARAMS,
            CallError::Controller(ControllerError::Unauthorized) => UNAUTHORIZED,
            CallError::Controller(_) => CONTROLLER_ERROR,
            CallError::Internal(_) => INTERNAL_ERROR,
        }
    }

    /// Short label for metrics.
    pub fn outcome(&self) -> &'static str {
        match self {
            CallError::Parse(_) | CallError::InvalidRequest(_) => "malformed",
            CallError::MethodNotFound(_) => "not_found",
            CallError::InvalidParams(_) => "invalid_params",
            CallError::Controller(ControllerError::Unauthorized) => "unauthorized",
            CallError::Controller(_) => "controller_error",
            CallError::Internal(_) => "internal",
        }
    }
}
