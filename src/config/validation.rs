//! Configuration validation.
//!
//! Serde handles syntax; this checks values that parse but cannot work.
//! Every problem is reported, not just the first.

use std::net::IpAddr;

use thiserror::Error;

use crate::config::schema::ServiceConfig;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address {0:?} is not an IP address")]
    BindAddress(String),

    #[error("listener.port must be non-zero")]
    Port,

    #[error("listener.max_body_bytes must be non-zero")]
    BodyLimit,

    #[error("readiness.poll_interval_secs must be at least 1")]
    PollInterval,

    #[error("controller.duty_cycle_secs must be at least 1")]
    DutyCycle,

    #[error("paths.{0} must not be empty")]
    EmptyPath(&'static str),

    #[error("singleton.process_name must not be empty when set")]
    ProcessName,

    #[error("observability.metrics_address {0:?} is not a socket address")]
    MetricsAddress(String),
}

/// Check a parsed configuration. Returns every error found.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<IpAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }
    if config.listener.port == 0 {
        errors.push(ValidationError::Port);
    }
    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError::BodyLimit);
    }
    if config.readiness.poll_interval_secs == 0 {
        errors.push(ValidationError::PollInterval);
    }
    if config.controller.duty_cycle_secs == 0 {
        errors.push(ValidationError::DutyCycle);
    }

    for (name, path) in [
        ("secret_file", &config.paths.secret_file),
        ("cert_file", &config.paths.cert_file),
        ("key_file", &config.paths.key_file),
    ] {
        if path.as_os_str().is_empty() {
            errors.push(ValidationError::EmptyPath(name));
        }
    }

    if matches!(config.singleton.process_name.as_deref(), Some(name) if name.trim().is_empty()) {
        errors.push(ValidationError::ProcessName);
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<std::net::SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
