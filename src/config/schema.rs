//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Port the controller has always listened on.
pub const DEFAULT_SERVER_PORT: u16 = 17443;

/// Root configuration for the controller gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Locations of the secret and TLS material.
    pub paths: PathsConfig,

    /// Listener configuration (bind address, port).
    pub listener: ListenerConfig,

    /// Startup readiness polling.
    pub readiness: ReadinessConfig,

    /// Duplicate instance handling.
    pub singleton: SingletonConfig,

    /// Serve loop supervision.
    pub supervisor: SupervisorConfig,

    /// Settings handed to the controller.
    pub controller: ControllerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Filesystem inputs. All are polled until present.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Shared secret key file.
    pub secret_file: PathBuf,

    /// Server certificate chain (PEM).
    pub cert_file: PathBuf,

    /// Server private key (PEM).
    pub key_file: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            secret_file: PathBuf::from("/etc/appscale/secret.key"),
            cert_file: PathBuf::from("/etc/appscale/certs/mycert.pem"),
            key_file: PathBuf::from("/etc/appscale/certs/mykey.pem"),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address, without port (e.g., "0.0.0.0").
    pub bind_address: String,

    /// Listening port.
    pub port: u16,

    /// Largest accepted request body. Uploads carry whole app archives.
    pub max_body_bytes: usize,

    /// Seconds in-flight calls may run after a stop request.
    pub shutdown_grace_secs: u64,
}

impl ListenerConfig {
    /// `bind_address:port` as a string suitable for parsing.
    pub fn socket_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: DEFAULT_SERVER_PORT,
            max_body_bytes: 64 * 1024 * 1024,
            shutdown_grace_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReadinessConfig {
    /// Seconds between probes of the secret and certificate files.
    pub poll_interval_secs: u64,
}

impl ReadinessConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SingletonConfig {
    /// Terminate other running instances before binding.
    pub enabled: bool,

    /// Pause after terminating instances so the port is released.
    pub settle_secs: u64,

    /// Program name to match. Defaults to the running executable's name.
    pub process_name: Option<String>,
}

impl SingletonConfig {
    pub fn settle(&self) -> Duration {
        Duration::from_secs(self.settle_secs)
    }
}

impl Default for SingletonConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            settle_secs: 3,
            process_name: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Delay before restarting a crashed serve loop. Zero restarts at once.
    pub restart_delay_ms: u64,
}

impl SupervisorConfig {
    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Seconds between iterations of the controller's main loop.
    pub duty_cycle_secs: u64,
}

impl ControllerConfig {
    pub fn duty_cycle(&self) -> Duration {
        Duration::from_secs(self.duty_cycle_secs)
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            duty_cycle_secs: 20,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
