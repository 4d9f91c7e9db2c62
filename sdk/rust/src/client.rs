use std::sync::atomic::{AtomicI64, Ordering};

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error object returned by the gateway for a failed call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Fault {
    pub code: i32,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("call fault {}: {}", .0.code, .0.message)]
    Fault(Fault),

    #[error("malformed response: {0}")]
    Protocol(String),
}

impl ClientError {
    /// The fault code, if the gateway answered with one.
    pub fn fault_code(&self) -> Option<i32> {
        match self {
            ClientError::Fault(f) => Some(f.code),
            _ => None,
        }
    }
}

#[derive(Serialize)]
struct Request<'a> {
    jsonrpc: &'static str,
    id: i64,
    method: &'a str,
    params: Value,
}

#[derive(Deserialize)]
struct Response {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<Fault>,
}

pub struct ControllerClient {
    client: Client,
    url: String,
    next_id: AtomicI64,
}

impl ControllerClient {
    /// Create a client that verifies the gateway's certificate.
    pub fn new(url: &str) -> Result<Self, ClientError> {
        Self::with_options(url, false)
    }

    /// Create a client, optionally skipping server certificate verification.
    ///
    /// Nodes usually serve self-signed certificates, so management tools
    /// turn verification off and rely on the shared secret instead.
    pub fn with_options(url: &str, accept_invalid_certs: bool) -> Result<Self, ClientError> {
        let client = Client::builder()
            .danger_accept_invalid_certs(accept_invalid_certs)
            .no_proxy()
            .build()?;

        Ok(Self {
            client,
            url: url.trim_end_matches('/').to_string(),
            next_id: AtomicI64::new(1),
        })
    }

    /// Call `method` with positional parameters.
    pub async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, ClientError> {
        self.send(method, Value::Array(params)).await
    }

    /// Call `method` with parameters keyed by name.
    pub async fn call_named(
        &self,
        method: &str,
        params: serde_json::Map<String, Value>,
    ) -> Result<Value, ClientError> {
        self.send(method, Value::Object(params)).await
    }

    async fn send(&self, method: &str, params: Value) -> Result<Value, ClientError> {
        let req = Request {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let resp = self
            .client
            .post(format!("{}/", self.url))
            .json(&req)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;

        let body: Response = serde_json::from_str(&text).map_err(|e| {
            ClientError::Protocol(format!("status {}: {} ({})", status, e, text))
        })?;

        match body.error {
            Some(fault) => Err(ClientError::Fault(fault)),
            None => Ok(body.result),
        }
    }
}
