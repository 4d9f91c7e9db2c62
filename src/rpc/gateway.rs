//! HTTPS front-end that forwards registered calls to the controller.
//!
//! # Responsibilities
//! - Build the Axum router for the single `POST /` JSON-RPC endpoint
//! - Resolve method names through the [`MethodTable`]
//! - Run controller calls on the blocking pool and map failures to faults
//! - Bind the TLS listener for one serve attempt at a time
//!
//! No access log layer is installed. The gateway never compares secrets
//! itself: malformed calls are put through `Controller::authorize` so an
//! unauthenticated caller only ever sees the authorization fault.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    routing::post,
    Json, Router,
};
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use thiserror::Error;

use crate::controller::Controller;
use crate::lifecycle::shutdown::StopServer;
use crate::lifecycle::state::RunningState;
use crate::observability::metrics;
use crate::rpc::error::CallError;
use crate::rpc::methods::{claimed_secret, reject, MethodTable};
use crate::rpc::protocol::{RpcRequest, RpcResponse};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Listener settings for the gateway.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub addr: SocketAddr,
    pub max_body_bytes: usize,
    /// How long in-flight calls may finish after a stop.
    pub shutdown_grace: Duration,
}

/// State shared with every request handler.
pub struct GatewayState<C> {
    controller: Arc<C>,
    table: Arc<MethodTable<C>>,
}

impl<C> Clone for GatewayState<C> {
    fn clone(&self) -> Self {
        Self {
            controller: self.controller.clone(),
            table: self.table.clone(),
        }
    }
}

/// Stop handle for whichever serve attempt is current.
///
/// The first serve attempt uses the handle created here, so callers can
/// wait on [`GatewayHandle::listening`] before the server starts. Later
/// attempts install a fresh one.
#[derive(Clone)]
pub struct GatewayHandle {
    current: Arc<ArcSwap<Handle>>,
    fresh: Arc<AtomicBool>,
    grace: Duration,
}

impl GatewayHandle {
    fn new(grace: Duration) -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(Handle::new())),
            fresh: Arc::new(AtomicBool::new(true)),
            grace,
        }
    }

    fn next(&self) -> Handle {
        if self.fresh.swap(false, Ordering::SeqCst) {
            return (**self.current.load()).clone();
        }
        let handle = Handle::new();
        self.current.store(Arc::new(handle.clone()));
        handle
    }

    /// Address the current serve attempt bound, once it is listening.
    pub async fn listening(&self) -> Option<SocketAddr> {
        let handle = self.current.load_full();
        handle.listening().await
    }
}

impl StopServer for GatewayHandle {
    fn stop(&self) {
        tracing::info!(grace_secs = self.grace.as_secs(), "Stopping RPC listener");
        self.current.load().graceful_shutdown(Some(self.grace));
    }
}

/// Remote front-end over one controller instance.
pub struct AuthorizedRpcGateway<C> {
    state: GatewayState<C>,
    settings: GatewaySettings,
    tls: RustlsConfig,
    running: Arc<RunningState>,
    handle: GatewayHandle,
}

impl<C: Controller> AuthorizedRpcGateway<C> {
    pub fn new(
        controller: Arc<C>,
        settings: GatewaySettings,
        tls: RustlsConfig,
        running: Arc<RunningState>,
    ) -> Self {
        let table = Arc::new(MethodTable::new());
        tracing::info!(methods = table.len(), "RPC methods registered");

        let handle = GatewayHandle::new(settings.shutdown_grace);
        Self {
            state: GatewayState { controller, table },
            settings,
            tls,
            running,
            handle,
        }
    }

    /// Roles of the wrapped controller.
    pub fn job(&self) -> String {
        self.state.controller.job()
    }

    pub fn controller(&self) -> &Arc<C> {
        &self.state.controller
    }

    pub fn handle(&self) -> GatewayHandle {
        self.handle.clone()
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone(), self.settings.max_body_bytes)
    }

    /// Bind and serve until stopped or failed.
    ///
    /// Returns `Ok` only after a stop request. A stop that arrives while no
    /// attempt is running is honoured by returning immediately.
    pub async fn serve(&self) -> Result<(), GatewayError> {
        let handle = self.handle.next();
        if self.running.signal_received() {
            tracing::info!("Stop already requested, not binding");
            return Ok(());
        }

        tracing::info!(address = %self.settings.addr, "RPC server starting");
        axum_server::bind_rustls(self.settings.addr, self.tls.clone())
            .handle(handle)
            .serve(self.router().into_make_service())
            .await?;

        tracing::info!("RPC server stopped");
        Ok(())
    }
}

/// Build the router around a method table.
pub fn build_router<C: Controller>(state: GatewayState<C>, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/", post(dispatch::<C>))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}

impl<C: Controller> GatewayState<C> {
    pub fn new(controller: Arc<C>, table: MethodTable<C>) -> Self {
        Self {
            controller,
            table: Arc::new(table),
        }
    }
}

async fn dispatch<C: Controller>(State(state): State<GatewayState<C>>, body: Bytes) -> Json<RpcResponse> {
    let request: RpcRequest = match serde_json::from_slice(&body) {
        Ok(req) => req,
        Err(e) => {
            let err = CallError::Parse(e.to_string());
            metrics::record_call("unknown", err.outcome());
            return Json(RpcResponse::fault(None, &err));
        }
    };

    let id = request.id.clone();
    match call(&state, request).await {
        Ok((method, result)) => {
            metrics::record_call(method, "ok");
            Json(RpcResponse::success(id, result))
        }
        Err((method, err)) => {
            tracing::debug!(method, code = err.code(), error = %err, "RPC call failed");
            metrics::record_call(method, err.outcome());
            Json(RpcResponse::fault(id, &err))
        }
    }
}

type CallResult = Result<(&'static str, serde_json::Value), (&'static str, CallError)>;

async fn call<C: Controller>(state: &GatewayState<C>, request: RpcRequest) -> CallResult {
    if matches!(request.jsonrpc.as_deref(), Some(v) if v != "2.0") {
        return Err(("unknown", CallError::InvalidRequest("unsupported jsonrpc version".into())));
    }

    let Some(reg) = state.table.get(&request.method) else {
        return Err(("unknown", CallError::MethodNotFound(request.method)));
    };
    let method = reg.name;

    let claimed = claimed_secret(request.params.as_ref()).map(str::to_owned);
    let args = match reg.positional(request.params) {
        Ok(args) => args,
        Err(e) => {
            let secret = claimed.as_deref().unwrap_or_default();
            return Err((method, reject(state.controller.as_ref(), secret, e)));
        }
    };
    let handler = reg.handler;
    let controller = state.controller.clone();

    tracing::debug!(method, "Dispatching RPC call");
    match tokio::task::spawn_blocking(move || handler(&controller, args)).await {
        Ok(Ok(value)) => Ok((method, value)),
        Ok(Err(e)) => Err((method, e)),
        Err(join) => {
            tracing::error!(method, error = %join, "Controller call panicked");
            Err((method, CallError::Internal(format!("{} did not complete", method))))
        }
    }
}
