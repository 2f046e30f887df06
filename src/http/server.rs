//! HTTP server setup and lifecycle.
//!
//! # Responsibilities
//! - Create Axum Router with the service handlers
//! - Wire up middleware (request ID, tracing, timeouts)
//! - Bind the configured address and port
//! - Drain in-flight requests on shutdown within a grace period
//!
//! # Design Decisions
//! - `start` blocks for the lifetime of the listener
//! - A listener closed by `shutdown` is reported as `ServerError::Closed`,
//!   never as a failure
//! - `shutdown` is idempotent and may run before `start`

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::{Mode, Profile};
use crate::http::request::{propagate_request_id, request_id_of, set_request_id};
use crate::store::Store;

/// Time in-flight requests get to finish once shutdown starts.
pub const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(10);

/// Upper bound for a single request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Error type for server operations.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listener was closed because shutdown was requested.
    #[error("server closed")]
    Closed,

    #[error("server already started")]
    AlreadyStarted,

    #[error("invalid listen address {0:?}")]
    Address(String),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("shutdown did not complete within {0:?}")]
    ShutdownTimeout(Duration),

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// True for the outcome of an orderly shutdown.
    pub fn is_closed(&self) -> bool {
        matches!(self, ServerError::Closed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ServerState {
    Idle,
    Serving,
    Draining,
    Stopped,
}

/// Application state injected into handlers.
#[derive(Clone)]
struct AppState {
    profile: Arc<Profile>,
    store: Arc<Store>,
}

/// HTTP server of a memos instance.
pub struct Server {
    router: Router,
    bind_addr: String,
    grace_period: Duration,
    state: watch::Sender<ServerState>,
    local_addr: OnceLock<SocketAddr>,
}

impl Server {
    /// Create a server for the profile's address and port.
    pub fn new(
        scope: &CancellationToken,
        profile: Arc<Profile>,
        store: Arc<Store>,
    ) -> Result<Self, ServerError> {
        if scope.is_cancelled() {
            return Err(ServerError::Closed);
        }
        if profile.addr.is_empty() {
            return Err(ServerError::Address(profile.addr.clone()));
        }

        let bind_addr = bind_address(&profile.addr, profile.port);
        let router = Self::build_router(AppState { profile, store });
        let (state, _) = watch::channel(ServerState::Idle);

        Ok(Self {
            router,
            bind_addr,
            grace_period: SHUTDOWN_GRACE_PERIOD,
            state,
            local_addr: OnceLock::new(),
        })
    }

    /// Override the drain period used by [`Server::shutdown`].
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Mount additional routes next to the built-in ones. Call before `start`.
    pub fn with_routes(mut self, routes: Router) -> Self {
        self.router = self.router.merge(routes);
        self
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/healthz", get(healthz))
            .route("/api/v1/workspace/profile", get(workspace_profile))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(set_request_id())
                    .layer(propagate_request_id())
                    .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                        tracing::info_span!(
                            "request",
                            method = %request.method(),
                            path = %request.uri().path(),
                            request_id = %request_id_of(request),
                        )
                    }))
                    .layer(TimeoutLayer::new(REQUEST_TIMEOUT)),
            )
    }

    /// Address the server binds, `addr:port`.
    pub fn bind_addr(&self) -> &str {
        &self.bind_addr
    }

    /// Bound address once the listener is up.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.get().copied()
    }

    /// Bind and serve until shutdown is requested or the scope is cancelled.
    ///
    /// Returns [`ServerError::Closed`] after an orderly stop.
    pub async fn start(&self, scope: &CancellationToken) -> Result<(), ServerError> {
        let mut began = false;
        self.state.send_if_modified(|state| {
            if *state == ServerState::Idle {
                *state = ServerState::Serving;
                began = true;
                true
            } else {
                false
            }
        });
        if !began {
            let current = *self.state.borrow();
            return match current {
                ServerState::Serving => Err(ServerError::AlreadyStarted),
                _ => Err(ServerError::Closed),
            };
        }

        let result = self.serve(scope).await;
        self.state.send_replace(ServerState::Stopped);
        result
    }

    async fn serve(&self, scope: &CancellationToken) -> Result<(), ServerError> {
        let listener = TcpListener::bind(&self.bind_addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: self.bind_addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;
        let _ = self.local_addr.set(local_addr);
        tracing::info!(address = %local_addr, "HTTP server listening");

        let drain = scope.child_token();
        let app = self.router.clone().into_make_service();
        let serve = axum::serve(listener, app)
            .with_graceful_shutdown(drain.clone().cancelled_owned())
            .into_future();
        tokio::pin!(serve);

        let mut state = self.state.subscribe();
        tokio::select! {
            result = &mut serve => {
                result?;
                return Err(ServerError::Closed);
            }
            () = wait_for_drain(&mut state) => drain.cancel(),
            () = drain.cancelled() => {}
        }

        tracing::info!(grace_period = ?self.grace_period, "HTTP server draining");
        match tokio::time::timeout(self.grace_period, &mut serve).await {
            Ok(result) => result?,
            Err(_) => tracing::warn!(
                grace_period = ?self.grace_period,
                "Grace period elapsed, dropping remaining connections"
            ),
        }

        tracing::info!("HTTP server stopped");
        Err(ServerError::Closed)
    }

    /// Stop accepting requests and wait for in-flight ones to drain.
    ///
    /// Idempotent. Returns at once if the server never started.
    pub async fn shutdown(&self, scope: &CancellationToken) -> Result<(), ServerError> {
        self.state.send_if_modified(|state| match *state {
            ServerState::Idle => {
                *state = ServerState::Stopped;
                true
            }
            ServerState::Serving => {
                *state = ServerState::Draining;
                true
            }
            ServerState::Draining | ServerState::Stopped => false,
        });

        let mut state = self.state.subscribe();
        let limit = self.grace_period + Duration::from_secs(1);
        tokio::select! {
            result = tokio::time::timeout(limit, wait_for_stop(&mut state)) => {
                if result.is_err() {
                    return Err(ServerError::ShutdownTimeout(limit));
                }
            }
            () = scope.cancelled() => {}
        }

        tracing::debug!("HTTP server shut down");
        Ok(())
    }
}

fn bind_address(addr: &str, port: u16) -> String {
    if addr.contains(':') && !addr.starts_with('[') {
        format!("[{addr}]:{port}")
    } else {
        format!("{addr}:{port}")
    }
}

async fn wait_for_drain(state: &mut watch::Receiver<ServerState>) {
    let _ = state.wait_for(|s| *s != ServerState::Serving).await;
}

async fn wait_for_stop(state: &mut watch::Receiver<ServerState>) {
    let _ = state.wait_for(|s| *s == ServerState::Stopped).await;
}

/// Liveness and database reachability.
async fn healthz(State(state): State<AppState>) -> Response {
    match state.store.ping().await {
        Ok(()) => (StatusCode::OK, "Service ready.").into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "Database unavailable.").into_response()
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WorkspaceProfile {
    version: String,
    mode: Mode,
    instance_url: String,
}

async fn workspace_profile(State(state): State<AppState>) -> Json<WorkspaceProfile> {
    Json(WorkspaceProfile {
        version: state.profile.version.clone(),
        mode: state.profile.mode,
        instance_url: state.profile.instance_url.clone(),
    })
}
