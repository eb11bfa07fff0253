//! HTTP server setup and the HTTP adapter.
//!
//! # Responsibilities
//! - Create Axum Router with the socket endpoint and the dispatch fallback
//! - Wire up middleware (tracing, limits, request ID, security headers)
//! - Serve static mounts, then registered routes
//! - Authorize, build the Environment, invoke, render
//! - Apply config reloads to the access policy
//! - Drain socket sessions on shutdown

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Method, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::GatewayConfig;
use crate::dispatch::{
    invoke, DiskFileSource, Environment, FileError, FileSource, Forwarder, Transport,
};
use crate::http::middleware::{Extensions, MiddlewareRequest};
use crate::http::{request, response, websocket};
use crate::lifecycle::ShutdownSignal;
use crate::net::ConnectionTracker;
use crate::observability::metrics;
use crate::routing::{Registry, StaticMount};
use crate::security::{AccessPolicy, AuthProvider, Authorizer, Decision, PolicyStore, Presented};

/// Errors that stop the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub authorizer: Authorizer,
    pub forwarder: Forwarder,
    pub files: Arc<dyn FileSource>,
    pub connections: ConnectionTracker,
    pub config: Arc<GatewayConfig>,
}

/// The gateway: both transports over one registry.
pub struct GatewayServer {
    router: Router,
    state: AppState,
}

impl GatewayServer {
    /// Create a server. The registry is frozen from here on.
    pub fn new(config: GatewayConfig, registry: Registry, provider: Arc<dyn AuthProvider>) -> Self {
        Self::with_file_source(config, registry, provider, Arc::new(DiskFileSource))
    }

    pub fn with_file_source(
        config: GatewayConfig,
        registry: Registry,
        provider: Arc<dyn AuthProvider>,
        files: Arc<dyn FileSource>,
    ) -> Self {
        let policy = Arc::new(PolicyStore::new(AccessPolicy::from_config(&config)));
        let state = AppState {
            registry: Arc::new(registry),
            authorizer: Authorizer::new(provider, policy),
            forwarder: Forwarder::new(Duration::from_secs(config.timeouts.forward_secs)),
            files,
            connections: ConnectionTracker::new(),
            config: Arc::new(config),
        };
        let router = Self::build_router(&state);
        Self { router, state }
    }

    /// Live access policy, for runtime role changes.
    pub fn policy(&self) -> Arc<PolicyStore> {
        Arc::clone(self.state.authorizer.policy())
    }

    pub fn connections(&self) -> ConnectionTracker {
        self.state.connections.clone()
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: &AppState) -> Router {
        let config = &state.config;
        let mut router: Router<AppState> = Router::new();
        if config.websocket.enabled {
            router = router.route(&config.websocket.path, get(websocket::websocket_handler));
        }
        let mut router = router
            .fallback(dispatch_handler)
            .with_state(state.clone())
            .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)));

        if config.security.enable_headers {
            router = router
                .layer(SetResponseHeaderLayer::if_not_present(
                    header::X_CONTENT_TYPE_OPTIONS,
                    HeaderValue::from_static("nosniff"),
                ))
                .layer(SetResponseHeaderLayer::if_not_present(
                    header::X_FRAME_OPTIONS,
                    HeaderValue::from_static("DENY"),
                ));
        }

        router
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Run the server until `shutdown` fires.
    ///
    /// Configs received on `config_updates` replace the access policy.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<GatewayConfig>,
        mut shutdown: ShutdownSignal,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            routes = self.state.registry.route_count(),
            topics = self.state.registry.topic_count(),
            websocket = self.state.config.websocket.enabled,
            "Gateway server starting"
        );

        let policy = Arc::clone(self.state.authorizer.policy());
        let reloader = tokio::spawn(async move {
            while let Some(config) = config_updates.recv().await {
                policy.replace(AccessPolicy::from_config(&config));
                tracing::info!(
                    permissions = config.permissions.len(),
                    anonymous = config.auth.anonymous.len(),
                    "Access policy reloaded"
                );
            }
        });

        let connections = self.state.connections.clone();
        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                shutdown.recv().await;
                tracing::info!(
                    sockets = connections.active_count(),
                    "Shutdown signal received, draining"
                );
                connections.begin_drain();
            })
            .await?;

        reloader.abort();
        tracing::info!("Gateway server stopped");
        Ok(())
    }
}

/// Fallback handler: statics, then routes.
async fn dispatch_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let request_id = request::request_id(request.headers());
    let (parts, body) = request.into_parts();
    let path = parts.uri.path().to_string();

    if parts.method == Method::GET || parts.method == Method::HEAD {
        if let Some((mount, relative)) = state.registry.match_static(&path) {
            if let Some(response) = serve_static(&state, mount, &relative).await {
                metrics::record_dispatch(Transport::Http.as_str(), "static", start);
                return response;
            }
        }
    }

    let Some(matched) = state.registry.match_route(&parts.method, &path) else {
        tracing::debug!(request_id = %request_id, method = %parts.method, path = %path, "No route matched");
        metrics::record_dispatch(Transport::Http.as_str(), "not_found", start);
        return response::not_found();
    };
    let entry = matched.entry;
    let params = matched.params;

    let middleware = state.registry.middleware();
    let extensions = if middleware.is_empty() {
        Extensions::new()
    } else {
        middleware.apply(&MiddlewareRequest {
            method: &parts.method,
            path: &path,
            headers: &parts.headers,
            preparams: state.config.http.parse_ahead.then_some(&params),
        })
    };

    let presented = Presented::from_headers(&parts.headers);
    let verdict = state.authorizer.check(&entry.action_id, &path, &presented).await;
    match verdict.decision {
        Decision::Allowed => {}
        Decision::Denied => {
            tracing::info!(request_id = %request_id, action = %entry.action_id, "Request denied");
            metrics::record_dispatch(Transport::Http.as_str(), "denied", start);
            return response::denied();
        }
        Decision::Unauthenticated => {
            tracing::info!(request_id = %request_id, action = %entry.action_id, "Request unauthenticated");
            metrics::record_dispatch(Transport::Http.as_str(), "unauthenticated", start);
            return response::unauthenticated(&state.config.auth.realm);
        }
    }

    let body = match axum::body::to_bytes(body, state.config.security.max_body_size).await {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Failed to read request body");
            metrics::record_dispatch(Transport::Http.as_str(), "bad_request", start);
            return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
        }
    };
    let data = match request::merge_data(&params, parts.uri.query(), &parts.headers, &body) {
        Ok(data) => data,
        Err(e) => {
            tracing::debug!(request_id = %request_id, error = %e, "Malformed request body");
            metrics::record_dispatch(Transport::Http.as_str(), "bad_request", start);
            return (StatusCode::BAD_REQUEST, "Malformed request body").into_response();
        }
    };

    let mut env = Environment::new(Transport::Http, entry.action_id.clone(), entry.topic.clone());
    env.url = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| path.clone());
    env.path = path;
    env.method = parts.method;
    env.data = data;
    env.params = params;
    env.extensions = extensions;
    env.headers = parts.headers;
    env.identity = verdict.identity;
    env.request_id = request_id.clone();
    env.body = body;
    env.forwarder = Some(state.forwarder.clone());

    tracing::debug!(request_id = %request_id, action = %entry.action_id, "Dispatching request");

    match invoke(&entry.handler, env).await {
        Ok(outcome) => {
            metrics::record_dispatch(Transport::Http.as_str(), outcome.kind(), start);
            response::render(outcome)
        }
        Err(fault) => {
            metrics::record_dispatch(Transport::Http.as_str(), "fault", start);
            response::fault(&fault)
        }
    }
}

/// `None` lets the request fall through to the route table.
async fn serve_static(state: &AppState, mount: &StaticMount, relative: &str) -> Option<Response> {
    match state.files.open(&mount.root, relative).await {
        Ok(stream) => {
            let content_type = content_type_for(Path::new(relative));
            Some(
                (
                    [(header::CONTENT_TYPE, content_type)],
                    Body::from_stream(stream),
                )
                    .into_response(),
            )
        }
        Err(FileError::NotFound) => None,
        Err(FileError::Forbidden) => Some(response::not_found()),
        Err(FileError::Io(e)) => {
            tracing::error!(mount = %mount.name, path = %relative, error = %e, "Static file read failed");
            Some(response::static_read_failed(relative))
        }
    }
}

fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html") | Some("htm") => "text/html; charset=utf-8",
        Some("css") => "text/css",
        Some("js") => "text/javascript",
        Some("json") => "application/json",
        Some("txt") => "text/plain; charset=utf-8",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("ico") => "image/x-icon",
        _ => "application/octet-stream",
    }
}
