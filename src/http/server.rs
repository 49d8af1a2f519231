//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the proxy handler
//! - Wire up middleware (tracing, request ID)
//! - Serve the gateway listener, with TLS when configured
//! - Resolve tenant, match route and forward each request
//! - Apply configuration reloads to the live snapshot

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use rustls::ServerConfig;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::EdgeConfig;
use crate::http::request::{request_host, RequestContext};
use crate::http::response::ForwardError;
use crate::http::state::{AppState, EdgeSnapshot};
use crate::lifecycle::shutdown::drain_on_shutdown;
use crate::lifecycle::startup::EdgeError;
use crate::net::tls::load_server_config;
use crate::observability::metrics;

/// The edge gateway: tenant resolution, routing and forwarding.
pub struct EdgeServer {
    state: AppState,
    tls: Option<Arc<ServerConfig>>,
    shutdown_grace: Duration,
}

impl EdgeServer {
    /// Compile the configuration and load TLS material.
    pub fn new(config: EdgeConfig) -> Result<Self, EdgeError> {
        let snapshot = EdgeSnapshot::from_config(&config)?;
        let tls = config.tls.as_ref().map(load_server_config).transpose()?;
        let scheme = if tls.is_some() { "https" } else { "http" };

        tracing::info!(
            routes = snapshot.routes.len(),
            hosts = snapshot.resolver.len(),
            default_tenant = %snapshot.resolver.default_tenant(),
            tls = tls.is_some(),
            "Edge configuration compiled"
        );

        Ok(Self {
            state: AppState::new(snapshot, scheme),
            tls,
            shutdown_grace: Duration::from_secs(config.listener.shutdown_grace_secs),
        })
    }

    /// The Axum router with all middleware layers.
    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Serve until `shutdown` fires, applying `config_updates` as they arrive.
    pub async fn run(
        self,
        listener: TcpListener,
        config_updates: mpsc::UnboundedReceiver<EdgeConfig>,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), EdgeError> {
        let addr = listener.local_addr()?;
        let app = self
            .router()
            .into_make_service_with_connect_info::<SocketAddr>();

        let handle = Handle::new();
        drain_on_shutdown(shutdown, handle.clone(), self.shutdown_grace);

        let listener = listener.into_std()?;
        match self.tls {
            Some(server_config) => {
                let rustls = RustlsConfig::from_config(server_config);
                tokio::spawn(apply_updates(
                    self.state.clone(),
                    config_updates,
                    Some(rustls.clone()),
                ));

                tracing::info!(address = %addr, "HTTPS gateway starting");
                axum_server::tls_rustls::from_tcp_rustls(listener, rustls)
                    .handle(handle)
                    .serve(app)
                    .await?;
            }
            None => {
                tokio::spawn(apply_updates(self.state.clone(), config_updates, None));

                tracing::info!(address = %addr, "HTTP gateway starting");
                axum_server::from_tcp(listener)
                    .handle(handle)
                    .serve(app)
                    .await?;
            }
        }

        tracing::info!("Gateway stopped");
        Ok(())
    }
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/{*path}", any(proxy_handler))
        .route("/", any(proxy_handler))
        .with_state(state)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

async fn apply_updates(
    state: AppState,
    mut updates: mpsc::UnboundedReceiver<EdgeConfig>,
    tls: Option<RustlsConfig>,
) {
    while let Some(config) = updates.recv().await {
        match reload(&state, &config, tls.as_ref()) {
            Ok(()) => {
                metrics::record_config_reload(true);
                tracing::info!(
                    routes = config.routes.len(),
                    hosts = config.hosts.len(),
                    "Configuration reloaded"
                );
            }
            Err(e) => {
                metrics::record_config_reload(false);
                tracing::error!(error = %e, "Config reload rejected, keeping current snapshot");
            }
        }
    }
}

/// Build everything first; swap only when all of it succeeded.
fn reload(state: &AppState, config: &EdgeConfig, tls: Option<&RustlsConfig>) -> Result<(), EdgeError> {
    let snapshot = EdgeSnapshot::from_config(config)?;
    match (tls, &config.tls) {
        (Some(rustls), Some(tls_config)) => rustls.reload_from_config(load_server_config(tls_config)?),
        (None, None) => {}
        _ => tracing::warn!("TLS cannot be enabled or disabled by a reload; restart to apply"),
    }
    state.swap(snapshot);
    Ok(())
}

/// Main proxy handler.
/// Resolves the tenant, matches the route and forwards the request.
async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(remote_addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let start = Instant::now();
    let snapshot = state.snapshot.load_full();

    let host = request_host(&request);
    let resolution = snapshot.resolver.resolve(host.as_deref());
    if resolution.is_fallback() {
        if snapshot.strict_hosts {
            let err = ForwardError::MisdirectedHost {
                host: host.unwrap_or_default(),
            };
            tracing::warn!(error = %err, "Rejecting unknown host");
            metrics::record_request("none", "none", resolution.tenant().as_str(), err.status().as_u16(), start);
            return err.into_response();
        }
        tracing::debug!(host = ?host, tenant = %resolution.tenant(), "Unknown host, using default tenant");
    }

    let ctx = RequestContext::new(&request, resolution.into_tenant(), remote_addr, state.scheme);
    let path = ctx.original_path.clone();

    let Some(matched) = snapshot.routes.match_path(&path) else {
        let err = ForwardError::NoRoute { path: path.clone() };
        tracing::warn!(request_id = %ctx.request_id, tenant = %ctx.tenant, path = %path, "No route matched");
        metrics::record_request("none", "none", ctx.tenant.as_str(), err.status().as_u16(), start);
        return err.into_response();
    };
    let rule = matched.rule;
    let ctx = ctx.with_rewritten_path(matched.is_rewritten().then(|| matched.path.into_owned()));

    let response = match snapshot
        .forwarder
        .forward(&ctx, request, &rule.upstream, &rule.policy)
        .await
    {
        Ok(response) => response,
        Err(err) => {
            if err.is_upstream_failure() {
                metrics::record_upstream_error(rule.upstream.name(), err.kind());
            }
            tracing::warn!(
                request_id = %ctx.request_id,
                tenant = %ctx.tenant,
                route = %rule.name,
                upstream = %rule.upstream.name(),
                status = err.status().as_u16(),
                error = %err,
                "Forwarding failed"
            );
            err.into_response()
        }
    };

    let status = response.status().as_u16();
    metrics::record_request(&rule.name, rule.upstream.name(), ctx.tenant.as_str(), status, start);
    tracing::debug!(
        request_id = %ctx.request_id,
        tenant = %ctx.tenant,
        route = %rule.name,
        upstream = %rule.upstream.name(),
        path = %ctx.forwarded_path(),
        status,
        "Request forwarded"
    );

    response
}
