//! Shared routing snapshot.
//!
//! Everything a request needs to be routed is compiled into one immutable
//! [`EdgeSnapshot`]. Reloads build a new snapshot and swap it in atomically;
//! requests in flight keep the one they loaded.

use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::http::header::InvalidHeaderName;
use axum::http::HeaderName;

use crate::config::EdgeConfig;
use crate::proxy::Forwarder;
use crate::routing::{RouteTable, RouteTableError};
use crate::tenancy::TenantResolver;

/// Error compiling a configuration into a snapshot.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error(transparent)]
    Routes(#[from] RouteTableError),
    #[error("invalid tenant header: {0}")]
    TenantHeader(#[from] InvalidHeaderName),
}

/// Resolver, route table and forwarder compiled from one configuration.
#[derive(Debug)]
pub struct EdgeSnapshot {
    pub resolver: TenantResolver,
    pub routes: RouteTable,
    pub forwarder: Forwarder,
    pub strict_hosts: bool,
}

impl EdgeSnapshot {
    pub fn from_config(config: &EdgeConfig) -> Result<Self, SnapshotError> {
        let routes = RouteTable::from_config(config)?;
        let tenant_header = HeaderName::from_bytes(config.tenant_header.as_bytes())?;
        let forwarder = Forwarder::new(
            tenant_header,
            &routes.policies(),
            config.listener.max_body_size,
            config.listener.response_buffer_bytes,
        );

        Ok(Self {
            resolver: TenantResolver::from_config(config),
            routes,
            forwarder,
            strict_hosts: config.strict_hosts,
        })
    }
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub snapshot: Arc<ArcSwap<EdgeSnapshot>>,
    /// Scheme reported upstream in `X-Forwarded-Proto`.
    pub scheme: &'static str,
}

impl AppState {
    pub fn new(snapshot: EdgeSnapshot, scheme: &'static str) -> Self {
        Self {
            snapshot: Arc::new(ArcSwap::from_pointee(snapshot)),
            scheme,
        }
    }

    /// Replace the snapshot for all requests that start from now on.
    pub fn swap(&self, snapshot: EdgeSnapshot) {
        self.snapshot.store(Arc::new(snapshot));
    }
}
