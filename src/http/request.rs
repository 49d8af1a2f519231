//! Per-request context.
//!
//! # Responsibilities
//! - Capture everything forwarding needs from the inbound request
//! - Read the request ID set by the request-id layer
//! - Extract the routing-relevant host (Host header or HTTP/2 authority)
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Original request preserved for logging; modified copy forwarded

use std::net::SocketAddr;

use axum::http::header::HOST;
use axum::http::{HeaderMap, HeaderName, Request};

use crate::security::headers::X_FORWARDED_FOR;
use crate::tenancy::TenantId;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Facts about one inbound request, created on entry and dropped when the
/// exchange completes.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub tenant: TenantId,
    /// Host as sent by the client, port included.
    pub host: Option<String>,
    pub original_path: String,
    /// Path after the route's rewrite, when one applied.
    pub rewritten_path: Option<String>,
    pub query: Option<String>,
    pub remote_addr: SocketAddr,
    /// Forwarded-for chain as received.
    pub forwarded_for: Option<String>,
    /// `http` or `https`, from the listener.
    pub scheme: &'static str,
}

impl RequestContext {
    pub fn new<B>(
        request: &Request<B>,
        tenant: TenantId,
        remote_addr: SocketAddr,
        scheme: &'static str,
    ) -> Self {
        let headers = request.headers();
        let forwarded_for = headers
            .get_all(X_FORWARDED_FOR)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .collect::<Vec<_>>();

        Self {
            request_id: request_id(headers),
            tenant,
            host: request_host(request),
            original_path: request.uri().path().to_string(),
            rewritten_path: None,
            query: request.uri().query().map(str::to_string),
            remote_addr,
            forwarded_for: (!forwarded_for.is_empty()).then(|| forwarded_for.join(", ")),
            scheme,
        }
    }

    pub fn with_rewritten_path(mut self, path: Option<String>) -> Self {
        self.rewritten_path = path;
        self
    }

    /// Path sent upstream.
    pub fn forwarded_path(&self) -> &str {
        self.rewritten_path.as_deref().unwrap_or(&self.original_path)
    }

    /// Path and untouched query string sent upstream.
    pub fn forwarded_path_and_query(&self) -> String {
        match &self.query {
            Some(query) => format!("{}?{}", self.forwarded_path(), query),
            None => self.forwarded_path().to_string(),
        }
    }
}

/// Request ID from the `x-request-id` header, or a fresh one.
pub fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(X_REQUEST_ID)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

/// Host the client addressed: the `Host` header, or the URI authority for
/// HTTP/2 requests that carry `:authority` only.
pub fn request_host<B>(request: &Request<B>) -> Option<String> {
    request
        .headers()
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .or_else(|| request.uri().authority().map(|a| a.to_string()))
        .filter(|host| !host.is_empty())
}
