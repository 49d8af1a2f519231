//! Request body limits.
//!
//! # Responsibilities
//! - Reject declared bodies over the limit before any upstream contact
//! - Cut off chunked bodies that overrun the limit while streaming
//! - Buffer bodies for buffered routes within the same limit
//!
//! # Design Decisions
//! - Enforced per request from the live snapshot so reloads apply
//! - Return 413 Payload Too Large

use axum::body::Body;
use axum::http::header::CONTENT_LENGTH;
use axum::http::{HeaderMap, Request};
use bytes::Bytes;
use http_body_util::Limited;

use crate::http::response::ForwardError;

/// Check the declared length and cap the body at `limit` bytes.
pub fn enforce_body_limit(
    request: Request<Body>,
    limit: usize,
) -> Result<Request<Body>, ForwardError> {
    if let Some(declared) = content_length(request.headers()) {
        if declared > limit as u64 {
            return Err(ForwardError::BodyTooLarge { limit });
        }
    }
    Ok(request.map(|body| Body::new(Limited::new(body, limit))))
}

/// Read a whole request body into memory.
pub async fn buffer_body(body: Body, limit: usize) -> Result<Bytes, ForwardError> {
    axum::body::to_bytes(body, limit)
        .await
        .map_err(|err| ForwardError::from_body_error(err, limit))
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
}
