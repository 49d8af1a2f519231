//! Forwarding errors and their client-facing responses.
//!
//! # Responsibilities
//! - Classify upstream failures (connect, timeout, protocol)
//! - Map every request-path failure to one status code
//! - Render short plain-text error bodies
//!
//! # Design Decisions
//! - Classification walks the error source chain; no string matching
//! - Backend timeouts result in 504 Gateway Timeout
//! - Upstream details are logged, never sent to the client

use std::error::Error as StdError;
use std::io;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::BoxError;
use http_body_util::LengthLimitError;

use crate::proxy::policy::TransportPolicy;
use crate::proxy::upstream::Upstream;
use crate::resilience::timeouts::{TimeoutPhase, UpstreamTimeout};

/// A request that could not be forwarded.
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("no route matches path {path}")]
    NoRoute { path: String },

    #[error("host {host:?} is not served here")]
    MisdirectedHost { host: String },

    #[error("request body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },

    #[error("failed to read request body: {0}")]
    ClientBody(#[source] axum::Error),

    #[error("invalid outbound request: {0}")]
    InvalidTarget(#[from] axum::http::Error),

    #[error("upstream {upstream} unreachable: {source}")]
    Connect {
        upstream: String,
        #[source]
        source: hyper_util::client::legacy::Error,
    },

    #[error(transparent)]
    Timeout(#[from] UpstreamTimeout),

    #[error("upstream {upstream} request failed: {source}")]
    Upstream {
        upstream: String,
        #[source]
        source: hyper_util::client::legacy::Error,
    },

    #[error("upstream {upstream} response body failed: {source}")]
    UpstreamBody {
        upstream: String,
        #[source]
        source: BoxError,
    },

    #[error("upstream {upstream} switched protocols without an upgrade request")]
    UnexpectedUpgrade { upstream: String },
}

impl ForwardError {
    /// Classify a client error from the pooled upstream client.
    pub fn from_client_error(
        err: hyper_util::client::legacy::Error,
        upstream: &Upstream,
        policy: &TransportPolicy,
        limit: usize,
    ) -> Self {
        if let Some(timeout) = find_cause::<UpstreamTimeout>(&err) {
            return ForwardError::Timeout(timeout.clone());
        }
        if find_cause::<LengthLimitError>(&err).is_some() {
            return ForwardError::BodyTooLarge { limit };
        }
        if err.is_connect() {
            if let Some(timeout) = connect_timeout(&err, policy) {
                return ForwardError::Timeout(timeout);
            }
            return ForwardError::Connect {
                upstream: upstream.name().to_string(),
                source: err,
            };
        }
        ForwardError::Upstream {
            upstream: upstream.name().to_string(),
            source: err,
        }
    }

    /// Classify a failure reading the client's request body.
    pub fn from_body_error(err: axum::Error, limit: usize) -> Self {
        if let Some(timeout) = find_cause::<UpstreamTimeout>(&err) {
            return ForwardError::Timeout(timeout.clone());
        }
        if find_cause::<LengthLimitError>(&err).is_some() {
            ForwardError::BodyTooLarge { limit }
        } else {
            ForwardError::ClientBody(err)
        }
    }

    /// Classify a failure reading a response body we are still buffering.
    pub fn from_response_body_error(err: BoxError, upstream: &Upstream) -> Self {
        match find_cause::<UpstreamTimeout>(&*err) {
            Some(timeout) => ForwardError::Timeout(timeout.clone()),
            None => ForwardError::UpstreamBody {
                upstream: upstream.name().to_string(),
                source: err,
            },
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ForwardError::NoRoute { .. } => StatusCode::NOT_FOUND,
            ForwardError::MisdirectedHost { .. } => StatusCode::MISDIRECTED_REQUEST,
            ForwardError::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ForwardError::ClientBody(_) | ForwardError::InvalidTarget(_) => StatusCode::BAD_REQUEST,
            ForwardError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ForwardError::Connect { .. }
            | ForwardError::Upstream { .. }
            | ForwardError::UpstreamBody { .. }
            | ForwardError::UnexpectedUpgrade { .. } => StatusCode::BAD_GATEWAY,
        }
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ForwardError::NoRoute { .. } => "no_route",
            ForwardError::MisdirectedHost { .. } => "misdirected",
            ForwardError::BodyTooLarge { .. } => "body_too_large",
            ForwardError::ClientBody(_) => "client_body",
            ForwardError::InvalidTarget(_) => "invalid_target",
            ForwardError::Connect { .. } => "connect",
            ForwardError::Timeout(t) => match t.phase {
                TimeoutPhase::Connect => "connect_timeout",
                TimeoutPhase::Write => "write_timeout",
                TimeoutPhase::Read => "read_timeout",
            },
            ForwardError::Upstream { .. } => "upstream",
            ForwardError::UpstreamBody { .. } => "upstream_body",
            ForwardError::UnexpectedUpgrade { .. } => "unexpected_upgrade",
        }
    }

    /// True when the failure happened talking to the upstream.
    pub fn is_upstream_failure(&self) -> bool {
        matches!(
            self,
            ForwardError::Connect { .. }
                | ForwardError::Timeout(_)
                | ForwardError::Upstream { .. }
                | ForwardError::UpstreamBody { .. }
                | ForwardError::UnexpectedUpgrade { .. }
        )
    }
}

impl IntoResponse for ForwardError {
    fn into_response(self) -> Response {
        let message = match &self {
            ForwardError::NoRoute { .. } => "No matching route found",
            ForwardError::MisdirectedHost { .. } => "Misdirected request",
            ForwardError::BodyTooLarge { .. } => "Request body too large",
            ForwardError::ClientBody(_) | ForwardError::InvalidTarget(_) => "Bad request",
            ForwardError::Timeout(_) => "Upstream timed out",
            _ => "Upstream request failed",
        };
        (self.status(), message).into_response()
    }
}

/// The connector gave up on a TCP connect after `connect_timeout`.
fn connect_timeout(
    err: &(dyn StdError + 'static),
    policy: &TransportPolicy,
) -> Option<UpstreamTimeout> {
    find_cause::<io::Error>(err)
        .filter(|io| io.kind() == io::ErrorKind::TimedOut)
        .map(|_| UpstreamTimeout {
            phase: TimeoutPhase::Connect,
            after: policy.connect_timeout,
        })
}

/// First error of type `T` in the source chain of `err`, including `err`.
pub fn find_cause<'a, T>(err: &'a (dyn StdError + 'static)) -> Option<&'a T>
where
    T: StdError + 'static,
{
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(found) = e.downcast_ref::<T>() {
            return Some(found);
        }
        current = e.source();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn statuses_follow_error_class() {
        assert_eq!(
            ForwardError::NoRoute { path: "/x".into() }.status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ForwardError::BodyTooLarge { limit: 1 }.status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        let timeout = ForwardError::from(UpstreamTimeout {
            phase: TimeoutPhase::Read,
            after: Duration::from_secs(1),
        });
        assert_eq!(timeout.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(timeout.kind(), "read_timeout");
    }

    #[test]
    fn finds_timeout_behind_boxed_error() {
        let upstream = Upstream::new("llm-wrapper", "localhost:8004").unwrap();
        let err: BoxError = Box::new(UpstreamTimeout {
            phase: TimeoutPhase::Read,
            after: Duration::from_secs(600),
        });
        let classified = ForwardError::from_response_body_error(err, &upstream);
        assert_eq!(classified.status(), StatusCode::GATEWAY_TIMEOUT);

        let err: BoxError = "connection reset".into();
        let classified = ForwardError::from_response_body_error(err, &upstream);
        assert_eq!(classified.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn finds_nested_length_limit() {
        let err = axum::body::to_bytes(axum::body::Body::from("hello world"), 4)
            .await
            .unwrap_err();
        assert!(matches!(
            ForwardError::from_body_error(err, 4),
            ForwardError::BodyTooLarge { limit: 4 }
        ));
    }

    #[derive(Debug, thiserror::Error)]
    #[error("tcp connect error")]
    struct ConnectFailure(#[source] io::Error);

    #[test]
    fn connector_timeout_is_connect_timeout() {
        let policy = TransportPolicy {
            connect_timeout: Duration::from_secs(3),
            ..TransportPolicy::default()
        };

        let timed_out = ConnectFailure(io::Error::new(io::ErrorKind::TimedOut, "connect timed out"));
        let timeout = connect_timeout(&timed_out, &policy).unwrap();
        let err = ForwardError::Timeout(timeout);
        assert_eq!(err.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(err.kind(), "connect_timeout");
        assert!(err.to_string().contains("3s"));

        let refused = ConnectFailure(io::Error::from(io::ErrorKind::ConnectionRefused));
        assert!(connect_timeout(&refused, &policy).is_none());
    }

    #[test]
    fn stalled_client_body_is_write_timeout() {
        let err = axum::Error::new(UpstreamTimeout {
            phase: TimeoutPhase::Write,
            after: Duration::from_secs(60),
        });
        let classified = ForwardError::from_body_error(err, 1024);
        assert_eq!(classified.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(classified.kind(), "write_timeout");
    }

    #[tokio::test]
    async fn error_response_is_plain_text() {
        let response = ForwardError::NoRoute { path: "/".into() }.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(body, "No matching route found");
    }
}
