//! Request forwarding.
//!
//! # Responsibilities
//! - Send a matched request to its upstream under the route's policy
//! - Rewrite headers per request (identity, tenant, hop-by-hop)
//! - Stream or buffer bodies as the policy says
//! - Pass protocol upgrades through
//!
//! # Design Decisions
//! - One pooled HTTP/1.1 client per policy; pools are keyed by authority
//!   inside each client, so connect timeouts stay per policy
//! - Nothing request-specific lives on a pooled connection
//! - Errors before the first response byte become status codes; after it,
//!   the client connection is cut

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::header::{CONNECTION, UPGRADE};
use axum::http::{HeaderName, HeaderValue, Request, StatusCode, Version};
use axum::response::Response;
use axum::BoxError;
use bytes::{Bytes, BytesMut};
use futures_util::stream::{self, StreamExt};
use http_body_util::BodyExt;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use crate::http::request::{RequestContext, X_REQUEST_ID};
use crate::http::response::ForwardError;
use crate::http::upgrade::spawn_tunnel;
use crate::proxy::policy::TransportPolicy;
use crate::proxy::upstream::Upstream;
use crate::resilience::timeouts::{
    with_deadline_after, CompletionBody, IdleTimeoutBody, TimeoutPhase,
};
use crate::security::headers::{apply_forwarding_headers, is_upgrade_request, strip_hop_by_hop};
use crate::security::limits::{buffer_body, enforce_body_limit};

pub type HttpClient = Client<HttpConnector, Body>;

const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

/// Forwards requests to upstreams. Rebuilt with every configuration snapshot.
#[derive(Debug)]
pub struct Forwarder {
    clients: HashMap<String, HttpClient>,
    tenant_header: HeaderName,
    max_body_size: usize,
    response_buffer_bytes: usize,
}

impl Forwarder {
    pub fn new(
        tenant_header: HeaderName,
        policies: &[Arc<TransportPolicy>],
        max_body_size: usize,
        response_buffer_bytes: usize,
    ) -> Self {
        let clients = policies
            .iter()
            .map(|policy| (policy.name.clone(), build_client(policy)))
            .collect();

        Self {
            clients,
            tenant_header,
            max_body_size,
            response_buffer_bytes,
        }
    }

    fn client_for(&self, policy: &TransportPolicy) -> HttpClient {
        self.clients
            .get(&policy.name)
            .cloned()
            .unwrap_or_else(|| build_client(policy))
    }

    /// Forward `request` to `upstream` and return the response to relay.
    pub async fn forward(
        &self,
        ctx: &RequestContext,
        request: Request<Body>,
        upstream: &Upstream,
        policy: &TransportPolicy,
    ) -> Result<Response, ForwardError> {
        let mut request = enforce_body_limit(request, self.max_body_size)?;

        let wants_upgrade = policy.upgrade && is_upgrade_request(request.headers());
        let client_upgrade = wants_upgrade.then(|| hyper::upgrade::on(&mut request));

        let (parts, body) = request.into_parts();
        let uri = upstream.uri_for(&ctx.forwarded_path_and_query())?;

        let mut headers = parts.headers;
        let upgrade_protocol = headers.get(UPGRADE).cloned();
        strip_hop_by_hop(&mut headers);
        apply_forwarding_headers(&mut headers, ctx, &self.tenant_header, policy);
        if !headers.contains_key(X_REQUEST_ID) {
            if let Ok(id) = HeaderValue::from_str(&ctx.request_id) {
                headers.insert(X_REQUEST_ID, id);
            }
        }
        if let (true, Some(protocol)) = (wants_upgrade, upgrade_protocol) {
            headers.insert(UPGRADE, protocol);
            headers.insert(CONNECTION, HeaderValue::from_static("upgrade"));
        }

        let body = Body::new(IdleTimeoutBody::new(body, policy.write_timeout, TimeoutPhase::Write));
        let body = if policy.buffering && !wants_upgrade {
            Body::from(buffer_body(body, self.max_body_size).await?)
        } else {
            body
        };
        let (body, sent) = CompletionBody::new(body);

        let mut outbound = Request::builder()
            .method(parts.method)
            .uri(uri)
            .version(Version::HTTP_11)
            .body(Body::new(body))?;
        *outbound.headers_mut() = headers;

        tracing::debug!(
            request_id = %ctx.request_id,
            upstream = %upstream,
            path = %ctx.forwarded_path(),
            policy = %policy.name,
            "Forwarding request"
        );

        let client = self.client_for(policy);
        let response_head = client.request(outbound);
        let mut response =
            match with_deadline_after(sent, policy.read_timeout, TimeoutPhase::Read, response_head)
                .await
            {
                Ok(Ok(response)) => response,
                Ok(Err(e)) => {
                    return Err(ForwardError::from_client_error(
                        e,
                        upstream,
                        policy,
                        self.max_body_size,
                    ))
                }
                Err(timeout) => return Err(timeout.into()),
            };

        if response.status() == StatusCode::SWITCHING_PROTOCOLS {
            let Some(client_upgrade) = client_upgrade else {
                return Err(ForwardError::UnexpectedUpgrade {
                    upstream: upstream.name().to_string(),
                });
            };
            let upstream_upgrade = hyper::upgrade::on(&mut response);
            spawn_tunnel(
                client_upgrade,
                upstream_upgrade,
                ctx.request_id.clone(),
                upstream.name().to_string(),
            );
            let (parts, _) = response.into_parts();
            return Ok(Response::from_parts(parts, Body::empty()));
        }

        let (mut parts, body) = response.into_parts();
        strip_hop_by_hop(&mut parts.headers);

        let body = IdleTimeoutBody::new(Body::new(body), policy.read_timeout, TimeoutPhase::Read);
        let body = if policy.buffering {
            self.buffer_response(body, upstream).await?
        } else {
            Body::new(body)
        };

        Ok(Response::from_parts(parts, body))
    }

    /// Hold up to `response_buffer_bytes` of the response; past that, relay
    /// the buffered prefix followed by the rest of the stream.
    async fn buffer_response<B>(&self, mut body: B, upstream: &Upstream) -> Result<Body, ForwardError>
    where
        B: http_body::Body<Data = Bytes, Error = BoxError> + Send + Unpin + 'static,
    {
        let mut buffered = BytesMut::new();

        while let Some(frame) = body.frame().await {
            let frame = frame.map_err(|e| ForwardError::from_response_body_error(e, upstream))?;
            let Ok(data) = frame.into_data() else {
                // Trailers are not relayed on buffered routes.
                continue;
            };
            buffered.extend_from_slice(&data);

            if buffered.len() > self.response_buffer_bytes {
                let prefix = buffered.freeze();
                let rest = stream::once(async move { Ok::<_, BoxError>(prefix) })
                    .chain(body.into_data_stream());
                return Ok(Body::from_stream(rest));
            }
        }

        Ok(Body::from(buffered.freeze()))
    }
}

fn build_client(policy: &TransportPolicy) -> HttpClient {
    let mut connector = HttpConnector::new();
    connector.set_connect_timeout(Some(policy.connect_timeout));
    connector.set_nodelay(true);

    Client::builder(TokioExecutor::new())
        .pool_idle_timeout(POOL_IDLE_TIMEOUT)
        .build(connector)
}
