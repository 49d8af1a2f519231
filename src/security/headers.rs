//! Header manipulation for forwarded requests.
//!
//! # Responsibilities
//! - Add X-Real-IP, X-Forwarded-For, X-Forwarded-Proto and the tenant header
//! - Strip hop-by-hop headers in both directions
//! - Detect protocol upgrade requests
//!
//! # Design Decisions
//! - X-Forwarded-For is appended to, never replaced
//! - The tenant header is always overwritten; clients cannot pick a tenant
//! - Headers are computed per request, never cached on a pooled connection

use axum::http::header::{CONNECTION, HOST, UPGRADE};
use axum::http::{HeaderMap, HeaderName, HeaderValue};

use crate::http::request::RequestContext;
use crate::proxy::policy::TransportPolicy;

pub const X_REAL_IP: HeaderName = HeaderName::from_static("x-real-ip");
pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
pub const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");

/// Headers meaningful only for a single transport-level connection.
const HOP_BY_HOP: [&str; 7] = [
    "connection",
    "keep-alive",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Remove hop-by-hop headers, including any listed in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|token| HeaderName::from_bytes(token.trim().as_bytes()).ok())
        .collect();

    for name in listed {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

/// True when the client asks to switch protocols (websocket, live reload).
pub fn is_upgrade_request(headers: &HeaderMap) -> bool {
    let connection_upgrade = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("upgrade"));

    connection_upgrade && headers.contains_key(UPGRADE)
}

/// Existing forwarded-for chain with `client` appended.
pub fn forwarded_for(existing: Option<&str>, client: std::net::IpAddr) -> String {
    match existing {
        Some(chain) if !chain.trim().is_empty() => format!("{}, {}", chain.trim(), client),
        _ => client.to_string(),
    }
}

/// Set the outbound identity headers for one forwarded request.
///
/// Expects hop-by-hop headers to have been stripped already.
pub fn apply_forwarding_headers(
    headers: &mut HeaderMap,
    ctx: &RequestContext,
    tenant_header: &HeaderName,
    policy: &TransportPolicy,
) {
    if let Some(host) = ctx.host.as_deref().and_then(|h| HeaderValue::from_str(h).ok()) {
        headers.insert(HOST, host);
    }

    let client_ip = ctx.remote_addr.ip();
    headers.insert(X_REAL_IP, header_value(&client_ip.to_string()));
    headers.insert(
        X_FORWARDED_FOR,
        header_value(&forwarded_for(ctx.forwarded_for.as_deref(), client_ip)),
    );
    headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static(ctx.scheme));
    headers.insert(tenant_header.clone(), header_value(ctx.tenant.as_str()));

    for (name, value) in &policy.extra_headers {
        headers.insert(name.clone(), value.clone());
    }
}

fn header_value(value: &str) -> HeaderValue {
    // Addresses and validated tenant ids are always visible ASCII.
    HeaderValue::from_str(value).unwrap_or_else(|_| HeaderValue::from_static("invalid"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tenancy::TenantId;
    use std::net::SocketAddr;

    fn context(forwarded_for: Option<&str>) -> RequestContext {
        RequestContext {
            request_id: "req-1".into(),
            tenant: TenantId::new("nantou-gov"),
            host: Some("nantou.multi-tenant.example".into()),
            original_path: "/api/tenant/config".into(),
            rewritten_path: Some("/tenant/config".into()),
            query: None,
            remote_addr: "203.0.113.7:51000".parse::<SocketAddr>().unwrap(),
            forwarded_for: forwarded_for.map(Into::into),
            scheme: "https",
        }
    }

    #[test]
    fn strips_hop_by_hop_and_connection_listed_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive, x-private"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert("x-private", HeaderValue::from_static("1"));
        headers.insert("transfer-encoding", HeaderValue::from_static("chunked"));
        headers.insert("accept", HeaderValue::from_static("text/event-stream"));

        strip_hop_by_hop(&mut headers);

        assert_eq!(headers.len(), 1);
        assert!(headers.contains_key("accept"));
    }

    #[test]
    fn detects_upgrade_requests() {
        let mut headers = HeaderMap::new();
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive, Upgrade"));
        assert!(!is_upgrade_request(&headers));

        headers.insert(UPGRADE, HeaderValue::from_static("websocket"));
        assert!(is_upgrade_request(&headers));
    }

    #[test]
    fn appends_to_forwarded_for_chain() {
        let ip = "10.0.0.9".parse().unwrap();
        assert_eq!(forwarded_for(None, ip), "10.0.0.9");
        assert_eq!(forwarded_for(Some("198.51.100.1"), ip), "198.51.100.1, 10.0.0.9");
        assert_eq!(forwarded_for(Some("  "), ip), "10.0.0.9");
    }

    #[test]
    fn overwrites_client_supplied_tenant() {
        let tenant_header = HeaderName::from_static("x-tenant-id");
        let mut headers = HeaderMap::new();
        headers.insert("x-tenant-id", HeaderValue::from_static("someone-else"));

        apply_forwarding_headers(
            &mut headers,
            &context(Some("198.51.100.1")),
            &tenant_header,
            &TransportPolicy::default(),
        );

        assert_eq!(headers["x-tenant-id"], "nantou-gov");
        assert_eq!(headers[HOST], "nantou.multi-tenant.example");
        assert_eq!(headers["x-real-ip"], "203.0.113.7");
        assert_eq!(headers["x-forwarded-for"], "198.51.100.1, 203.0.113.7");
        assert_eq!(headers["x-forwarded-proto"], "https");
    }

    #[test]
    fn applies_policy_headers_last() {
        let tenant_header = HeaderName::from_static("x-tenant-id");
        let policy = TransportPolicy {
            extra_headers: vec![(
                HeaderName::from_static("cache-control"),
                HeaderValue::from_static("no-cache"),
            )],
            ..TransportPolicy::default()
        };
        let mut headers = HeaderMap::new();
        headers.insert("cache-control", HeaderValue::from_static("max-age=60"));

        apply_forwarding_headers(&mut headers, &context(None), &tenant_header, &policy);

        assert_eq!(headers["cache-control"], "no-cache");
    }
}
