//! Plaintext listener: every request is sent to its HTTPS equivalent.

use axum::body::Body;
use axum::http::header::LOCATION;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::http::request::request_host;

/// Router answering `301` to `https://<host>[:https_port]<path>?<query>`.
pub fn redirect_router(https_port: u16) -> Router {
    Router::new().fallback(move |request: Request<Body>| async move {
        redirect_response(&request, https_port)
    })
}

/// Serve redirects until shutdown.
pub async fn run_redirect(
    listener: TcpListener,
    https_port: u16,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), std::io::Error> {
    tracing::info!(address = %listener.local_addr()?, "Redirect listener starting");

    axum::serve(listener, redirect_router(https_port))
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;

    tracing::info!("Redirect listener stopped");
    Ok(())
}

fn redirect_response(request: &Request<Body>, https_port: u16) -> Response {
    let Some(host) = request_host(request).and_then(|host| hostname(&host)) else {
        return (StatusCode::BAD_REQUEST, "Missing Host header").into_response();
    };

    let path_and_query = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let location = match https_port {
        443 => format!("https://{host}{path_and_query}"),
        port => format!("https://{host}:{port}{path_and_query}"),
    };

    match axum::http::HeaderValue::from_str(&location) {
        Ok(location) => (StatusCode::MOVED_PERMANENTLY, [(LOCATION, location)]).into_response(),
        Err(_) => (StatusCode::BAD_REQUEST, "Invalid Host header").into_response(),
    }
}

/// Host without its port, brackets kept for IPv6 literals.
fn hostname(host: &str) -> Option<String> {
    let host = host.trim();
    let name = if host.starts_with('[') {
        host.split_once(']').map(|(addr, _)| format!("{addr}]"))?
    } else {
        host.split(':').next().unwrap_or(host).to_string()
    };
    let valid = !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'-' | b'[' | b']' | b':'));
    valid.then_some(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::HOST;
    use tower::ServiceExt;

    async fn redirect(uri: &str, host: Option<&str>, port: u16) -> Response {
        let mut builder = Request::builder().uri(uri);
        if let Some(host) = host {
            builder = builder.header(HOST, host);
        }
        redirect_router(port)
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn redirects_to_https_preserving_path_and_query() {
        let response = redirect("/login?next=%2Fdashboard", Some("multi-tenant.example"), 443).await;
        assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(
            response.headers()[LOCATION],
            "https://multi-tenant.example/login?next=%2Fdashboard"
        );
    }

    #[tokio::test]
    async fn drops_plaintext_port_and_adds_https_port() {
        let response = redirect("/", Some("nantou.multi-tenant.example:80"), 8443).await;
        assert_eq!(
            response.headers()[LOCATION],
            "https://nantou.multi-tenant.example:8443/"
        );
    }

    #[tokio::test]
    async fn missing_host_is_bad_request() {
        let response = redirect("/", None, 443).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn rejects_garbage_host() {
        let response = redirect("/", Some("evil.example/path"), 443).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
