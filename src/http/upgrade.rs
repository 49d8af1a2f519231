//! Protocol upgrade passthrough (websocket, dev-server live reload).
//!
//! After the upstream answers `101 Switching Protocols`, both connections are
//! spliced byte-for-byte until either side closes.

use hyper::upgrade::OnUpgrade;
use hyper_util::rt::TokioIo;

use crate::observability::metrics;

/// Splice the client and upstream connections once both upgrades complete.
pub fn spawn_tunnel(
    client: OnUpgrade,
    upstream: OnUpgrade,
    request_id: String,
    upstream_name: String,
) {
    tokio::spawn(async move {
        let (client, upstream) = match tokio::try_join!(client, upstream) {
            Ok(pair) => pair,
            Err(e) => {
                tracing::warn!(
                    request_id = %request_id,
                    upstream = %upstream_name,
                    error = %e,
                    "Protocol upgrade failed"
                );
                return;
            }
        };

        let mut client = TokioIo::new(client);
        let mut upstream = TokioIo::new(upstream);

        metrics::upgraded_connection_opened();
        tracing::debug!(request_id = %request_id, upstream = %upstream_name, "Upgraded connection open");

        match tokio::io::copy_bidirectional(&mut client, &mut upstream).await {
            Ok((from_client, from_upstream)) => tracing::debug!(
                request_id = %request_id,
                upstream = %upstream_name,
                from_client,
                from_upstream,
                "Upgraded connection closed"
            ),
            Err(e) => tracing::debug!(
                request_id = %request_id,
                upstream = %upstream_name,
                error = %e,
                "Upgraded connection ended with error"
            ),
        }

        metrics::upgraded_connection_closed();
    });
}
