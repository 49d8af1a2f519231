//! Shutdown coordination.
//!
//! The gateway and the redirect listener each hold a subscription. One
//! trigger stops both; the gateway then drains in-flight requests for at most
//! its grace period.

use std::time::Duration;

use axum_server::Handle;
use tokio::sync::broadcast;

use crate::lifecycle::signals::shutdown_signal;

/// Fan-out of one shutdown event to every listener.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Stop every listener. Returns how many were still subscribed.
    pub fn trigger(&self) -> usize {
        let listeners = self.tx.send(()).unwrap_or(0);
        tracing::info!(listeners, "Shutdown triggered");
        listeners
    }

    /// Wait for SIGINT or SIGTERM, then trigger.
    pub async fn trigger_on_signal(&self) -> usize {
        shutdown_signal().await;
        self.trigger()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Start a graceful drain on `handle` once `shutdown` fires.
///
/// Connections still open after `grace` are closed.
pub fn drain_on_shutdown(mut shutdown: broadcast::Receiver<()>, handle: Handle, grace: Duration) {
    tokio::spawn(async move {
        // A dropped coordinator counts as a trigger.
        let _ = shutdown.recv().await;
        tracing::info!(grace = ?grace, connections = handle.connection_count(), "Draining gateway connections");
        handle.graceful_shutdown(Some(grace));
    });
}
