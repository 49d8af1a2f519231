//! Startup orchestration.
//!
//! # Responsibilities
//! - Load and validate configuration
//! - Initialize logging and metrics
//! - Load TLS material and bind listeners
//! - Start reload triggers (file watcher, SIGHUP)
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Listeners start last (traffic only when ready)

use std::io;
use std::net::SocketAddr;
use std::path::Path;

use metrics_exporter_prometheus::BuildError;
use tokio::net::TcpListener;
use tracing_subscriber::util::TryInitError;

use crate::config::{load_config, ConfigError, ConfigWatcher, EdgeConfig};
use crate::http::redirect::run_redirect;
use crate::http::{EdgeServer, SnapshotError};
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals::spawn_reload_on_sighup;
use crate::net::tls::TlsError;
use crate::observability::{logging, metrics};

/// Fatal errors while starting or running the gateway.
#[derive(Debug, thiserror::Error)]
pub enum EdgeError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to compile configuration: {0}")]
    Snapshot(#[from] SnapshotError),
    #[error("tls: {0}")]
    Tls(#[from] TlsError),
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },
    #[error("invalid metrics address '{0}'")]
    MetricsAddress(String),
    #[error("failed to start metrics exporter: {0}")]
    Metrics(#[from] BuildError),
    #[error("failed to initialize logging: {0}")]
    Logging(#[from] TryInitError),
    #[error("config watcher: {0}")]
    Watcher(#[from] notify::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Validate the configuration, compile routes and load certificates
/// without binding anything.
pub fn check(config_path: &Path) -> Result<EdgeConfig, EdgeError> {
    let config = load_config(config_path)?;
    EdgeServer::new(config.clone())?;
    Ok(config)
}

/// Load the configuration and serve until a shutdown signal arrives.
pub async fn run(config_path: &Path) -> Result<(), EdgeError> {
    let config = load_config(config_path)?;

    logging::init(&config.observability)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path.display(),
        "tenant-edge starting"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config
            .observability
            .metrics_address
            .parse()
            .map_err(|_| EdgeError::MetricsAddress(config.observability.metrics_address.clone()))?;
        metrics::init_metrics(addr)?;
    }

    let redirect_address = config.listener.redirect_address.clone();
    let bind_address = config.listener.bind_address.clone();
    let https_port = config.listener.https_port;

    let server = EdgeServer::new(config)?;

    let (watcher, config_updates) = ConfigWatcher::new(config_path);
    spawn_reload_on_sighup(config_path.to_path_buf(), watcher.sender());
    let _watch_guard = watcher.run()?;

    let listener = bind(&bind_address).await?;
    let shutdown = Shutdown::new();

    let redirect = match redirect_address {
        Some(address) => {
            let listener = bind(&address).await?;
            Some(tokio::spawn(run_redirect(listener, https_port, shutdown.subscribe())))
        }
        None => None,
    };

    let gateway = tokio::spawn(server.run(listener, config_updates, shutdown.subscribe()));

    shutdown.trigger_on_signal().await;

    if let Some(redirect) = redirect {
        match redirect.await {
            Ok(Err(e)) => tracing::error!(error = %e, "Redirect listener failed"),
            Err(e) => tracing::error!(error = %e, "Redirect task panicked"),
            Ok(Ok(())) => {}
        }
    }
    match gateway.await {
        Ok(result) => result?,
        Err(e) => tracing::error!(error = %e, "Gateway task panicked"),
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn bind(address: &str) -> Result<TcpListener, EdgeError> {
    TcpListener::bind(address)
        .await
        .map_err(|source| EdgeError::Bind {
            address: address.to_string(),
            source,
        })
}
