//! Configuration file watcher for hot reload.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::EdgeConfig;
use crate::observability::metrics;

/// Watches the configuration file and publishes validated replacements.
///
/// Invalid edits are logged and dropped; the running snapshot stays in place.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<EdgeConfig>,
}

impl ConfigWatcher {
    /// Create a new ConfigWatcher.
    ///
    /// Returns the watcher and a receiver for configuration updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<EdgeConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Sender that other reload triggers (SIGHUP) can feed.
    pub fn sender(&self) -> mpsc::UnboundedSender<EdgeConfig> {
        self.update_tx.clone()
    }

    /// Start watching the file. The returned handle must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx;
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) => {
                    tracing::info!(path = ?path, "Config file change detected, reloading");
                    reload_into(&path, &tx);
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

/// Load the file and push it to `tx` when it validates.
pub fn reload_into(path: &Path, tx: &mpsc::UnboundedSender<EdgeConfig>) {
    match load_config(path) {
        Ok(new_config) => {
            if tx.send(new_config).is_err() {
                tracing::debug!("Config update receiver closed");
            }
        }
        Err(e) => {
            metrics::record_config_reload(false);
            tracing::error!(error = %e, "Failed to reload config, keeping current configuration");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_config(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("tenant-edge-{}-{}.toml", name, uuid::Uuid::new_v4()));
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn valid_file_is_published() {
        let path = temp_config(
            "valid",
            r#"
            [[upstreams]]
            name = "frontend"
            address = "localhost:6176"

            [[routes]]
            name = "frontend"
            upstream = "frontend"
            "#,
        );
        let (watcher, mut rx) = ConfigWatcher::new(&path);

        reload_into(&path, &watcher.sender());

        let config = rx.try_recv().unwrap();
        assert_eq!(config.routes[0].name, "frontend");
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn invalid_file_is_dropped() {
        let path = temp_config(
            "invalid",
            r#"
            [[routes]]
            name = "orphan"
            upstream = "missing"
            "#,
        );
        let (watcher, mut rx) = ConfigWatcher::new(&path);

        reload_into(&path, &watcher.sender());

        assert!(rx.try_recv().is_err());
        let _ = std::fs::remove_file(path);
    }
}
