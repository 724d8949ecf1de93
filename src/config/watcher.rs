//! Configuration file watcher for hot reload.
//!
//! The parent directory is watched rather than the file itself, since many
//! editors save by writing a temp file and renaming it over the original.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::{load_config, ConfigError};
use crate::config::schema::ResilienceConfig;

/// Watches the configuration file and emits validated configs on change.
pub struct ConfigWatcher {
    path: PathBuf,
    current: ResilienceConfig,
    update_tx: mpsc::UnboundedSender<ResilienceConfig>,
}

impl ConfigWatcher {
    /// Create a watcher for `path`, seeded with the config already in use.
    ///
    /// Returns the watcher and a receiver for configuration updates.
    pub fn new(
        path: &Path,
        current: ResilienceConfig,
    ) -> (Self, mpsc::UnboundedReceiver<ResilienceConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                current,
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching. The returned handle must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx;
        let path = self.path.clone();
        let last = Mutex::new(self.current);

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let touches_config = event.paths.iter().any(|p| p.ends_with(
                        path.file_name().unwrap_or_default(),
                    ));
                    if !touches_config || !(event.kind.is_modify() || event.kind.is_create()) {
                        return;
                    }
                    let mut last = last.lock().unwrap_or_else(|e| e.into_inner());
                    match reload_if_changed(&path, &last) {
                        Ok(Some(new_config)) => {
                            tracing::info!(path = ?path, "Configuration reloaded");
                            *last = new_config.clone();
                            let _ = tx.send(new_config);
                        }
                        Ok(None) => tracing::debug!("Config file touched without changes"),
                        Err(e) => tracing::error!(
                            error = %e,
                            "Failed to reload config, keeping current configuration"
                        ),
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

/// Load `path` and return it only if it differs from `current`.
fn reload_if_changed(
    path: &Path,
    current: &ResilienceConfig,
) -> Result<Option<ResilienceConfig>, ConfigError> {
    let loaded = load_config(path)?;
    Ok((loaded != *current).then_some(loaded))
}
