//! Descriptor directory watcher for hot reload.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::reload::{ReloadHandle, ReloadReason, ReloadTrigger};

/// Requests a reload whenever a descriptor file in the directory is created,
/// modified or removed.
pub struct DirectoryWatcher {
    dir: PathBuf,
    extension: String,
}

impl DirectoryWatcher {
    pub fn new(dir: &Path, extension: impl Into<String>) -> Self {
        Self {
            dir: dir.to_path_buf(),
            extension: extension.into(),
        }
    }

    fn watch(&self, handle: ReloadHandle) -> Result<RecommendedWatcher, notify::Error> {
        let extension = self.extension.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let relevant = event.kind.is_create()
                        || event.kind.is_modify()
                        || event.kind.is_remove();
                    let touches_descriptor = event.paths.iter().any(|p| {
                        p.file_name()
                            .and_then(|n| n.to_str())
                            .is_some_and(|n| n.ends_with(&extension))
                    });

                    if relevant && touches_descriptor {
                        tracing::info!(paths = ?event.paths, "Descriptor change detected");
                        handle.trigger(ReloadReason::Watcher);
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.dir, RecursiveMode::NonRecursive)?;
        Ok(watcher)
    }
}

impl ReloadTrigger for DirectoryWatcher {
    fn name(&self) -> &'static str {
        "directory watcher"
    }

    fn spawn(self, handle: ReloadHandle, mut shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move {
            // the watcher stops when dropped, so keep it alive until shutdown
            let _watcher = match self.watch(handle) {
                Ok(watcher) => watcher,
                Err(e) => {
                    tracing::error!(dir = %self.dir.display(), error = %e, "Could not watch descriptor directory");
                    return;
                }
            };

            tracing::info!(dir = %self.dir.display(), "Descriptor watcher started");
            let _ = shutdown.recv().await;
        })
    }
}
