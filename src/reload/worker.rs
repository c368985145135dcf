//! Serialized reload execution.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};

use crate::observability::metrics;
use crate::registry::{DescriptorLoader, RegistrySwitch};
use crate::reload::{ReloadError, ReloadReason, ReloadSummary};

/// Pending reloads beyond this are already covered by the queued ones.
const QUEUE_DEPTH: usize = 16;

type Reply = oneshot::Sender<Result<ReloadSummary, ReloadError>>;

struct ReloadRequest {
    reason: ReloadReason,
    reply: Option<Reply>,
}

/// Cheap, cloneable entry point for every reload trigger.
#[derive(Debug, Clone)]
pub struct ReloadHandle {
    tx: mpsc::Sender<ReloadRequest>,
}

impl std::fmt::Debug for ReloadRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReloadRequest")
            .field("reason", &self.reason)
            .field("awaiting_reply", &self.reply.is_some())
            .finish()
    }
}

impl ReloadHandle {
    /// Fire-and-forget request. Safe to call from non-async threads
    /// (signal and file-watcher callbacks).
    ///
    /// Returns false only when the worker has stopped.
    pub fn trigger(&self, reason: ReloadReason) -> bool {
        match self.tx.try_send(ReloadRequest { reason, reply: None }) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::debug!(%reason, "Reload already queued, coalescing");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!(%reason, "Reload requested but worker is not running");
                false
            }
        }
    }

    /// Request a reload and wait for its outcome.
    pub async fn reload(&self, reason: ReloadReason) -> Result<ReloadSummary, ReloadError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(ReloadRequest {
                reason,
                reply: Some(reply_tx),
            })
            .await
            .map_err(|_| ReloadError::WorkerGone)?;

        reply_rx.await.map_err(|_| ReloadError::WorkerGone)?
    }
}

/// Owns the loader and performs one reload at a time.
pub struct ReloadWorker {
    loader: Arc<DescriptorLoader>,
    dir: PathBuf,
    switch: Arc<RegistrySwitch>,
    rx: mpsc::Receiver<ReloadRequest>,
}

impl ReloadWorker {
    pub fn new(
        loader: Arc<DescriptorLoader>,
        dir: PathBuf,
        switch: Arc<RegistrySwitch>,
    ) -> (Self, ReloadHandle) {
        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        let worker = Self {
            loader,
            dir,
            switch,
            rx,
        };
        (worker, ReloadHandle { tx })
    }

    /// Process requests until every handle is dropped or shutdown fires.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(dir = %self.dir.display(), "Reload worker started");

        loop {
            let first = tokio::select! {
                request = self.rx.recv() => match request {
                    Some(request) => request,
                    None => break,
                },
                _ = shutdown.recv() => break,
            };

            let mut batch = vec![first];
            while let Ok(queued) = self.rx.try_recv() {
                batch.push(queued);
            }

            let reason = batch[0].reason;
            tracing::info!(%reason, coalesced = batch.len() - 1, "Reloading backend descriptors");

            let result = self.reload_once().await;

            for request in batch {
                if let Some(reply) = request.reply {
                    let _ = reply.send(result.clone());
                }
            }
        }

        tracing::info!("Reload worker stopped");
    }

    async fn reload_once(&self) -> Result<ReloadSummary, ReloadError> {
        let loader = Arc::clone(&self.loader);
        let dir = self.dir.clone();

        let loaded = tokio::task::spawn_blocking(move || loader.load(&dir)).await;

        match loaded {
            Ok(Ok(registry)) => {
                let summary = ReloadSummary::of(&registry);
                self.switch.install(registry);
                metrics::record_reload("success");
                Ok(summary)
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Reload failed, keeping current registry");
                metrics::record_reload("failure");
                Err(e.into())
            }
            Err(e) => {
                tracing::error!(error = %e, "Reload task panicked, keeping current registry");
                metrics::record_reload("failure");
                Err(ReloadError::Panicked)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{DuplicatePolicy, Registry};
    use std::fs;
    use tempfile::TempDir;

    fn start(dir: PathBuf) -> (Arc<RegistrySwitch>, ReloadHandle, broadcast::Sender<()>) {
        let loader = Arc::new(DescriptorLoader::new(".conf", DuplicatePolicy::LastWins));
        let switch = Arc::new(RegistrySwitch::new(Registry::empty()));
        let (worker, handle) = ReloadWorker::new(loader, dir, Arc::clone(&switch));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        tokio::spawn(worker.run(shutdown_rx));
        (switch, handle, shutdown_tx)
    }

    #[tokio::test]
    async fn reload_installs_new_registry() {
        let dir = TempDir::new().unwrap();
        let (switch, handle, _shutdown) = start(dir.path().to_path_buf());
        assert!(switch.current().is_empty());

        fs::write(
            dir.path().join("app1.conf"),
            r#"{"Name": "app1", "Address": "127.0.0.1:9001"}"#,
        )
        .unwrap();

        let summary = handle.reload(ReloadReason::Manual).await.unwrap();
        assert_eq!(summary.backends, 1);
        assert_eq!(switch.current().generation(), summary.generation);
        assert!(switch.current().get("app1").is_some());
    }

    #[tokio::test]
    async fn failed_reload_keeps_current_registry() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("app1.conf"),
            r#"{"Name": "app1", "Address": "127.0.0.1:9001"}"#,
        )
        .unwrap();
        let root = dir.path().to_path_buf();
        let (switch, handle, _shutdown) = start(root.clone());

        handle.reload(ReloadReason::Manual).await.unwrap();
        let before = switch.current().generation();

        drop(dir);
        let err = handle.reload(ReloadReason::Manual).await.unwrap_err();

        assert!(matches!(err, ReloadError::Load(_)));
        assert_eq!(switch.current().generation(), before);
        assert!(switch.current().get("app1").is_some());
    }

    #[tokio::test]
    async fn concurrent_requests_are_serialized() {
        let dir = TempDir::new().unwrap();
        let (switch, handle, _shutdown) = start(dir.path().to_path_buf());

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let handle = handle.clone();
            tasks.push(tokio::spawn(async move {
                handle.reload(ReloadReason::Admin).await.unwrap()
            }));
        }

        let mut generations = Vec::new();
        for task in tasks {
            generations.push(task.await.unwrap().generation);
        }

        // every caller saw a published generation, and the active one is the newest
        let newest = *generations.iter().max().unwrap();
        assert_eq!(switch.current().generation(), newest);
    }

    #[tokio::test]
    async fn handle_reports_stopped_worker() {
        let dir = TempDir::new().unwrap();
        let (_switch, handle, shutdown) = start(dir.path().to_path_buf());
        shutdown.send(()).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert!(matches!(
            handle.reload(ReloadReason::Manual).await,
            Err(ReloadError::WorkerGone)
        ));
        assert!(!handle.trigger(ReloadReason::Manual));
    }
}
