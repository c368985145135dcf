//! OS signal handling.
//!
//! # Responsibilities
//! - SIGINT (Ctrl-C) / SIGTERM → graceful shutdown
//! - SIGUSR1 / SIGHUP → registry reload, never shutdown
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Reload signals are just another [`ReloadTrigger`]

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::reload::{ReloadHandle, ReloadReason, ReloadTrigger};

/// Resolve when the process is asked to stop.
pub async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl-C"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }
}

/// Reloads the registry on SIGUSR1 and SIGHUP.
#[derive(Debug, Default, Clone, Copy)]
pub struct SignalTrigger;

impl SignalTrigger {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(unix)]
impl ReloadTrigger for SignalTrigger {
    fn name(&self) -> &'static str {
        "signal"
    }

    fn spawn(self, handle: ReloadHandle, mut shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        use tokio::signal::unix::{signal, SignalKind};

        tokio::spawn(async move {
            let (mut usr1, mut hup) =
                match (signal(SignalKind::user_defined1()), signal(SignalKind::hangup())) {
                    (Ok(usr1), Ok(hup)) => (usr1, hup),
                    (Err(e), _) | (_, Err(e)) => {
                        tracing::error!(error = %e, "Failed to install reload signal handlers");
                        return;
                    }
                };

            tracing::info!("Reload on SIGUSR1 / SIGHUP enabled");
            loop {
                let reason = tokio::select! {
                    _ = usr1.recv() => ReloadReason::Signal("SIGUSR1"),
                    _ = hup.recv() => ReloadReason::Signal("SIGHUP"),
                    _ = shutdown.recv() => break,
                };
                if !handle.trigger(reason) {
                    break;
                }
            }
        })
    }
}

#[cfg(not(unix))]
impl ReloadTrigger for SignalTrigger {
    fn name(&self) -> &'static str {
        "signal"
    }

    fn spawn(self, _handle: ReloadHandle, _shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        tracing::warn!("Reload signals are not supported on this platform");
        tokio::spawn(async {})
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::registry::{DescriptorLoader, DuplicatePolicy, RegistrySwitch};
    use crate::reload::ReloadWorker;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn sighup_reloads_registry() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("app1.conf"),
            r#"{"name": "app1", "address": "127.0.0.1:9001"}"#,
        )
        .unwrap();

        let loader = Arc::new(DescriptorLoader::new(".conf", DuplicatePolicy::LastWins));
        let switch = Arc::new(RegistrySwitch::default());
        let (worker, handle) = ReloadWorker::new(loader, dir.path().to_path_buf(), Arc::clone(&switch));

        let (tx, _) = broadcast::channel(1);
        tokio::spawn(worker.run(tx.subscribe()));
        let task = SignalTrigger::new().spawn(handle, tx.subscribe());

        // let the handlers register before raising
        tokio::time::sleep(Duration::from_millis(50)).await;
        let status = std::process::Command::new("kill")
            .args(["-HUP", &std::process::id().to_string()])
            .status()
            .unwrap();
        assert!(status.success());

        for _ in 0..100 {
            if switch.current().len() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(switch.current().len(), 1);

        let _ = tx.send(());
        task.await.unwrap();
    }
}
