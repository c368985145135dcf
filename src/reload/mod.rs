//! Registry reload subsystem.
//!
//! # Data Flow
//! ```text
//! SIGUSR1 / SIGHUP ──┐
//! POST /admin/reload ─┤
//! directory watcher ──┼─→ ReloadHandle ─→ mpsc ─→ ReloadWorker
//! interval timer ─────┘                           │ DescriptorLoader::load
//!                                                 │ RegistrySwitch::install
//!                                                 └→ optional reply
//! ```
//!
//! # Design Decisions
//! - Exactly one worker performs loads, so installs are serialized
//! - Requests queued while a load runs are coalesced into the next load
//! - A failed load keeps the active registry untouched

pub mod interval;
pub mod worker;

use std::fmt;

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::registry::{LoadError, Registry};

pub use interval::IntervalTrigger;
pub use worker::{ReloadHandle, ReloadWorker};

/// Why a reload was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadReason {
    Signal(&'static str),
    Admin,
    Watcher,
    Interval,
    Manual,
}

impl fmt::Display for ReloadReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReloadReason::Signal(name) => write!(f, "signal {}", name),
            ReloadReason::Admin => write!(f, "admin request"),
            ReloadReason::Watcher => write!(f, "directory change"),
            ReloadReason::Interval => write!(f, "interval"),
            ReloadReason::Manual => write!(f, "manual"),
        }
    }
}

/// Result of a successful reload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReloadSummary {
    pub generation: u64,
    pub backends: usize,
    pub skipped: usize,
    pub conflicts: usize,
}

impl ReloadSummary {
    pub fn of(registry: &Registry) -> Self {
        Self {
            generation: registry.generation(),
            backends: registry.len(),
            skipped: registry.skipped(),
            conflicts: registry.conflicts(),
        }
    }
}

/// Error returned to callers waiting on a reload.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ReloadError {
    #[error("{0}")]
    Load(String),

    #[error("reload task panicked")]
    Panicked,

    #[error("reload worker is not running")]
    WorkerGone,
}

impl From<LoadError> for ReloadError {
    fn from(e: LoadError) -> Self {
        ReloadError::Load(e.to_string())
    }
}

/// An event source that asks for reloads through a [`ReloadHandle`].
pub trait ReloadTrigger: Send + 'static {
    /// Name used in log messages.
    fn name(&self) -> &'static str;

    /// Start delivering reload requests until `shutdown` fires.
    fn spawn(self, handle: ReloadHandle, shutdown: broadcast::Receiver<()>) -> JoinHandle<()>;
}
