//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Settings → Metrics → Initial registry load → Reload worker + triggers
//!     → Admin API → Listeners
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain connections → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//!     SIGUSR1/SIGHUP → Trigger registry reload
//! ```
//!
//! # Design Decisions
//! - Ordered startup: registry first, listeners last
//! - Ordered shutdown: stop accept, drain, close
//! - Shutdown has timeout: remaining connections abandoned after deadline

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{Gateway, StartupError};
