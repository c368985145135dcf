//! Routing registry subsystem.
//!
//! # Data Flow
//! ```text
//! descriptor directory (*.conf, non-recursive)
//!     → loader.rs (read + parse each file, per-file fault isolation)
//!     → snapshot.rs (RegistryBuilder applies the duplicate policy)
//!     → Registry (immutable, fully built before anyone sees it)
//!     → switch.rs (atomic pointer swap, lock-free reads)
//! ```
//!
//! # Design Decisions
//! - A Registry is never mutated after `build()`; reloads publish a new one
//! - Readers hold an `Arc<Registry>`, so a superseded snapshot lives exactly
//!   as long as the last in-flight connection that looked it up
//! - Scan order is lexical by file name so "last writer" is well defined

pub mod descriptor;
pub mod loader;
pub mod snapshot;
pub mod switch;

pub use descriptor::{BackendDescriptor, DescriptorError};
pub use loader::{DescriptorLoader, LoadError};
pub use snapshot::{DuplicatePolicy, Registry, RegistryBuilder};
pub use switch::RegistrySwitch;
