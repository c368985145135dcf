//! Active registry holder.
//!
//! Uses ArcSwap for lock-free atomic updates: `current()` never blocks on
//! `install()` and vice versa. A reader may see a registry one reload old,
//! never a partially built one.

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::observability::metrics;
use crate::registry::snapshot::Registry;

/// Holds the most recently published [`Registry`].
#[derive(Debug)]
pub struct RegistrySwitch {
    active: ArcSwap<Registry>,
}

impl RegistrySwitch {
    pub fn new(initial: Registry) -> Self {
        metrics::set_registry_size(initial.len());
        Self {
            active: ArcSwap::from_pointee(initial),
        }
    }

    /// Snapshot of the active registry.
    pub fn current(&self) -> Arc<Registry> {
        self.active.load_full()
    }

    /// Publish `registry`, returning the snapshot it replaced.
    pub fn install(&self, registry: Registry) -> Arc<Registry> {
        let generation = registry.generation();
        let backends = registry.len();

        let previous = self.active.swap(Arc::new(registry));
        metrics::set_registry_size(backends);

        tracing::info!(
            generation,
            previous_generation = previous.generation(),
            backends,
            "Registry installed"
        );
        previous
    }
}

impl Default for RegistrySwitch {
    fn default() -> Self {
        Self::new(Registry::empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{BackendDescriptor, DuplicatePolicy};
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn registry(tag: &str, generation: u64) -> Registry {
        let mut builder = Registry::builder(DuplicatePolicy::LastWins);
        for i in 0..50 {
            let descriptor =
                BackendDescriptor::new(format!("{}-{}", tag, i), format!("{}.internal:80", tag), false)
                    .unwrap();
            builder.insert(descriptor, format!("{}-{}.conf", tag, i));
        }
        builder.build(generation)
    }

    #[test]
    fn install_replaces_and_returns_previous() {
        let switch = RegistrySwitch::default();
        assert_eq!(switch.current().generation(), 0);

        let previous = switch.install(registry("a", 1));
        assert_eq!(previous.generation(), 0);
        assert_eq!(switch.current().len(), 50);
    }

    #[test]
    fn held_snapshot_survives_install() {
        let switch = RegistrySwitch::new(registry("a", 1));
        let held = switch.current();
        switch.install(registry("b", 2));

        assert!(held.get("a-0").is_some());
        assert!(switch.current().get("a-0").is_none());
    }

    #[test]
    fn concurrent_readers_never_see_a_mixed_table() {
        let switch = RegistrySwitch::new(registry("a", 1));
        let done = AtomicBool::new(false);

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    while !done.load(Ordering::Relaxed) {
                        let snapshot = switch.current();
                        assert_eq!(snapshot.len(), 50);
                        let addresses: HashSet<_> = snapshot
                            .descriptors()
                            .iter()
                            .map(|d| d.address().to_string())
                            .collect();
                        assert_eq!(addresses.len(), 1, "snapshot mixes two reloads");
                    }
                });
            }

            for generation in 2..200 {
                let tag = if generation % 2 == 0 { "b" } else { "a" };
                switch.install(registry(tag, generation));
            }
            done.store(true, Ordering::Relaxed);
        });

        assert_eq!(switch.current().generation(), 199);
    }
}
