//! Immutable routing table snapshot.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::registry::descriptor::BackendDescriptor;

/// What to do when two descriptor files claim the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// The file processed later (lexical file-name order) replaces the earlier one.
    #[default]
    LastWins,
    /// The first file processed keeps the key; later claims are skipped.
    FirstWins,
    /// Every descriptor claiming a contested key is dropped.
    Reject,
}

impl std::str::FromStr for DuplicatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "last_wins" | "last-wins" => Ok(Self::LastWins),
            "first_wins" | "first-wins" => Ok(Self::FirstWins),
            "reject" => Ok(Self::Reject),
            other => Err(format!("unknown duplicate policy: {}", other)),
        }
    }
}

/// Full routing table at one point in time.
///
/// Built in one pass by [`RegistryBuilder`] and never mutated afterwards.
#[derive(Debug, Default)]
pub struct Registry {
    backends: HashMap<String, Arc<BackendDescriptor>>,
    generation: u64,
    skipped: usize,
    conflicts: usize,
}

impl Registry {
    /// An empty registry (generation 0), used before the first load.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Start building a registry with the given duplicate policy.
    pub fn builder(policy: DuplicatePolicy) -> RegistryBuilder {
        RegistryBuilder::new(policy)
    }

    /// Look up a descriptor by its already-normalized key.
    pub fn get(&self, key: &str) -> Option<&Arc<BackendDescriptor>> {
        self.backends.get(key)
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Load counter; strictly increases with every published reload.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of descriptor files that could not be read or parsed.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Number of duplicate-key claims resolved by the policy.
    pub fn conflicts(&self) -> usize {
        self.conflicts
    }

    /// Descriptors sorted by key.
    pub fn descriptors(&self) -> Vec<Arc<BackendDescriptor>> {
        let mut all: Vec<_> = self.backends.values().cloned().collect();
        all.sort_by(|a, b| a.key().cmp(b.key()));
        all
    }
}

struct Entry {
    descriptor: BackendDescriptor,
    source: String,
}

/// Accumulates descriptors for one scan and applies the duplicate policy.
pub struct RegistryBuilder {
    policy: DuplicatePolicy,
    entries: HashMap<String, Entry>,
    rejected: HashSet<String>,
    skipped: usize,
    conflicts: usize,
}

impl RegistryBuilder {
    pub fn new(policy: DuplicatePolicy) -> Self {
        Self {
            policy,
            entries: HashMap::new(),
            rejected: HashSet::new(),
            skipped: 0,
            conflicts: 0,
        }
    }

    /// Add a descriptor read from `source` (a file path, for log messages).
    pub fn insert(&mut self, descriptor: BackendDescriptor, source: impl Into<String>) {
        let source = source.into();
        let key = descriptor.key().to_string();

        if self.rejected.contains(&key) {
            self.conflicts += 1;
            tracing::error!(key = %key, file = %source, "Key already rejected as conflicting, dropping descriptor");
            return;
        }

        let Some(existing) = self.entries.get(&key) else {
            self.entries.insert(key, Entry { descriptor, source });
            return;
        };

        self.conflicts += 1;
        match self.policy {
            DuplicatePolicy::LastWins => {
                tracing::warn!(
                    key = %key,
                    replaced = %existing.source,
                    file = %source,
                    "Duplicate backend key, later file wins"
                );
                self.entries.insert(key, Entry { descriptor, source });
            }
            DuplicatePolicy::FirstWins => {
                tracing::warn!(
                    key = %key,
                    kept = %existing.source,
                    file = %source,
                    "Duplicate backend key, keeping first file"
                );
            }
            DuplicatePolicy::Reject => {
                tracing::error!(
                    key = %key,
                    first = %existing.source,
                    file = %source,
                    "Duplicate backend key, dropping every claim"
                );
                self.entries.remove(&key);
                self.rejected.insert(key);
            }
        }
    }

    /// Record a file that was skipped because it could not be read or parsed.
    pub fn record_skipped(&mut self) {
        self.skipped += 1;
    }

    /// Freeze into an immutable registry.
    pub fn build(self, generation: u64) -> Registry {
        let backends = self
            .entries
            .into_iter()
            .map(|(key, entry)| (key, Arc::new(entry.descriptor)))
            .collect();

        Registry {
            backends,
            generation,
            skipped: self.skipped,
            conflicts: self.conflicts,
        }
    }
}
