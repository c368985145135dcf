//! Descriptor directory scanning.
//!
//! # Responsibilities
//! - List the top level of the descriptor directory (sub-directories skipped)
//! - Parse every file matching the configured extension
//! - Log and skip files that fail; never abort the scan for one bad file
//! - Hand back a fully built [`Registry`]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::AppsConfig;
use crate::registry::descriptor::BackendDescriptor;
use crate::registry::snapshot::{DuplicatePolicy, Registry};

/// Directory-level failure. Per-file failures never surface here.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("could not read descriptor directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Builds registry snapshots from a descriptor directory.
#[derive(Debug)]
pub struct DescriptorLoader {
    extension: String,
    policy: DuplicatePolicy,
    generation: AtomicU64,
}

impl DescriptorLoader {
    pub fn new(extension: impl Into<String>, policy: DuplicatePolicy) -> Self {
        Self {
            extension: extension.into(),
            policy,
            generation: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &AppsConfig) -> Self {
        Self::new(config.extension.clone(), config.duplicate_policy)
    }

    /// File-name suffix a descriptor must carry (e.g. `.conf`).
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Scan `dir` non-recursively and build a new registry.
    pub fn load(&self, dir: &Path) -> Result<Registry, LoadError> {
        tracing::info!(dir = %dir.display(), "Reading backend descriptors");

        let read_dir = fs::read_dir(dir).map_err(|source| LoadError::ReadDir {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut candidates = Vec::new();
        for entry in read_dir {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(dir = %dir.display(), error = %e, "Could not read directory entry");
                    continue;
                }
            };

            let path = entry.path();
            // follows symlinks, so a link to a directory is skipped as well
            if path.is_dir() {
                tracing::debug!(path = %path.display(), "Skipping sub-directory");
                continue;
            }

            let matches = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.ends_with(&self.extension));
            if matches {
                candidates.push(path);
            }
        }
        candidates.sort();

        let mut builder = Registry::builder(self.policy);
        for path in candidates {
            tracing::debug!(path = %path.display(), "Reading descriptor");
            match BackendDescriptor::from_file(&path) {
                Ok(descriptor) => builder.insert(descriptor, path.display().to_string()),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping descriptor file");
                    builder.record_skipped();
                }
            }
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let registry = builder.build(generation);

        tracing::info!(
            generation,
            backends = registry.len(),
            skipped = registry.skipped(),
            conflicts = registry.conflicts(),
            "Descriptor scan complete"
        );

        Ok(registry)
    }
}
