//! Memoized bean path compilation.
//!
//! Uses DashMap so lookups from concurrent requests only contend on the
//! shard holding the key. One cache belongs to one router.

use super::path::{compile, BeanPath};
use super::registry::BeanRegistry;
use crate::error::Error;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::any::TypeId;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

/// Compiled paths keyed by `(root type, path string)`.
#[derive(Debug, Default)]
pub struct BeanPathCache {
    paths: DashMap<(TypeId, String), Arc<BeanPath>>,
    compilations: AtomicU64,
}

impl BeanPathCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached path or compile and insert it.
    ///
    /// Compilation happens while the key's shard is locked, so a path is
    /// compiled at most once. Failures are returned and not cached.
    pub fn get_or_compile(
        &self,
        registry: &BeanRegistry,
        root: TypeId,
        path: &str,
    ) -> Result<Arc<BeanPath>, Error> {
        if let Some(cached) = self.paths.get(&(root, path.to_string())) {
            trace!(path, "Bean path cache hit");
            return Ok(cached.value().clone());
        }

        match self.paths.entry((root, path.to_string())) {
            Entry::Occupied(entry) => Ok(entry.get().clone()),
            Entry::Vacant(entry) => {
                let compiled = Arc::new(compile(registry, root, path)?);
                self.compilations.fetch_add(1, Ordering::Relaxed);
                trace!(path, depth = compiled.depth(), "Compiled bean path");
                entry.insert(compiled.clone());
                Ok(compiled)
            }
        }
    }

    /// Number of cached paths.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Number of successful compilations since creation.
    pub fn compilations(&self) -> u64 {
        self.compilations.load(Ordering::Relaxed)
    }

    pub fn clear(&self) {
        self.paths.clear();
    }
}
