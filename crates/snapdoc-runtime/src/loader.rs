//! Choosing where each required module comes from.

use rustc_hash::FxHashSet;
use snapdoc_graph::{DependencyMap, KeySet, Metafile, ModuleKey};
use tracing::debug;

use crate::Result;

/// Source chosen for one module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadDecision {
    /// Exports from the snapshot's module cache.
    Cached,
    /// Evaluate the definition bundled into the snapshot.
    Definition,
    /// Hand the request to the normal loader.
    Fallback,
}

/// Decision counts, for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoaderStats {
    pub cached: usize,
    pub definitions: usize,
    pub fallbacks: usize,
    pub evictions: usize,
}

/// A cache view with one key left out.
struct Without<'a> {
    set: &'a FxHashSet<ModuleKey>,
    key: &'a ModuleKey,
}

impl KeySet for Without<'_> {
    fn has(&self, key: &ModuleKey) -> bool {
        key != self.key && self.set.contains(key)
    }
}

/// Loader state for one application run.
///
/// A module loaded through the normal loader is *loaded but not cached*.
/// Anything in the snapshot that reaches such a module without passing
/// through a cached module would see a second instance of it, so those
/// modules are not served from the snapshot either.
#[derive(Debug)]
pub struct SnapshotLoader {
    deps: DependencyMap,
    loaded: FxHashSet<ModuleKey>,
    cache: FxHashSet<ModuleKey>,
    stats: LoaderStats,
}

impl SnapshotLoader {
    /// `cached` are the modules initialized while the snapshot was created.
    pub fn new(deps: DependencyMap, cached: impl IntoIterator<Item = ModuleKey>) -> Self {
        let cache: FxHashSet<ModuleKey> = cached.into_iter().collect();
        Self {
            deps,
            loaded: cache.clone(),
            cache,
            stats: LoaderStats::default(),
        }
    }

    pub fn from_metafile(metafile: &Metafile, cached: impl IntoIterator<Item = ModuleKey>) -> Self {
        Self::new(DependencyMap::build(metafile), cached)
    }

    /// Decide how to load `key` and record the load.
    pub fn resolve(&mut self, key: &ModuleKey) -> Result<LoadDecision> {
        if self.cache.contains(key) {
            if self.is_stale(key)? {
                debug!(module = %key, "evicting cached module with a reloaded dependency");
                self.cache.remove(key);
                self.stats.evictions += 1;
            } else {
                self.stats.cached += 1;
                return Ok(LoadDecision::Cached);
            }
        }

        let decision = if self.deps.contains(key)
            && !self
                .deps
                .critical_dependency_loaded_but_not_cached(key, &self.loaded, &self.cache)?
        {
            LoadDecision::Definition
        } else {
            LoadDecision::Fallback
        };

        self.loaded.insert(key.clone());
        match decision {
            LoadDecision::Definition => {
                self.cache.insert(key.clone());
                self.stats.definitions += 1;
            }
            _ => self.stats.fallbacks += 1,
        }
        debug!(module = %key, ?decision, "module resolved");
        Ok(decision)
    }

    /// `true` if a cached module reaches a loaded-but-not-cached dependency.
    pub fn is_stale(&self, key: &ModuleKey) -> Result<bool> {
        if !self.deps.contains(key) {
            return Ok(false);
        }
        let cache = Without {
            set: &self.cache,
            key,
        };
        Ok(self
            .deps
            .critical_dependency_loaded_but_not_cached(key, &self.loaded, &cache)?)
    }

    /// Record a module loaded outside of this loader.
    pub fn mark_loaded(&mut self, key: ModuleKey) {
        self.loaded.insert(key);
    }

    pub fn is_cached(&self, key: &ModuleKey) -> bool {
        self.cache.contains(key)
    }

    pub fn is_loaded(&self, key: &ModuleKey) -> bool {
        self.loaded.contains(key)
    }

    pub fn stats(&self) -> LoaderStats {
        self.stats
    }
}
