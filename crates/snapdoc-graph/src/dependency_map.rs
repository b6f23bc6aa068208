//! Direct and transitive dependencies per module.
//!
//! Built once per bundle from its metafile and immutable afterwards. The
//! runtime loader uses it to decide whether a module served from the
//! snapshot cache is still consistent with what has been loaded since.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::{GraphError, KeySet, Metafile, ModuleKey, Result};

/// Dependencies of a single module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyNode {
    /// Modules imported directly, exactly the metafile's import edges.
    pub direct_deps: FxHashSet<ModuleKey>,
    /// Transitive closure of `direct_deps`, never containing the module itself.
    pub all_deps: FxHashSet<ModuleKey>,
}

/// Dependency sets for every module of one bundle.
#[derive(Debug, Clone, Default)]
pub struct DependencyMap {
    nodes: FxHashMap<ModuleKey, DependencyNode>,
}

impl DependencyMap {
    /// Build the map from bundler metadata.
    pub fn build(metafile: &Metafile) -> Self {
        let direct: FxHashMap<ModuleKey, FxHashSet<ModuleKey>> = metafile
            .inputs
            .iter()
            .map(|(key, entry)| {
                let deps = entry.imports.iter().map(|r| r.path.clone()).collect();
                (key.clone(), deps)
            })
            .collect();

        let nodes = direct
            .iter()
            .map(|(key, direct_deps)| {
                let all_deps = transitive_closure(key, &direct);
                (
                    key.clone(),
                    DependencyNode {
                        direct_deps: direct_deps.clone(),
                        all_deps,
                    },
                )
            })
            .collect();

        Self { nodes }
    }

    /// Number of modules in the map.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the map has no modules.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns `true` if the module is part of the snapshotted set.
    pub fn contains(&self, key: &ModuleKey) -> bool {
        self.nodes.contains_key(key)
    }

    pub fn get(&self, key: &ModuleKey) -> Option<&DependencyNode> {
        self.nodes.get(key)
    }

    pub fn direct_deps(&self, key: &ModuleKey) -> Option<&FxHashSet<ModuleKey>> {
        self.nodes.get(key).map(|node| &node.direct_deps)
    }

    pub fn all_deps(&self, key: &ModuleKey) -> Option<&FxHashSet<ModuleKey>> {
        self.nodes.get(key).map(|node| &node.all_deps)
    }

    /// Iterate over all modules and their dependency nodes.
    pub fn iter(&self) -> impl Iterator<Item = (&ModuleKey, &DependencyNode)> {
        self.nodes.iter()
    }

    /// `true` iff `id` was loaded during this run but is not in the active cache.
    pub fn loaded_but_not_cached(
        &self,
        id: &ModuleKey,
        loaded: &impl KeySet,
        cache: &impl KeySet,
    ) -> bool {
        loaded.has(id) && !cache.has(id)
    }

    /// `true` iff a dependency of `id` is loaded-but-not-cached and reachable
    /// from `id` without passing through a cached module first.
    ///
    /// A cached module's own subtree is assumed consistent, so the search does
    /// not descend below it.
    ///
    /// # Errors
    ///
    /// - [`GraphError::AlreadyCached`] if `id` itself is cached
    /// - [`GraphError::UnknownModule`] if `id` is not in the map
    pub fn critical_dependency_loaded_but_not_cached(
        &self,
        id: &ModuleKey,
        loaded: &impl KeySet,
        cache: &impl KeySet,
    ) -> Result<bool> {
        if cache.has(id) {
            return Err(GraphError::AlreadyCached(id.clone()));
        }
        let node = self
            .nodes
            .get(id)
            .ok_or_else(|| GraphError::UnknownModule(id.clone()))?;

        let mut visited: FxHashSet<&ModuleKey> = FxHashSet::default();
        visited.insert(id);
        let mut stack: Vec<&ModuleKey> = node.direct_deps.iter().collect();

        while let Some(dep) = stack.pop() {
            if !visited.insert(dep) {
                continue;
            }
            if cache.has(dep) {
                continue;
            }
            if self.loaded_but_not_cached(dep, loaded, cache) {
                return Ok(true);
            }
            if let Some(next) = self.nodes.get(dep) {
                stack.extend(next.direct_deps.iter());
            }
        }

        Ok(false)
    }
}

/// Iterative, cycle-safe closure over direct dependencies.
///
/// A key already in the accumulator is never expanded again, regardless of
/// the path it was reached by.
fn transitive_closure(
    root: &ModuleKey,
    direct: &FxHashMap<ModuleKey, FxHashSet<ModuleKey>>,
) -> FxHashSet<ModuleKey> {
    let mut acc: FxHashSet<ModuleKey> = FxHashSet::default();
    let mut stack: Vec<&ModuleKey> = direct
        .get(root)
        .map(|deps| deps.iter().collect())
        .unwrap_or_default();

    while let Some(key) = stack.pop() {
        if key == root || acc.contains(key) {
            continue;
        }
        acc.insert(key.clone());
        if let Some(deps) = direct.get(key) {
            stack.extend(deps.iter().filter(|dep| !acc.contains(*dep)));
        }
    }

    acc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ImportKind, ImportRecord, InputEntry};
    use std::collections::BTreeSet;

    fn key(raw: &str) -> ModuleKey {
        ModuleKey::new(raw).unwrap()
    }

    fn metafile(edges: &[(&str, &[&str])]) -> Metafile {
        let mut meta = Metafile::default();
        for (from, tos) in edges {
            meta.inputs.insert(
                key(from),
                InputEntry {
                    bytes: 1,
                    imports: tos
                        .iter()
                        .map(|to| ImportRecord {
                            path: key(to),
                            kind: ImportKind::RequireCall,
                        })
                        .collect(),
                    file_info: None,
                },
            );
        }
        meta
    }

    fn set(keys: &[&str]) -> BTreeSet<ModuleKey> {
        keys.iter().map(|k| key(k)).collect()
    }

    fn cyclic() -> Metafile {
        metafile(&[
            ("ROOT", &["FOO"]),
            ("FOO", &["BAR"]),
            ("BAR", &["BAZ"]),
            ("BAZ", &["FOZ", "FOO"]),
            ("FOZ", &[]),
        ])
    }

    #[test]
    fn closure_terminates_on_cycles() {
        let map = DependencyMap::build(&cyclic());
        let baz: BTreeSet<_> = map.all_deps(&key("BAZ")).unwrap().iter().cloned().collect();
        assert_eq!(baz, set(&["FOZ", "FOO", "BAR"]));

        let root: BTreeSet<_> = map.all_deps(&key("ROOT")).unwrap().iter().cloned().collect();
        assert_eq!(root, set(&["FOO", "BAR", "BAZ", "FOZ"]));
    }

    #[test]
    fn direct_deps_match_metafile_edges() {
        let map = DependencyMap::build(&cyclic());
        let baz: BTreeSet<_> = map.direct_deps(&key("BAZ")).unwrap().iter().cloned().collect();
        assert_eq!(baz, set(&["FOZ", "FOO"]));
        assert!(map.direct_deps(&key("FOZ")).unwrap().is_empty());
        assert_eq!(map.len(), 5);
    }

    #[test]
    fn loaded_but_not_cached() {
        let map = DependencyMap::build(&cyclic());
        let loaded = set(&["FOO", "BAR"]);
        let cache = set(&["FOO"]);
        assert!(!map.loaded_but_not_cached(&key("FOO"), &loaded, &cache));
        assert!(map.loaded_but_not_cached(&key("BAR"), &loaded, &cache));
        assert!(!map.loaded_but_not_cached(&key("BAZ"), &loaded, &cache));
    }

    #[test]
    fn critical_dependency_found_through_uncached_path() {
        let map = DependencyMap::build(&metafile(&[
            ("A", &["B"]),
            ("B", &["C"]),
            ("C", &[]),
        ]));
        let loaded = set(&["C"]);
        let cache = set(&[]);
        assert!(
            map.critical_dependency_loaded_but_not_cached(&key("A"), &loaded, &cache)
                .unwrap()
        );
    }

    #[test]
    fn critical_dependency_search_stops_at_cached_module() {
        let map = DependencyMap::build(&metafile(&[
            ("A", &["B"]),
            ("B", &["C"]),
            ("C", &[]),
        ]));
        let loaded = set(&["B", "C"]);
        let cache = set(&["B"]);
        assert!(
            !map.critical_dependency_loaded_but_not_cached(&key("A"), &loaded, &cache)
                .unwrap()
        );
    }

    #[test]
    fn critical_dependency_rejects_cached_and_unknown_modules() {
        let map = DependencyMap::build(&cyclic());
        let loaded = set(&[]);
        let cache = set(&["ROOT"]);
        assert!(matches!(
            map.critical_dependency_loaded_but_not_cached(&key("ROOT"), &loaded, &cache),
            Err(GraphError::AlreadyCached(_))
        ));
        assert!(matches!(
            map.critical_dependency_loaded_but_not_cached(&key("NOPE"), &loaded, &cache),
            Err(GraphError::UnknownModule(_))
        ));
    }

    #[test]
    fn critical_dependency_terminates_on_cycles() {
        let map = DependencyMap::build(&cyclic());
        let loaded = set(&[]);
        let cache = set(&[]);
        assert!(
            !map.critical_dependency_loaded_but_not_cached(&key("ROOT"), &loaded, &cache)
                .unwrap()
        );
    }
}
