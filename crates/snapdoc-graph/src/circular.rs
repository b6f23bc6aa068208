//! Circular import detection.
//!
//! Two views are kept:
//!
//! - **direct**: for each module, the modules it imports that import it back
//!   (one-hop mutual imports).
//! - **components**: strongly connected components of the import graph, so
//!   that longer cycles (`A -> B -> C -> A`) are recognized as well.
//!
//! Algorithms that wait for all imports of a module to be handled before
//! processing it treat cycle partners as already handled.

use std::collections::{BTreeMap, BTreeSet};

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::{Metafile, ModuleKey};

/// Circular import information for one bundle.
#[derive(Debug, Clone, Default)]
pub struct CircularImports {
    direct: BTreeMap<ModuleKey, BTreeSet<ModuleKey>>,
    component_of: FxHashMap<ModuleKey, usize>,
    components: Vec<Vec<ModuleKey>>,
}

impl CircularImports {
    /// Detect circular imports for `entries` in `metafile`.
    ///
    /// A module `p` imported by `key` is a direct partner of `key` iff `p`'s
    /// own imports contain `key`. Only modules with at least one partner get
    /// an entry in the direct map.
    pub fn detect<'a>(
        metafile: &Metafile,
        entries: impl IntoIterator<Item = &'a ModuleKey>,
    ) -> Self {
        let mut direct = BTreeMap::new();
        for key in entries {
            let partners: BTreeSet<ModuleKey> = metafile
                .imports_of(key)
                .filter(|imported| metafile.imports_of(imported).any(|back| back == key))
                .cloned()
                .collect();
            if !partners.is_empty() {
                direct.insert(key.clone(), partners);
            }
        }

        let (component_of, components) = strongly_connected(metafile);
        Self {
            direct,
            component_of,
            components,
        }
    }

    /// Detect circular imports for every module in the metafile.
    pub fn detect_all(metafile: &Metafile) -> Self {
        Self::detect(metafile, metafile.keys())
    }

    /// Direct (one-hop) partners of `key`.
    pub fn direct_partners(&self, key: &ModuleKey) -> Option<&BTreeSet<ModuleKey>> {
        self.direct.get(key)
    }

    /// The direct map, `key -> partners`.
    pub fn as_map(&self) -> &BTreeMap<ModuleKey, BTreeSet<ModuleKey>> {
        &self.direct
    }

    /// `true` iff `key` and `other` import each other directly.
    pub fn is_direct_partner(&self, key: &ModuleKey, other: &ModuleKey) -> bool {
        self.direct
            .get(key)
            .is_some_and(|partners| partners.contains(other))
    }

    /// `true` iff `key` and `other` are on a common import cycle of any length.
    pub fn in_cycle_with(&self, key: &ModuleKey, other: &ModuleKey) -> bool {
        if key == other {
            return false;
        }
        if self.is_direct_partner(key, other) {
            return true;
        }
        match (self.component_of.get(key), self.component_of.get(other)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// All modules on a common cycle with `key` (direct partners included).
    pub fn cycle_partners(&self, key: &ModuleKey) -> BTreeSet<ModuleKey> {
        let mut partners: BTreeSet<ModuleKey> =
            self.direct.get(key).cloned().unwrap_or_default();
        if let Some(index) = self.component_of.get(key) {
            partners.extend(
                self.components[*index]
                    .iter()
                    .filter(|member| *member != key)
                    .cloned(),
            );
        }
        partners
    }

    /// Non-trivial strongly connected components (two or more modules).
    pub fn cycles(&self) -> &[Vec<ModuleKey>] {
        &self.components
    }

    /// Returns `true` if no circular imports were found.
    pub fn is_empty(&self) -> bool {
        self.direct.is_empty() && self.components.is_empty()
    }
}

fn strongly_connected(
    metafile: &Metafile,
) -> (FxHashMap<ModuleKey, usize>, Vec<Vec<ModuleKey>>) {
    let mut graph: DiGraph<ModuleKey, ()> = DiGraph::new();
    let mut indices: FxHashMap<ModuleKey, NodeIndex> = FxHashMap::default();

    let mut node = |graph: &mut DiGraph<ModuleKey, ()>, key: &ModuleKey| -> NodeIndex {
        *indices
            .entry(key.clone())
            .or_insert_with(|| graph.add_node(key.clone()))
    };

    for (key, entry) in &metafile.inputs {
        let from = node(&mut graph, key);
        let mut seen: FxHashSet<&ModuleKey> = FxHashSet::default();
        for record in &entry.imports {
            if record.path == *key || !seen.insert(&record.path) {
                continue;
            }
            let to = node(&mut graph, &record.path);
            graph.add_edge(from, to, ());
        }
    }

    let mut component_of = FxHashMap::default();
    let mut components = Vec::new();
    for scc in tarjan_scc(&graph) {
        if scc.len() < 2 {
            continue;
        }
        let mut members: Vec<ModuleKey> = scc.iter().map(|ix| graph[*ix].clone()).collect();
        members.sort();
        let index = components.len();
        for member in &members {
            component_of.insert(member.clone(), index);
        }
        components.push(members);
    }
    components.sort();
    // Re-index after sorting so lookups stay consistent.
    component_of.clear();
    for (index, members) in components.iter().enumerate() {
        for member in members {
            component_of.insert(member.clone(), index);
        }
    }

    (component_of, components)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ImportKind, ImportRecord, InputEntry};

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

    #[test]
    fn detects_direct_mutual_imports() {
        let meta = metafile(&[
            ("./a.js", &["./b.js", "./c.js"]),
            ("./b.js", &["./a.js"]),
            ("./c.js", &[]),
        ]);
        let circular = CircularImports::detect_all(&meta);

        let a_partners: Vec<_> = circular
            .direct_partners(&key("./a.js"))
            .unwrap()
            .iter()
            .map(|k| k.as_str())
            .collect();
        assert_eq!(a_partners, vec!["./b.js"]);
        assert!(circular.is_direct_partner(&key("./b.js"), &key("./a.js")));
        assert!(circular.direct_partners(&key("./c.js")).is_none());
    }

    #[test]
    fn longer_cycles_are_not_direct_partners() {
        let meta = metafile(&[
            ("./a.js", &["./b.js"]),
            ("./b.js", &["./c.js"]),
            ("./c.js", &["./a.js"]),
        ]);
        let circular = CircularImports::detect_all(&meta);

        assert!(circular.as_map().is_empty());
        assert!(circular.in_cycle_with(&key("./a.js"), &key("./c.js")));
        assert_eq!(circular.cycles().len(), 1);
        assert_eq!(circular.cycle_partners(&key("./b.js")).len(), 2);
    }

    #[test]
    fn acyclic_graph_has_no_cycles() {
        let meta = metafile(&[("./a.js", &["./b.js"]), ("./b.js", &[])]);
        let circular = CircularImports::detect_all(&meta);
        assert!(circular.is_empty());
        assert!(!circular.in_cycle_with(&key("./a.js"), &key("./b.js")));
    }

    #[test]
    fn detect_only_examines_given_entries() {
        let meta = metafile(&[("./a.js", &["./b.js"]), ("./b.js", &["./a.js"])]);
        let only_a = [key("./a.js")];
        let circular = CircularImports::detect(&meta, only_a.iter());
        assert!(circular.direct_partners(&key("./a.js")).is_some());
        assert!(circular.direct_partners(&key("./b.js")).is_none());
    }
}
