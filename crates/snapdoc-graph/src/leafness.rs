//! Leaf-first ordering of a module subset.

use std::collections::BTreeSet;

use crate::{CircularImports, Metafile, ModuleKey};

/// Order `keys` so that every module comes after the modules it imports.
///
/// Sequencing runs over every module of the metafile, so a dependency reached
/// through a module outside `keys` still orders its importer; only modules in
/// `keys` are emitted. Imports the metafile has no entry for are treated as
/// already sequenced. The sort proceeds in rounds: a module is ready once each
/// of its imports is sequenced, is the module itself, or is a cycle partner.
/// Ready modules of one round are emitted with the ones importing more first,
/// ties broken by key.
///
/// If a round finds nothing ready, the remaining module with the fewest
/// unsequenced imports is taken on its own so the sort always terminates.
pub fn sort_by_leafness<'a>(
    metafile: &Metafile,
    keys: impl IntoIterator<Item = &'a ModuleKey>,
    circular: &CircularImports,
) -> Vec<ModuleKey> {
    let scope: BTreeSet<&ModuleKey> = keys.into_iter().collect();
    let mut remaining: BTreeSet<&ModuleKey> = metafile.keys().collect();
    remaining.extend(scope.iter().copied());
    let known: BTreeSet<&ModuleKey> = remaining.clone();
    let mut sequenced: BTreeSet<&ModuleKey> = BTreeSet::new();
    let mut sorted = Vec::with_capacity(scope.len());

    let unsequenced = |key: &ModuleKey, sequenced: &BTreeSet<&ModuleKey>| -> usize {
        metafile
            .imports_of(key)
            .filter(|import| {
                *import != key
                    && known.contains(import)
                    && !sequenced.contains(import)
                    && !circular.in_cycle_with(key, import)
            })
            .count()
    };

    while !remaining.is_empty() {
        let mut ready: Vec<&ModuleKey> = remaining
            .iter()
            .copied()
            .filter(|key| unsequenced(*key, &sequenced) == 0)
            .collect();

        if ready.is_empty() {
            // Only reachable when cycle information is incomplete.
            let stuck = remaining
                .iter()
                .copied()
                .min_by_key(|key| (unsequenced(*key, &sequenced), *key));
            ready.extend(stuck);
        }

        ready.sort_by(|a, b| {
            metafile
                .import_count(b)
                .cmp(&metafile.import_count(a))
                .then_with(|| a.cmp(b))
        });

        for key in ready {
            remaining.remove(key);
            sequenced.insert(key);
            if scope.contains(key) {
                sorted.push(key.clone());
            }
        }
    }

    sorted
}
