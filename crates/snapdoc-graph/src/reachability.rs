//! Reachability queries over a metafile.

use std::collections::{BTreeSet, VecDeque};

use crate::{KeySet, Metafile, ModuleKey};

/// Modules reachable from `entry` without entering a module in `blocked`.
///
/// The entry itself is part of the result unless it is blocked.
pub fn reachable_avoiding(
    metafile: &Metafile,
    entry: &ModuleKey,
    blocked: &impl KeySet,
) -> BTreeSet<ModuleKey> {
    let mut seen = BTreeSet::new();
    if blocked.has(entry) {
        return seen;
    }

    let mut queue = VecDeque::from([entry.clone()]);
    seen.insert(entry.clone());
    while let Some(key) = queue.pop_front() {
        for import in metafile.imports_of(&key) {
            if blocked.has(import) || seen.contains(import) {
                continue;
            }
            seen.insert(import.clone());
            queue.push_back(import.clone());
        }
    }
    seen
}

/// Healthy modules that the entry only reaches through a deferred module.
///
/// Such a module is verified and bundled but nothing in the snapshot will
/// ever require it, unless it is listed as an extra entry.
pub fn healthy_orphans<'a>(
    metafile: &Metafile,
    entry: &ModuleKey,
    healthy: impl IntoIterator<Item = &'a ModuleKey>,
    deferred: &impl KeySet,
) -> BTreeSet<ModuleKey> {
    let nothing: BTreeSet<ModuleKey> = BTreeSet::new();
    let all = reachable_avoiding(metafile, entry, &nothing);
    let direct = reachable_avoiding(metafile, entry, deferred);

    healthy
        .into_iter()
        .filter(|key| all.contains(*key) && !direct.contains(*key))
        .cloned()
        .collect()
}
