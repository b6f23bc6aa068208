//! Working state of one heal run.
//!
//! `HealState` is a value: every step takes the current state and returns
//! the next one. Verification workers never see it; the coordinator folds
//! their outcomes in after each stage barrier.

use std::collections::BTreeSet;

use snapdoc_graph::ModuleKey;

/// Module sets of one heal run.
///
/// `healthy`, `deferred` and `norewrite` are pairwise disjoint whenever a
/// pass starts. `need_defer` / `need_norewrite` collect the current pass's
/// findings until [`HealState::merge_needs`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HealState {
    pub healthy: BTreeSet<ModuleKey>,
    pub deferred: BTreeSet<ModuleKey>,
    pub norewrite: BTreeSet<ModuleKey>,
    pub need_defer: BTreeSet<ModuleKey>,
    pub need_norewrite: BTreeSet<ModuleKey>,
}

impl HealState {
    /// State seeded with previously known sets.
    ///
    /// Overlaps are resolved towards the more conservative set: deferred
    /// beats no-rewrite, which beats healthy.
    pub fn seeded(
        healthy: impl IntoIterator<Item = ModuleKey>,
        deferred: impl IntoIterator<Item = ModuleKey>,
        norewrite: impl IntoIterator<Item = ModuleKey>,
    ) -> Self {
        let deferred: BTreeSet<ModuleKey> = deferred.into_iter().collect();
        let norewrite: BTreeSet<ModuleKey> = norewrite
            .into_iter()
            .filter(|key| !deferred.contains(key))
            .collect();
        let healthy = healthy
            .into_iter()
            .filter(|key| !deferred.contains(key) && !norewrite.contains(key))
            .collect();
        Self {
            healthy,
            deferred,
            norewrite,
            ..Self::default()
        }
    }

    /// `true` once the module has a final classification.
    pub fn is_settled(&self, key: &ModuleKey) -> bool {
        self.healthy.contains(key) || self.deferred.contains(key) || self.norewrite.contains(key)
    }

    /// `true` if the module was flagged during the current pass.
    pub fn is_flagged(&self, key: &ModuleKey) -> bool {
        self.need_defer.contains(key) || self.need_norewrite.contains(key)
    }

    pub fn with_healthy(mut self, key: ModuleKey) -> Self {
        self.healthy.insert(key);
        self
    }

    pub fn with_need_defer(mut self, key: ModuleKey) -> Self {
        self.need_defer.insert(key);
        self
    }

    pub fn with_need_norewrite(mut self, key: ModuleKey) -> Self {
        self.need_norewrite.insert(key);
        self
    }

    /// Add modules to `deferred` directly (warm start, node-modules-only mode).
    pub fn with_deferred(mut self, keys: impl IntoIterator<Item = ModuleKey>) -> Self {
        for key in keys {
            self.healthy.remove(&key);
            self.norewrite.remove(&key);
            self.deferred.insert(key);
        }
        self
    }

    /// Move this pass's findings into `deferred` / `norewrite`.
    ///
    /// Returns the next state and whether any module changed set. A module
    /// flagged for both ends up deferred.
    pub fn merge_needs(self) -> (Self, bool) {
        let Self {
            mut healthy,
            mut deferred,
            mut norewrite,
            need_defer,
            need_norewrite,
        } = self;

        let mut changed = false;
        for key in need_norewrite {
            if deferred.contains(&key) || need_defer.contains(&key) {
                continue;
            }
            healthy.remove(&key);
            changed |= norewrite.insert(key);
        }
        for key in need_defer {
            healthy.remove(&key);
            norewrite.remove(&key);
            changed |= deferred.insert(key);
        }

        let next = Self {
            healthy,
            deferred,
            norewrite,
            ..Self::default()
        };
        (next, changed)
    }

    /// Number of modules with a final classification.
    pub fn settled_count(&self) -> usize {
        self.healthy.len() + self.deferred.len() + self.norewrite.len()
    }

    /// `true` if no module is in more than one of the final sets.
    pub fn is_partition(&self) -> bool {
        self.healthy.is_disjoint(&self.deferred)
            && self.healthy.is_disjoint(&self.norewrite)
            && self.deferred.is_disjoint(&self.norewrite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(raw: &str) -> ModuleKey {
        ModuleKey::new(raw).unwrap()
    }

    #[test]
    fn seeding_resolves_overlaps_conservatively() {
        let state = HealState::seeded(
            [key("./a.js"), key("./b.js"), key("./c.js")],
            [key("./a.js")],
            [key("./a.js"), key("./b.js")],
        );
        assert!(state.is_partition());
        assert!(state.deferred.contains(&key("./a.js")));
        assert!(state.norewrite.contains(&key("./b.js")));
        assert_eq!(state.healthy.len(), 1);
    }

    #[test]
    fn merge_moves_modules_out_of_healthy() {
        let state = HealState::default()
            .with_healthy(key("./a.js"))
            .with_healthy(key("./b.js"))
            .with_need_defer(key("./a.js"))
            .with_need_norewrite(key("./b.js"));

        let (next, changed) = state.merge_needs();
        assert!(changed);
        assert!(next.is_partition());
        assert!(next.healthy.is_empty());
        assert!(next.need_defer.is_empty() && next.need_norewrite.is_empty());
        assert_eq!(next.settled_count(), 2);
    }

    #[test]
    fn defer_wins_over_norewrite() {
        let state = HealState::default()
            .with_need_defer(key("./a.js"))
            .with_need_norewrite(key("./a.js"));
        let (next, _) = state.merge_needs();
        assert!(next.deferred.contains(&key("./a.js")));
        assert!(next.norewrite.is_empty());
    }

    #[test]
    fn merging_known_modules_is_no_change() {
        let state = HealState::seeded([], [key("./a.js")], [key("./b.js")])
            .with_need_defer(key("./a.js"))
            .with_need_norewrite(key("./b.js"));
        let (_, changed) = state.merge_needs();
        assert!(!changed);
    }
}
