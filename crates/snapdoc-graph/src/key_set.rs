//! Membership abstraction over the set types callers keep module keys in.

use std::collections::{BTreeSet, HashSet};
use std::hash::BuildHasher;

use crate::ModuleKey;

/// A read-only set of module keys.
///
/// Graph queries take the caller's `loaded` / `cache` / `deferred` sets
/// through this trait so that the runtime loader, the healing engine and
/// tests can each use whatever collection suits them.
pub trait KeySet {
    /// Returns `true` if `key` is a member of the set.
    fn has(&self, key: &ModuleKey) -> bool;
}

impl<S: BuildHasher> KeySet for HashSet<ModuleKey, S> {
    fn has(&self, key: &ModuleKey) -> bool {
        self.contains(key)
    }
}

impl KeySet for BTreeSet<ModuleKey> {
    fn has(&self, key: &ModuleKey) -> bool {
        self.contains(key)
    }
}

impl<T: KeySet + ?Sized> KeySet for &T {
    fn has(&self, key: &ModuleKey) -> bool {
        (**self).has(key)
    }
}

impl<A: KeySet, B: KeySet> KeySet for (A, B) {
    fn has(&self, key: &ModuleKey) -> bool {
        self.0.has(key) || self.1.has(key)
    }
}
