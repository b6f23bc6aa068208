//! # snapdoc-graph
//!
//! Pure graph data structures for the module graphs produced by the snapshot
//! bundler.
//!
//! This crate has no I/O and no knowledge of how bundles are produced or
//! verified. It turns the bundler's metadata into the structures the healing
//! engine and the runtime loader query:
//!
//! - [`ModuleKey`] - project-relative, POSIX-style module identifiers
//! - [`Metafile`] - the `inputs` / `resolverMap` metadata emitted per bundle
//! - [`DependencyMap`] - direct and transitive dependencies per module, plus
//!   the cache-invalidation queries used at application runtime
//! - [`CircularImports`] - one-hop mutual imports and strongly connected
//!   components, used to keep fixed-point algorithms from waiting on a cycle
//! - [`sort_by_leafness`] - dependency-safe, leaf-first ordering
//! - [`healthy_orphans`] - healthy modules only reachable through deferred ones
//!
//! ## Architecture
//!
//! ```text
//!   bundler metafile (JSON)
//!            │
//!            ▼
//!      ┌───────────┐
//!      │ Metafile  │  inputs: key -> { bytes, imports, fileInfo }
//!      └─────┬─────┘
//!            │
//!     ┌──────┼───────────────┬────────────────┐
//!     ▼      ▼               ▼                ▼
//! DependencyMap   CircularImports   sort_by_leafness   healthy_orphans
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use snapdoc_graph::{DependencyMap, Metafile, ModuleKey};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let metafile = Metafile::from_json(r#"{
//!     "inputs": {
//!         "./entry.js": { "bytes": 10, "imports": [{ "path": "./util.js", "kind": "require-call" }] },
//!         "./util.js": { "bytes": 5, "imports": [] }
//!     }
//! }"#)?;
//!
//! let deps = DependencyMap::build(&metafile);
//! let entry = ModuleKey::new("./entry.js")?;
//! assert!(deps.all_deps(&entry).unwrap().contains(&ModuleKey::new("./util.js")?));
//! # Ok(())
//! # }
//! ```

pub mod circular;
pub mod dependency_map;
pub mod key_set;
pub mod leafness;
pub mod metafile;
pub mod module_key;
pub mod reachability;

pub use circular::CircularImports;
pub use dependency_map::{DependencyMap, DependencyNode};
pub use key_set::KeySet;
pub use leafness::sort_by_leafness;
pub use metafile::{FileInfo, ImportKind, ImportRecord, InputEntry, Metafile};
pub use module_key::ModuleKey;
pub use reachability::{healthy_orphans, reachable_avoiding};

/// Error types for graph operations.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// The module has no entry in the dependency map (it is outside the
    /// snapshotted set).
    #[error("Module '{0}' is not part of the dependency map")]
    UnknownModule(ModuleKey),

    /// The module is already in the active cache; cached modules must not be
    /// re-verified.
    #[error("Module '{0}' is already cached and must not be re-verified")]
    AlreadyCached(ModuleKey),

    /// A module key could not be constructed.
    #[error("Invalid module key '{key}': {reason}")]
    InvalidModuleKey { key: String, reason: String },

    /// Metadata JSON could not be parsed.
    #[error("Invalid metafile: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for graph operations.
pub type Result<T> = std::result::Result<T, GraphError>;

#[cfg(test)]
mod tests;
