//! # snapdoc-runtime
//!
//! Application-side half of snapshot loading.
//!
//! Once a snapshot is loaded, every `require` has to be answered from one of
//! three places: the module cache the snapshot was created with, a module
//! definition bundled into the snapshot, or the normal Node.js loader.
//!
//! - [`ModuleNegotiator`] turns a `require` request into the module key the
//!   snapshot uses, leaving built-ins and packages outside the project alone.
//! - [`SnapshotLoader`] picks the source for each key and keeps the `loaded`
//!   and `cache` sets that decide when a cached module has gone stale.

pub mod loader;
pub mod negotiator;

pub use loader::{LoadDecision, LoaderStats, SnapshotLoader};
pub use negotiator::{Negotiated, ModuleNegotiator, is_builtin};

use std::path::PathBuf;

/// Error types for snapdoc-runtime operations.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The resolved path is not inside the project root.
    #[error("'{}' is outside of the project root {}", path.display(), root.display())]
    OutsideProject { path: PathBuf, root: PathBuf },

    /// The request cannot be mapped to a module key without the normal loader.
    #[error("Cannot resolve '{request}' to a snapshot module")]
    NotResolvable { request: String },

    /// Error from the graph crate.
    #[error(transparent)]
    Graph(#[from] snapdoc_graph::GraphError),
}

/// Result type alias for snapdoc-runtime operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;

impl miette::Diagnostic for RuntimeError {
    fn code(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        let code = match self {
            RuntimeError::OutsideProject { .. } => "OUTSIDE_PROJECT",
            RuntimeError::NotResolvable { .. } => "NOT_RESOLVABLE",
            RuntimeError::Graph(_) => "GRAPH_ERROR",
        };
        Some(Box::new(code))
    }

    fn help(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        match self {
            RuntimeError::OutsideProject { root, .. } => Some(Box::new(format!(
                "Only files under {} can be part of the snapshot. Check `baseDir`.",
                root.display()
            ))),
            _ => None,
        }
    }
}
