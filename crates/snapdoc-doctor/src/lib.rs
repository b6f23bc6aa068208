//! # snapdoc-doctor
//!
//! Iterative healing of a module graph for V8 startup snapshots.
//!
//! The doctor bundles the project, verifies every module as the sole entry
//! point of a snapshot script, and sorts each module into one of three sets:
//!
//! - **healthy** - safe to initialize while the snapshot is created
//! - **deferred** - excluded from the snapshot, loaded at runtime
//! - **norewrite** - included, but bundled without the global-reference
//!   rewrite
//!
//! Each pass rebuilds the bundle with the current sets and re-verifies what
//! is still unclassified, in stages ordered from the leaves of the import
//! graph upward. The loop ends when a pass changes nothing. An optional
//! optimizer then shrinks the deferred set.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use snapdoc_bundler::{NodeVerifier, ProcessBundler};
//! use snapdoc_doctor::{HealOptions, SnapshotDoctor};
//!
//! # async fn run() -> snapdoc_doctor::Result<()> {
//! let options = HealOptions::new("/path/to/app", "index.js");
//! let doctor = SnapshotDoctor::new(
//!     Arc::new(ProcessBundler::new("snapshot-bundler")),
//!     Arc::new(NodeVerifier::new("node").timeout(None)),
//!     options,
//! );
//! let result = doctor.heal().await?;
//! println!("deferred: {:?}", result.deferred);
//! # Ok(())
//! # }
//! ```

pub mod doctor;
pub mod optimize;
pub mod options;
pub mod pool;
pub mod state;

pub use doctor::{HealResult, SnapshotBuild, SnapshotDoctor};
pub use options::{HealOptions, default_max_workers};
pub use pool::{FailedStep, ModuleOutcome, VerifyPool, entry_label};
pub use state::HealState;

use snapdoc_bundler::ScriptError;
use snapdoc_graph::ModuleKey;

/// Error types for snapdoc-doctor operations.
#[derive(Debug, thiserror::Error)]
pub enum HealError {
    /// Creating a bundle failed. Bundler failures are never retried.
    #[error(transparent)]
    Bundle(#[from] snapdoc_bundler::Error),

    /// A verification failed in a way no classification rule covers.
    #[error("Verifying '{key}' failed ({step}) with an unclassified error: {error}")]
    UnclassifiedFailure {
        key: ModuleKey,
        step: FailedStep,
        error: ScriptError,
    },

    /// A verification worker panicked or the pool shut down.
    #[error("Verification worker failed: {0}")]
    TaskPanicked(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error from the graph crate.
    #[error(transparent)]
    Graph(#[from] snapdoc_graph::GraphError),
}

/// Result type alias for snapdoc-doctor operations.
pub type Result<T> = std::result::Result<T, HealError>;

impl miette::Diagnostic for HealError {
    fn code(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        let code = match self {
            HealError::Bundle(_) => "BUNDLE_FAILED",
            HealError::UnclassifiedFailure { .. } => "UNCLASSIFIED_FAILURE",
            HealError::TaskPanicked(_) => "WORKER_FAILED",
            HealError::Io(_) => "IO_ERROR",
            HealError::Graph(_) => "GRAPH_ERROR",
        };
        Some(Box::new(code))
    }

    fn severity(&self) -> Option<miette::Severity> {
        Some(miette::Severity::Error)
    }

    fn help(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        match self {
            HealError::Bundle(inner) => miette::Diagnostic::help(inner),
            HealError::UnclassifiedFailure { key, .. } => Some(Box::new(format!(
                "'{key}' throws an error that is neither a snapshot restriction nor a rewrite failure. Fix the module, or add it to forceNoRewrite if it cannot be rewritten."
            ))),
            HealError::TaskPanicked(_) => Some(Box::new(
                "This is a bug. Re-run with --verbose and report the log.",
            )),
            _ => None,
        }
    }
}
