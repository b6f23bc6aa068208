#![cfg_attr(docsrs, feature(doc_cfg))]

//! # snapdoc-bundler
//!
//! Everything the healing engine needs to turn an application into a
//! verifiable snapshot script:
//!
//! - [`Bundler`] / [`ProcessBundler`] - the external snapshot bundler contract
//! - [`assemble_script`] - wraps a bundle in the sandbox shell ([`Blueprint`])
//! - [`ScriptVerifier`] / [`NodeVerifier`] - runs a script in an isolated context
//! - [`WarningsProcessor`] / [`ErrorClassifier`] - map bundler warnings and
//!   verification errors to a [`Consequence`]
//! - [`SnapshotCache`] - on-disk artifacts and warm-start metadata
//!
//! ## Quick Start
//!
//! ```no_run
//! use snapdoc_bundler::{
//!     AssembleConfig, BundleRequest, Bundler, NodeVerifier, ProcessBundler, ScriptVerifier,
//!     assemble_script,
//! };
//! use snapdoc_graph::ModuleKey;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let bundler = ProcessBundler::new("snapshot-bundler");
//! let request = BundleRequest::new("/app", "/app/index.js").doctor(true);
//! let output = bundler.create_bundle(&request).await?;
//!
//! let entry = ModuleKey::new("./index.js")?;
//! let assembled = assemble_script(&output.bundle, &AssembleConfig::new("/app", entry))?;
//!
//! NodeVerifier::default()
//!     .verify(&assembled.script, "<snapshot:entry:./index.js>")
//!     .await?;
//! # Ok(()) }
//! ```

pub mod assemble;
pub mod blueprint;
pub mod bundler;
pub mod cache;
pub mod classify;
pub mod verify;
pub mod warning;

#[cfg(feature = "logging")]
#[cfg_attr(docsrs, doc(cfg(feature = "logging")))]
pub mod logging;

pub use assemble::{
    AssembleConfig, AssembledScript, EMBEDDED_PATH, SourceSection, SourcemapMode, TranslatedRow,
    assemble_bundle_export, assemble_script, read_sections, translate_row,
};
pub use blueprint::{Blueprint, StandIn, StandInKind};
pub use bundler::{BundleOutput, BundleRequest, Bundler, ProcessBundler};
pub use cache::{SnapshotCache, SnapshotMeta, project_hash};
pub use classify::{ClassifyRule, ErrorClassifier, WarningsProcessor};
pub use verify::{ErrorKind, NodeVerifier, ScriptError, ScriptVerifier};
pub use warning::{Consequence, ProcessedWarning, Warning, WarningLocation};

/// Error types for snapdoc-bundler operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The bundler process could not be started or exited non-zero.
    #[error("Bundler failed ({status}): {command}\n{stderr}")]
    BundlerProcess {
        command: String,
        status: String,
        stderr: String,
    },

    /// The bundler ran but its stdout is not the expected JSON result.
    #[error("Unexpected bundler output from `{command}`: {reason}")]
    BundlerOutput { command: String, reason: String },

    /// A hex payload in the bundler output could not be decoded.
    #[error("Invalid hex payload in bundler output: {0}")]
    Hex(#[from] hex::FromHexError),

    /// The snapshot script could not be assembled.
    #[error("Failed to assemble snapshot script: {0}")]
    Assembly(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error from the graph crate.
    #[error(transparent)]
    Graph(#[from] snapdoc_graph::GraphError),
}

/// Result type alias for snapdoc-bundler operations.
pub type Result<T> = std::result::Result<T, Error>;

impl miette::Diagnostic for Error {
    fn code(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        let code = match self {
            Error::BundlerProcess { .. } => "BUNDLER_PROCESS",
            Error::BundlerOutput { .. } => "BUNDLER_OUTPUT",
            Error::Hex(_) => "BUNDLER_OUTPUT",
            Error::Assembly(_) => "ASSEMBLY_ERROR",
            Error::Io(_) => "IO_ERROR",
            Error::Json(_) => "JSON_ERROR",
            Error::Graph(_) => "GRAPH_ERROR",
        };
        Some(Box::new(code))
    }

    fn severity(&self) -> Option<miette::Severity> {
        Some(miette::Severity::Error)
    }

    fn help(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        match self {
            Error::BundlerProcess { command, .. } => Some(Box::new(format!(
                "Re-run the bundler by hand to reproduce:\n  {}",
                command
            ))),
            Error::BundlerOutput { .. } | Error::Hex(_) => Some(Box::new(
                "The bundler must print a single JSON object with `warnings`, `outfiles` and `metafile`. Check that the configured bundler is a snapshot bundler.",
            )),
            Error::Assembly(_) => Some(Box::new(
                "Check that the entry module is part of the bundle.",
            )),
            _ => None,
        }
    }
}
