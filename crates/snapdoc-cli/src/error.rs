//! Error types for the snapdoc CLI.
//!
//! Library errors (`HealError`, the bundler's `Error`, `RuntimeError`) pass
//! through unchanged so their miette codes and help survive to the report.
//! CLI-specific failures carry a `Hint:` line in their message.
//!
//! ```rust,no_run
//! use snapdoc_cli::error::{Result, ResultExt};
//! use std::path::Path;
//!
//! fn read_script(path: &Path) -> Result<String> {
//!     std::fs::read_to_string(path)
//!         .with_path(path)
//!         .with_hint("Run `snapdoc build` first")
//! }
//! ```

mod report;

use std::path::PathBuf;

use thiserror::Error;

pub use report::cli_error_to_miette;

/// Top-level CLI error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration errors (file not found, invalid values, ...)
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Errors preparing or writing snapshot artifacts
    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    /// The heal run failed
    #[error(transparent)]
    Heal(#[from] snapdoc_doctor::HealError),

    /// Bundling, assembling or reading snapshot artifacts failed
    #[error(transparent)]
    Bundle(#[from] snapdoc_bundler::Error),

    /// A path could not be mapped to a module key
    #[error(transparent)]
    Runtime(#[from] snapdoc_runtime::RuntimeError),

    /// Module graph errors
    #[error("Module graph error: {0}")]
    Graph(#[from] snapdoc_graph::GraphError),

    /// Invalid command-line arguments or options
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// File or directory not found
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// I/O errors from file system operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Errors with a custom message
    #[error("{0}")]
    Custom(String),
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly requested config file does not exist
    #[error("Config file not found: {}\n\nHint: Create a snapdoc.config.json file or pass --config <path>", .0.display())]
    NotFound(PathBuf),

    /// Config file or environment could not be merged into a configuration
    #[error("Invalid configuration: {0}\n\nHint: Check snapdoc.config.json and SNAPDOC_* variables against `snapdoc check --print-schema`")]
    Invalid(String),

    /// Missing required configuration field
    #[error("Missing required field: {field}\n\nHint: {hint}")]
    MissingField {
        /// Name of the missing field
        field: String,
        /// How to provide it
        hint: String,
    },

    /// Invalid value for a configuration option
    #[error("Invalid value for '{field}': {value}\n\nHint: {hint}")]
    InvalidValue {
        /// Name of the field
        field: String,
        /// The rejected value
        value: String,
        /// What is accepted instead
        hint: String,
    },
}

/// Errors around the project and its snapshot artifacts.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Entry point file doesn't exist
    #[error("Entry point not found: {}\n\nHint: Check the 'entry' field in your config or --entry argument", .0.display())]
    EntryNotFound(PathBuf),

    /// Project directory doesn't exist
    #[error("Project directory not found: {}\n\nHint: Check 'baseDir' in your config or --base-dir argument", .0.display())]
    BaseDirNotFound(PathBuf),

    /// No assembled snapshot script in the cache directory
    #[error("No snapshot script at {}\n\nHint: Run `snapdoc build` first or pass --script <path>", .0.display())]
    ScriptNotFound(PathBuf),

    /// Failed to write a snapshot artifact
    #[error("Failed to write {}: {error}\n\nHint: Check permissions of the cache directory ('cacheDir')", .path.display())]
    ArtifactWriteFailed {
        /// Artifact path
        path: PathBuf,
        /// Underlying error
        error: String,
    },
}

/// Result type alias using `CliError` as the default error type.
pub type Result<T, E = CliError> = std::result::Result<T, E>;

/// Extension trait for adding context to `Result` types.
pub trait ResultExt<T> {
    /// Turn a not-found I/O error into [`CliError::FileNotFound`] for `path`.
    fn with_path(self, path: impl AsRef<std::path::Path>) -> Result<T>;

    /// Append a `Hint:` line to the error message.
    fn with_hint(self, hint: impl std::fmt::Display) -> Result<T>;

    /// Prefix the error message.
    fn context(self, msg: impl std::fmt::Display) -> Result<T>;
}

impl<T, E: Into<CliError>> ResultExt<T> for std::result::Result<T, E> {
    fn with_path(self, path: impl AsRef<std::path::Path>) -> Result<T> {
        self.map_err(|e| {
            let err: CliError = e.into();
            match err {
            CliError::Io(io_err) if io_err.kind() == std::io::ErrorKind::NotFound => {
                CliError::FileNotFound(path.as_ref().to_path_buf())
            }
            CliError::Bundle(snapdoc_bundler::Error::Io(io_err))
                if io_err.kind() == std::io::ErrorKind::NotFound =>
            {
                CliError::FileNotFound(path.as_ref().to_path_buf())
            }
            other => other,
            }
        })
    }

    fn with_hint(self, hint: impl std::fmt::Display) -> Result<T> {
        self.map_err(|e| {
            let err: CliError = e.into();
            CliError::Custom(format!("{}\n\nHint: {}", err, hint))
        })
    }

    fn context(self, msg: impl std::fmt::Display) -> Result<T> {
        self.map_err(|e| {
            let err: CliError = e.into();
            CliError::Custom(format!("{}: {}", msg, err))
        })
    }
}
