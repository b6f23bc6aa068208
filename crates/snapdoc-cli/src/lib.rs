//! snapdoc CLI library.
//!
//! The binary is a thin wrapper around these modules so the commands can be
//! driven from integration tests.
//!
//! - [`cli`] - argument definitions (clap)
//! - [`config`] - `snapdoc.config.json` loading and validation
//! - [`commands`] - `heal`, `build`, `graph`, `translate` and `check`
//! - [`error`] - CLI error types and miette conversion
//! - [`logger`] - tracing subscriber setup
//! - [`ui`] - terminal output helpers

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logger;
pub mod ui;

pub use error::{BuildError, CliError, ConfigError, Result, ResultExt};
