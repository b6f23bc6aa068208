//! `snapdoc.config.json` and its multi-source loading.
//!
//! Priority: CLI > `SNAPDOC_*` environment > config file > defaults.
//! Relative paths resolve against the working directory the CLI runs in.

mod defaults;
mod loading;
mod project;
mod tests;
mod types;
mod validation;

use std::path::PathBuf;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use defaults::*;
pub use loading::{CONFIG_FILE, ConfigOverrides, env_key_to_field};
pub use project::Project;
pub use types::*;

/// snapdoc configuration, loaded from `snapdoc.config.json`, the environment
/// and CLI arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SnapdocConfig {
    /// Entry module of the application, relative to `baseDir`
    pub entry: PathBuf,

    /// Project root; module keys are relative to it (default: working directory)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_dir: Option<PathBuf>,

    /// Where snapshot artifacts are written (default: `<baseDir>/.snapdoc`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,

    /// Snapshot bundler executable
    #[serde(default = "default_bundler")]
    pub bundler: PathBuf,

    /// Node.js executable used to verify scripts
    #[serde(default = "default_node")]
    pub node: PathBuf,

    /// Concurrent verifications (default: number of CPUs, at most 8)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_workers: Option<usize>,

    /// Time limit per verification in milliseconds; 0 disables the limit
    #[serde(default = "default_verify_timeout_ms")]
    pub verify_timeout_ms: u64,

    /// Shrink the deferred set after healing
    #[serde(default = "default_true")]
    pub optimize: bool,

    /// Initialize healthy modules the entry no longer reaches
    #[serde(default)]
    pub include_healthy_orphans: bool,

    /// Module keys always bundled without rewriting (e.g. `./node_modules/x/index.js`)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub force_no_rewrite: Vec<String>,

    /// Source map output of `snapdoc build`
    #[serde(default)]
    pub sourcemap: SourcemapOption,

    /// Only snapshot `node_modules`; defer every project module up front
    #[serde(default)]
    pub node_modules_only: bool,

    /// Start from the stored results of the previous run when still valid
    #[serde(default = "default_true")]
    pub use_cache: bool,
}

impl SnapdocConfig {
    /// JSON Schema for `snapdoc.config.json`.
    pub fn json_schema() -> Result<serde_json::Value> {
        let schema = schemars::schema_for!(SnapdocConfig);
        Ok(serde_json::to_value(schema)?)
    }

    /// Example `snapdoc.config.json` content.
    pub fn example_config() -> Result<String> {
        Ok(serde_json::to_string_pretty(&Self {
            entry: PathBuf::from("src/index.js"),
            base_dir: None,
            cache_dir: Some(PathBuf::from(".snapdoc")),
            bundler: default_bundler(),
            node: default_node(),
            max_workers: Some(4),
            verify_timeout_ms: default_verify_timeout_ms(),
            optimize: true,
            include_healthy_orphans: false,
            force_no_rewrite: vec!["./node_modules/debug/src/node.js".to_string()],
            sourcemap: SourcemapOption::External,
            node_modules_only: false,
            use_cache: true,
        })?)
    }
}
