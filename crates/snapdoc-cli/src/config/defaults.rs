use std::path::PathBuf;

use snapdoc_bundler::verify::DEFAULT_VERIFY_TIMEOUT;

use crate::config::{SnapdocConfig, SourcemapOption};

/// Directory under `baseDir` used when `cacheDir` is not set.
pub const DEFAULT_CACHE_DIR: &str = ".snapdoc";

pub fn default_entry() -> PathBuf {
    PathBuf::from("index.js")
}

pub fn default_bundler() -> PathBuf {
    PathBuf::from("snapshot-bundler")
}

pub fn default_node() -> PathBuf {
    PathBuf::from("node")
}

pub fn default_verify_timeout_ms() -> u64 {
    DEFAULT_VERIFY_TIMEOUT.as_millis() as u64
}

pub fn default_true() -> bool {
    true
}

impl SnapdocConfig {
    /// Configuration used when nothing else is given.
    pub fn default_config() -> Self {
        Self {
            entry: default_entry(),
            base_dir: None,
            cache_dir: None,
            bundler: default_bundler(),
            node: default_node(),
            max_workers: None,
            verify_timeout_ms: default_verify_timeout_ms(),
            optimize: true,
            include_healthy_orphans: false,
            force_no_rewrite: Vec::new(),
            sourcemap: SourcemapOption::None,
            node_modules_only: false,
            use_cache: true,
        }
    }
}
