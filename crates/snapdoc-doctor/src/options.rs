//! Heal configuration.

use std::path::PathBuf;
use std::time::Duration;

use snapdoc_bundler::{Blueprint, SnapshotMeta};
use snapdoc_graph::ModuleKey;

/// Default cap on concurrent verifications.
pub fn default_max_workers() -> usize {
    num_cpus::get().min(8)
}

/// Options for one [`SnapshotDoctor`](crate::SnapshotDoctor).
#[derive(Debug, Clone)]
pub struct HealOptions {
    pub base_dir: PathBuf,
    /// Entry file, absolute or relative to `base_dir`.
    pub entry: PathBuf,
    /// Maximum concurrent verifications within a stage.
    pub max_workers: usize,
    /// Per-verification time limit; `None` waits indefinitely.
    pub verify_timeout: Option<Duration>,
    /// Run the deferred-set optimizer after the heal loop.
    pub optimize: bool,
    /// Keep healthy orphans requireable (skips redundant-deferral pruning).
    pub include_healthy_orphans: bool,
    /// Defer every project module outside `node_modules` up front.
    pub node_modules_only: bool,
    /// Always bundled without rewriting.
    pub force_norewrite: Vec<ModuleKey>,
    /// Sets from a previous run, used as the starting point.
    pub seed: Option<SnapshotMeta>,
    /// Where stage bundles are written for the workers (system temp dir
    /// otherwise).
    pub scratch_dir: Option<PathBuf>,
    pub blueprint: Blueprint,
}

impl HealOptions {
    pub fn new(base_dir: impl Into<PathBuf>, entry: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            entry: entry.into(),
            max_workers: default_max_workers(),
            verify_timeout: Some(snapdoc_bundler::verify::DEFAULT_VERIFY_TIMEOUT),
            optimize: true,
            include_healthy_orphans: false,
            node_modules_only: false,
            force_norewrite: Vec::new(),
            seed: None,
            scratch_dir: None,
            blueprint: Blueprint::default(),
        }
    }

    pub fn max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }

    pub fn verify_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.verify_timeout = timeout;
        self
    }

    pub fn optimize(mut self, optimize: bool) -> Self {
        self.optimize = optimize;
        self
    }

    pub fn include_healthy_orphans(mut self, include: bool) -> Self {
        self.include_healthy_orphans = include;
        self
    }

    pub fn node_modules_only(mut self, enabled: bool) -> Self {
        self.node_modules_only = enabled;
        self
    }

    pub fn force_norewrite(mut self, keys: impl IntoIterator<Item = ModuleKey>) -> Self {
        self.force_norewrite = keys.into_iter().collect();
        self
    }

    pub fn seed(mut self, meta: Option<SnapshotMeta>) -> Self {
        self.seed = meta;
        self
    }

    pub fn scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    pub fn blueprint(mut self, blueprint: Blueprint) -> Self {
        self.blueprint = blueprint;
        self
    }

    /// Entry as an absolute path.
    pub fn entry_path(&self) -> PathBuf {
        if self.entry.is_absolute() {
            self.entry.clone()
        } else {
            self.base_dir.join(&self.entry)
        }
    }
}
