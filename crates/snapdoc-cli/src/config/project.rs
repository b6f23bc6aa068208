use std::path::{Path, PathBuf};
use std::time::Duration;

use snapdoc_bundler::{NodeVerifier, ProcessBundler, SnapshotCache, SnapshotMeta};
use snapdoc_doctor::HealOptions;
use snapdoc_graph::ModuleKey;
use snapdoc_runtime::ModuleNegotiator;

use crate::config::{ConfigOverrides, DEFAULT_CACHE_DIR, SnapdocConfig};
use crate::error::{CliError, ConfigError, Result};

/// A loaded configuration with its paths resolved.
#[derive(Debug, Clone)]
pub struct Project {
    pub config: SnapdocConfig,
    pub base_dir: PathBuf,
    /// Absolute entry path.
    pub entry: PathBuf,
    pub cache_dir: PathBuf,
}

fn resolve_path(path: &Path, cwd: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

impl Project {
    /// Load, validate and resolve the configuration for `cwd`.
    pub fn load(overrides: &ConfigOverrides, config_path: Option<&Path>, cwd: &Path) -> Result<Self> {
        let config = SnapdocConfig::load(overrides, config_path, cwd)?;
        Self::from_config(config, cwd)
    }

    pub fn from_config(config: SnapdocConfig, cwd: &Path) -> Result<Self> {
        config.validate()?;
        let base_dir = match &config.base_dir {
            Some(dir) => resolve_path(dir, cwd),
            None => cwd.to_path_buf(),
        };
        let entry = resolve_path(&config.entry, &base_dir);
        let cache_dir = match &config.cache_dir {
            Some(dir) => resolve_path(dir, cwd),
            None => base_dir.join(DEFAULT_CACHE_DIR),
        };
        Ok(Self {
            config,
            base_dir,
            entry,
            cache_dir,
        })
    }

    pub fn cache(&self) -> SnapshotCache {
        SnapshotCache::new(&self.cache_dir)
    }

    pub fn bundler(&self) -> ProcessBundler {
        ProcessBundler::new(&self.config.bundler)
    }

    /// The pool applies `verifyTimeoutMs`, so the verifier itself runs
    /// without a limit.
    pub fn verifier(&self) -> NodeVerifier {
        NodeVerifier::new(&self.config.node).timeout(None)
    }

    pub fn verify_timeout(&self) -> Option<Duration> {
        match self.config.verify_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    pub fn negotiator(&self) -> ModuleNegotiator {
        ModuleNegotiator::new(&self.base_dir)
    }

    /// Module key of the entry point.
    pub fn entry_key(&self) -> Result<ModuleKey> {
        Ok(self.negotiator().key_for_path(&self.entry)?)
    }

    pub fn force_no_rewrite(&self) -> Result<Vec<ModuleKey>> {
        self.config
            .force_no_rewrite
            .iter()
            .map(|raw| {
                ModuleKey::new(raw).map_err(|e| {
                    CliError::from(ConfigError::InvalidValue {
                        field: "forceNoRewrite".to_string(),
                        value: raw.clone(),
                        hint: e.to_string(),
                    })
                })
            })
            .collect()
    }

    /// Heal options for this project, starting from `seed` when given.
    pub fn heal_options(&self, seed: Option<SnapshotMeta>) -> Result<HealOptions> {
        let mut options = HealOptions::new(&self.base_dir, &self.entry)
            .verify_timeout(self.verify_timeout())
            .optimize(self.config.optimize)
            .include_healthy_orphans(self.config.include_healthy_orphans)
            .node_modules_only(self.config.node_modules_only)
            .force_norewrite(self.force_no_rewrite()?)
            .seed(seed);
        if let Some(max_workers) = self.config.max_workers {
            options = options.max_workers(max_workers);
        }
        Ok(options)
    }
}
