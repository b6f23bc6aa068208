//! Shared helpers for command implementations.

use std::path::PathBuf;

use snapdoc_bundler::SnapshotMeta;
use tracing::warn;

use crate::config::Project;
use crate::error::{BuildError, CliError, Result};
use crate::ui;

pub fn get_cwd() -> Result<PathBuf> {
    std::env::current_dir().map_err(CliError::from)
}

/// The project directory and entry file must exist before bundling.
pub fn validate_project(project: &Project) -> Result<()> {
    if !project.base_dir.is_dir() {
        return Err(BuildError::BaseDirNotFound(project.base_dir.clone()).into());
    }
    if !project.entry.is_file() {
        return Err(BuildError::EntryNotFound(project.entry.clone()).into());
    }
    Ok(())
}

/// Stored results still valid for the project, if `useCache` allows them.
///
/// Unreadable metadata is reported and ignored; the heal then starts from
/// scratch and overwrites it.
pub fn load_seed(project: &Project) -> Option<SnapshotMeta> {
    if !project.config.use_cache {
        return None;
    }
    match project.cache().load_fresh_meta(&project.base_dir) {
        Ok(seed) => seed,
        Err(e) => {
            warn!(error = %e, "ignoring unreadable snapshot metadata");
            ui::warning(&format!("Ignoring stored snapshot metadata: {e}"));
            None
        }
    }
}
