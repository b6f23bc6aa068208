//! On-disk snapshot artifacts.
//!
//! Everything lives in one per-project directory:
//!
//! - `snapshot-meta.json` - final healthy / deferred / norewrite sets and the
//!   project hash they were computed for
//! - `snapshot.js` - the assembled script
//! - `snapshot-bundle.js` - definitions-only variant for diagnostics
//! - `snapshot.js.map` - external source map, when requested
//!
//! The stored sets are only reused while the project hash matches, so any
//! change to the manifest or lockfile starts the next heal from scratch.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use blake3::Hasher;
use serde::{Deserialize, Serialize};
use snapdoc_graph::ModuleKey;
use tracing::{debug, info};

use crate::Result;

pub const META_FILE: &str = "snapshot-meta.json";
pub const SCRIPT_FILE: &str = "snapshot.js";
pub const BUNDLE_FILE: &str = "snapshot-bundle.js";
pub const SOURCE_MAP_FILE: &str = "snapshot.js.map";

/// Files whose content decides whether stored heal results are still valid.
const HASHED_FILES: &[&str] = &[
    "package.json",
    "yarn.lock",
    "package-lock.json",
    "pnpm-lock.yaml",
];

/// Persisted heal results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMeta {
    #[serde(default)]
    pub norewrite: Vec<ModuleKey>,
    #[serde(default)]
    pub deferred: Vec<ModuleKey>,
    #[serde(default)]
    pub healthy: Vec<ModuleKey>,
    /// [`project_hash`] at the time the sets were computed.
    #[serde(default)]
    pub deferred_hash: String,
}

/// BLAKE3 hex digest over `package.json` and whichever lockfiles exist.
///
/// Each present file contributes its name and content, in a fixed order.
pub fn project_hash(base_dir: &Path) -> Result<String> {
    let mut hasher = Hasher::new();
    for name in HASHED_FILES {
        match fs::read(base_dir.join(name)) {
            Ok(contents) => {
                hasher.update(name.as_bytes());
                hasher.update(&[0]);
                hasher.update(&(contents.len() as u64).to_le_bytes());
                hasher.update(&contents);
            }
            Err(err) if err.kind() == ErrorKind::NotFound => continue,
            Err(err) => return Err(err.into()),
        }
    }
    Ok(hasher.finalize().to_hex().to_string())
}

/// The snapshot artifact directory of one project.
#[derive(Debug, Clone)]
pub struct SnapshotCache {
    dir: PathBuf,
}

impl SnapshotCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn meta_path(&self) -> PathBuf {
        self.dir.join(META_FILE)
    }

    pub fn script_path(&self) -> PathBuf {
        self.dir.join(SCRIPT_FILE)
    }

    pub fn bundle_path(&self) -> PathBuf {
        self.dir.join(BUNDLE_FILE)
    }

    pub fn source_map_path(&self) -> PathBuf {
        self.dir.join(SOURCE_MAP_FILE)
    }

    /// Stored metadata, or `None` if nothing was stored yet.
    pub fn load_meta(&self) -> Result<Option<SnapshotMeta>> {
        match fs::read(self.meta_path()) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Stored metadata, only if it was computed for the current project state.
    pub fn load_fresh_meta(&self, base_dir: &Path) -> Result<Option<SnapshotMeta>> {
        let Some(meta) = self.load_meta()? else {
            debug!(path = %self.meta_path().display(), "no stored snapshot metadata");
            return Ok(None);
        };
        let current = project_hash(base_dir)?;
        if meta.deferred_hash != current {
            info!("project dependencies changed, ignoring stored snapshot metadata");
            return Ok(None);
        }
        Ok(Some(meta))
    }

    pub fn store_meta(&self, meta: &SnapshotMeta) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.meta_path(), serde_json::to_vec_pretty(meta)?)?;
        Ok(())
    }

    pub fn write_script(&self, script: &str) -> Result<PathBuf> {
        self.write(SCRIPT_FILE, script)
    }

    pub fn write_bundle(&self, bundle: &str) -> Result<PathBuf> {
        self.write(BUNDLE_FILE, bundle)
    }

    pub fn write_source_map(&self, map: &str) -> Result<PathBuf> {
        self.write(SOURCE_MAP_FILE, map)
    }

    pub fn read_script(&self) -> Result<String> {
        Ok(fs::read_to_string(self.script_path())?)
    }

    fn write(&self, name: &str, contents: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(name);
        fs::write(&path, contents)?;
        Ok(path)
    }
}
