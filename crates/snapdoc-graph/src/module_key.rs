use std::borrow::Borrow;
use std::fmt;
use std::path::{Component, Path};

use path_clean::PathClean;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{GraphError, Result};

const RELATIVE_PREFIX: &str = "./";

/// Canonical identifier for a module in the snapshot bundle.
///
/// Keys are project-relative paths with POSIX separators. Keys produced from
/// filesystem paths are always prefixed with `./`; keys taken verbatim from
/// bundler metadata keep whatever shape the bundler chose, which allows bare
/// package-root keys. Keys are stable across rebuilds of the same source tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleKey(String);

impl ModuleKey {
    /// Create a key from a bundler-emitted key, normalizing separators.
    pub fn new(raw: impl AsRef<str>) -> Result<Self> {
        let raw = raw.as_ref();
        if raw.trim().is_empty() {
            return Err(GraphError::InvalidModuleKey {
                key: raw.to_string(),
                reason: "module key is empty".to_string(),
            });
        }
        Ok(Self(raw.replace('\\', "/")))
    }

    /// Create a key from a filesystem path, relative to the project base dir.
    ///
    /// Absolute paths must live under `base_dir`. The result is always `./`
    /// prefixed.
    pub fn from_path(path: &Path, base_dir: &Path) -> Result<Self> {
        let cleaned = if path.is_absolute() {
            path.to_path_buf().clean()
        } else {
            base_dir.join(path).clean()
        };
        let base = base_dir.to_path_buf().clean();

        let relative = cleaned
            .strip_prefix(&base)
            .map_err(|_| GraphError::InvalidModuleKey {
                key: cleaned.display().to_string(),
                reason: format!("path is outside of base directory {}", base.display()),
            })?;

        let parts: Vec<String> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();

        if parts.is_empty() {
            return Err(GraphError::InvalidModuleKey {
                key: cleaned.display().to_string(),
                reason: "path resolves to the base directory itself".to_string(),
            });
        }

        Ok(Self(format!("{RELATIVE_PREFIX}{}", parts.join("/"))))
    }

    /// Borrow the key as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` for bare package-root keys (no `./`, `../` or `/` prefix).
    pub fn is_bare(&self) -> bool {
        !(self.0.starts_with('.') || self.0.starts_with('/'))
    }

    /// Returns `true` if the key points into a `node_modules` directory.
    pub fn is_node_module(&self) -> bool {
        self.0.split('/').any(|segment| segment == "node_modules")
    }

    /// Resolve the key against a base directory into a filesystem path.
    pub fn to_path(&self, base_dir: &Path) -> std::path::PathBuf {
        let trimmed = self.0.strip_prefix(RELATIVE_PREFIX).unwrap_or(&self.0);
        base_dir.join(trimmed).clean()
    }
}

impl fmt::Display for ModuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ModuleKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ModuleKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl Serialize for ModuleKey {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ModuleKey {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        ModuleKey::new(raw).map_err(serde::de::Error::custom)
    }
}
