//! Bundler metadata model.
//!
//! The snapshot bundler emits a metafile describing every module it placed
//! in the bundle: its size, its import edges and where it lives on disk.
//! Modules excluded from the bundle (deferred or external) can still appear
//! as import targets without having an `inputs` entry of their own.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{ModuleKey, Result};

/// Module metadata for one bundle build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metafile {
    /// Every module included in the bundle, keyed by module key.
    #[serde(default)]
    pub inputs: BTreeMap<ModuleKey, InputEntry>,

    /// Bundler resolver decisions (`"<importer>***<request>" -> resolved`).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub resolver_map: BTreeMap<String, String>,
}

/// Metadata for a single module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputEntry {
    /// Source size in bytes.
    #[serde(default)]
    pub bytes: u64,

    /// Import edges, in source order.
    #[serde(default)]
    pub imports: Vec<ImportRecord>,

    /// Resolved location on disk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_info: Option<FileInfo>,
}

/// One import edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRecord {
    pub path: ModuleKey,
    pub kind: ImportKind,
}

/// Resolved file information for a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    pub full_path: PathBuf,
}

/// How an import edge was expressed in source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ImportKind {
    RequireCall,
    ImportStatement,
    DynamicImport,
    RequireResolve,
    ImportRule,
    UrlToken,
    Other(String),
}

impl ImportKind {
    pub fn as_str(&self) -> &str {
        match self {
            ImportKind::RequireCall => "require-call",
            ImportKind::ImportStatement => "import-statement",
            ImportKind::DynamicImport => "dynamic-import",
            ImportKind::RequireResolve => "require-resolve",
            ImportKind::ImportRule => "import-rule",
            ImportKind::UrlToken => "url-token",
            ImportKind::Other(other) => other,
        }
    }
}

impl From<&str> for ImportKind {
    fn from(value: &str) -> Self {
        match value {
            "require-call" => ImportKind::RequireCall,
            "import-statement" => ImportKind::ImportStatement,
            "dynamic-import" => ImportKind::DynamicImport,
            "require-resolve" => ImportKind::RequireResolve,
            "import-rule" => ImportKind::ImportRule,
            "url-token" => ImportKind::UrlToken,
            other => ImportKind::Other(other.to_string()),
        }
    }
}

impl Serialize for ImportKind {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ImportKind {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(ImportKind::from(raw.as_str()))
    }
}

impl Metafile {
    /// Parse metadata JSON as emitted by the bundler.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse metadata JSON from raw bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Returns `true` if the module is part of this bundle.
    pub fn contains(&self, key: &ModuleKey) -> bool {
        self.inputs.contains_key(key)
    }

    /// Import targets of `key`, in source order. Empty for unknown modules.
    pub fn imports_of<'a>(
        &'a self,
        key: &ModuleKey,
    ) -> impl Iterator<Item = &'a ModuleKey> + use<'a> {
        self.inputs
            .get(key)
            .into_iter()
            .flat_map(|entry| entry.imports.iter().map(|record| &record.path))
    }

    /// Number of direct imports of `key`.
    pub fn import_count(&self, key: &ModuleKey) -> usize {
        self.inputs.get(key).map_or(0, |entry| entry.imports.len())
    }

    /// All module keys in the bundle, sorted.
    pub fn keys(&self) -> impl Iterator<Item = &ModuleKey> {
        self.inputs.keys()
    }

    /// Modules with no import edges.
    pub fn leaves(&self) -> impl Iterator<Item = &ModuleKey> {
        self.inputs
            .iter()
            .filter(|(_, entry)| entry.imports.is_empty())
            .map(|(key, _)| key)
    }

    /// Merge another metafile into this one.
    ///
    /// Modules unknown to `self` are copied over; import edges of modules
    /// known to both are unioned. Used to keep a view of the whole project
    /// across builds that exclude different modules.
    pub fn absorb(&mut self, other: &Metafile) {
        for (key, entry) in &other.inputs {
            match self.inputs.get_mut(key) {
                Some(existing) => {
                    let known: BTreeSet<ModuleKey> =
                        existing.imports.iter().map(|r| r.path.clone()).collect();
                    for record in &entry.imports {
                        if !known.contains(&record.path) {
                            existing.imports.push(record.clone());
                        }
                    }
                    if existing.file_info.is_none() {
                        existing.file_info = entry.file_info.clone();
                    }
                }
                None => {
                    self.inputs.insert(key.clone(), entry.clone());
                }
            }
        }
        for (request, resolved) in &other.resolver_map {
            self.resolver_map
                .entry(request.clone())
                .or_insert_with(|| resolved.clone());
        }
    }

    /// Total size in bytes of all bundled modules.
    pub fn total_bytes(&self) -> u64 {
        self.inputs.values().map(|entry| entry.bytes).sum()
    }
}
