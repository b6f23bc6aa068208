//! Snapshot script assembly and row translation.
//!
//! An assembled script has four parts, in this order:
//!
//! 1. one line `var snapshotAuxiliaryData = {...};` (entry point, source
//!    sections, optionally the embedded source map)
//! 2. the blueprint's shell opening
//! 3. the bundle (module definitions in `var __commonjs = {...}`)
//! 4. the blueprint's shell closing, which requires the entry point
//!
//! Rows are zero-based throughout.

use std::path::PathBuf;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use snapdoc_graph::ModuleKey;

use crate::{Blueprint, Error, Result};

/// Path reported for rows outside every source section.
pub const EMBEDDED_PATH: &str = "<embedded>";

static DEFINITION_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"^\s*"(?P<key>[^"]+)"\s*:\s*function\s*\(\s*exports,\s*module,\s*__filename,\s*__dirname,\s*require,\s*define\s*\)"#,
    )
    .expect("definition header regex is valid")
});

/// Where source maps go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourcemapMode {
    #[default]
    None,
    /// Embedded in `snapshotAuxiliaryData.sourceMap`.
    Embedded,
    /// Returned separately, shifted to the assembled script's rows.
    External,
}

/// Configuration for [`assemble_script`].
#[derive(Debug, Clone)]
pub struct AssembleConfig {
    pub base_dir: PathBuf,
    /// Module required once the definitions are in place.
    pub entry: ModuleKey,
    /// Modules required after the entry point.
    pub extra_entries: Vec<ModuleKey>,
    pub sourcemap: SourcemapMode,
    /// Source map JSON emitted by the bundler for the bundle.
    pub source_map: Option<String>,
    pub blueprint: Blueprint,
}

impl AssembleConfig {
    pub fn new(base_dir: impl Into<PathBuf>, entry: ModuleKey) -> Self {
        Self {
            base_dir: base_dir.into(),
            entry,
            extra_entries: Vec::new(),
            sourcemap: SourcemapMode::None,
            source_map: None,
            blueprint: Blueprint::default(),
        }
    }

    pub fn sourcemap(mut self, mode: SourcemapMode, source_map: Option<String>) -> Self {
        self.sourcemap = mode;
        self.source_map = source_map;
        self
    }

    pub fn extra_entries(mut self, entries: impl IntoIterator<Item = ModuleKey>) -> Self {
        self.extra_entries = entries.into_iter().collect();
        self
    }

    pub fn blueprint(mut self, blueprint: Blueprint) -> Self {
        self.blueprint = blueprint;
        self
    }

    /// Same configuration with `entry` as the only entry point.
    pub fn for_entry(&self, entry: ModuleKey) -> Self {
        Self {
            entry,
            extra_entries: Vec::new(),
            ..self.clone()
        }
    }
}

/// Rows `[start_row, end_row)` of the assembled script that hold one module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceSection {
    pub relative_path: String,
    pub start_row: u32,
    pub end_row: u32,
}

/// A script row mapped back to its source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslatedRow {
    pub relative_path: String,
    pub row: u32,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotAuxiliaryData {
    entry_point: ModuleKey,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    extra_entries: Vec<ModuleKey>,
    sections: Vec<SourceSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source_map: Option<serde_json::Value>,
}

/// Result of [`assemble_script`].
#[derive(Debug, Clone)]
pub struct AssembledScript {
    pub script: String,
    /// Shifted source map, only for [`SourcemapMode::External`].
    pub source_map: Option<String>,
    pub sections: Vec<SourceSection>,
}

/// Wrap `bundle` in the sandbox shell with `config.entry` as entry point.
///
/// # Errors
///
/// [`Error::Assembly`] if the blueprint is invalid, the bundle does not
/// define the entry module, or the source map is not valid JSON.
pub fn assemble_script(bundle: &str, config: &AssembleConfig) -> Result<AssembledScript> {
    config.blueprint.validate()?;

    let shell_open = config.blueprint.shell_open();
    let offset = 1 + count_rows(&shell_open);
    let sections = parse_sections(bundle, offset);

    for entry in std::iter::once(&config.entry).chain(&config.extra_entries) {
        if !sections
            .iter()
            .any(|section| section.relative_path == entry.as_str())
        {
            return Err(Error::Assembly(format!(
                "entry '{entry}' is not defined in the bundle"
            )));
        }
    }

    let mut embedded_map = None;
    let mut external_map = None;
    if let Some(raw) = &config.source_map {
        match config.sourcemap {
            SourcemapMode::None => {}
            SourcemapMode::Embedded => {
                let map: serde_json::Value = serde_json::from_str(raw)
                    .map_err(|e| Error::Assembly(format!("invalid source map: {e}")))?;
                embedded_map = Some(map);
            }
            SourcemapMode::External => {
                external_map = Some(shift_source_map(raw, offset)?);
            }
        }
    }

    let aux = SnapshotAuxiliaryData {
        entry_point: config.entry.clone(),
        extra_entries: config.extra_entries.clone(),
        sections,
        source_map: embedded_map,
    };

    let mut script = String::with_capacity(bundle.len() + shell_open.len() + 4096);
    script.push_str("var snapshotAuxiliaryData = ");
    script.push_str(&serde_json::to_string(&aux)?);
    script.push_str(";\n");
    script.push_str(&shell_open);
    script.push_str(bundle);
    if !bundle.ends_with('\n') {
        script.push('\n');
    }
    script.push_str(&config.blueprint.shell_close());

    Ok(AssembledScript {
        script,
        source_map: external_map,
        sections: aux.sections,
    })
}

/// Bundle variant that exports the definitions object, for diagnostics.
pub fn assemble_bundle_export(bundle: &str) -> String {
    let mut out = String::with_capacity(bundle.len() + 64);
    out.push_str(bundle);
    if !bundle.ends_with('\n') {
        out.push('\n');
    }
    out.push_str("module.exports = __commonjs;\n");
    out
}

/// Read the source sections back out of an assembled script.
pub fn read_sections(script: &str) -> Result<Vec<SourceSection>> {
    let first = script.lines().next().unwrap_or_default();
    let json = first
        .strip_prefix("var snapshotAuxiliaryData = ")
        .and_then(|rest| rest.strip_suffix(';'))
        .ok_or_else(|| Error::Assembly("script has no snapshotAuxiliaryData header".to_string()))?;
    let aux: SnapshotAuxiliaryData = serde_json::from_str(json)?;
    Ok(aux.sections)
}

/// Map a row of the assembled script to `{relative_path, row}`.
///
/// `sections` must be sorted and non-overlapping, as produced by
/// [`assemble_script`]. Rows outside every section map to [`EMBEDDED_PATH`].
pub fn translate_row(sections: &[SourceSection], row: u32) -> TranslatedRow {
    let index = sections.partition_point(|section| section.start_row <= row);
    match index.checked_sub(1).map(|i| &sections[i]) {
        Some(section) if row < section.end_row => TranslatedRow {
            relative_path: section.relative_path.clone(),
            row: row - section.start_row,
        },
        _ => TranslatedRow {
            relative_path: EMBEDDED_PATH.to_string(),
            row,
        },
    }
}

fn count_rows(text: &str) -> u32 {
    text.bytes().filter(|b| *b == b'\n').count() as u32
}

/// A section starts on the row after a definition header and ends at the
/// next header (or the end of the bundle).
fn parse_sections(bundle: &str, offset: u32) -> Vec<SourceSection> {
    let mut sections: Vec<SourceSection> = Vec::new();
    let mut last_row = 0;
    for (row, line) in bundle.lines().enumerate() {
        let row = row as u32;
        last_row = row;
        if let Some(caps) = DEFINITION_HEADER.captures(line) {
            if let Some(open) = sections.last_mut() {
                open.end_row = offset + row;
            }
            sections.push(SourceSection {
                relative_path: caps["key"].to_string(),
                start_row: offset + row + 1,
                end_row: offset + row + 1,
            });
        }
    }
    if let Some(open) = sections.last_mut() {
        open.end_row = offset + last_row + 1;
    }
    sections
}

fn shift_source_map(raw: &str, rows: u32) -> Result<String> {
    let mut map: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| Error::Assembly(format!("invalid source map: {e}")))?;
    let mappings = map
        .get("mappings")
        .and_then(|m| m.as_str())
        .ok_or_else(|| Error::Assembly("source map has no mappings".to_string()))?;
    let shifted = format!("{}{}", ";".repeat(rows as usize), mappings);
    map["mappings"] = serde_json::Value::String(shifted);
    Ok(serde_json::to_string(&map)?)
}
