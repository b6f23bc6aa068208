//! Bundler warnings and their consequences.

use serde::{Deserialize, Serialize};
use snapdoc_graph::ModuleKey;

/// A warning emitted by the bundler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Warning {
    /// Where the warning originated; missing for unattributable warnings.
    #[serde(default)]
    pub location: Option<WarningLocation>,
    pub text: String,
}

/// Source location of a bundler warning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarningLocation {
    /// Module key of the file the warning is about.
    pub file: String,
    #[serde(default)]
    pub line: u32,
    #[serde(default)]
    pub column: u32,
    #[serde(default)]
    pub line_text: String,
}

/// What the healing engine should do about a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Consequence {
    /// Exclude the module from the snapshot.
    Defer,
    /// Keep the module but skip the bundler's rewrite pass for it.
    NoRewrite,
    /// Informational only.
    None,
}

/// A warning tagged with its consequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedWarning {
    pub warning: Warning,
    /// The module the warning is attributed to.
    pub module: ModuleKey,
    pub consequence: Consequence,
}

impl Warning {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            location: None,
            text: text.into(),
        }
    }

    pub fn at(mut self, file: impl Into<String>, line: u32, column: u32) -> Self {
        self.location = Some(WarningLocation {
            file: file.into(),
            line,
            column,
            line_text: String::new(),
        });
        self
    }
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.location {
            Some(loc) => write!(f, "{}:{}:{}: {}", loc.file, loc.line, loc.column, self.text),
            None => f.write_str(&self.text),
        }
    }
}
