use clap::ValueEnum;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use snapdoc_bundler::SourcemapMode;

/// Source map output.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum SourcemapOption {
    /// No source map
    #[default]
    None,
    /// Embedded in the snapshot script's auxiliary data
    Embedded,
    /// Written next to the script as `snapshot.js.map`
    External,
}

impl From<SourcemapOption> for SourcemapMode {
    fn from(option: SourcemapOption) -> Self {
        match option {
            SourcemapOption::None => SourcemapMode::None,
            SourcemapOption::Embedded => SourcemapMode::Embedded,
            SourcemapOption::External => SourcemapMode::External,
        }
    }
}
