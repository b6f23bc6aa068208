use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format as _, Json, Serialized},
};
use serde::Serialize;

use crate::config::{SnapdocConfig, SourcemapOption};
use crate::error::{ConfigError, Result};

/// Config file looked up in the working directory.
pub const CONFIG_FILE: &str = "snapdoc.config.json";

const ENV_PREFIX: &str = "SNAPDOC_";

/// Values given on the command line. Unset fields leave lower-priority
/// sources alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundler: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_workers: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verify_timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimize: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_healthy_orphans: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub force_no_rewrite: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sourcemap: Option<SourcemapOption>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_modules_only: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_cache: Option<bool>,
}

/// `max_workers` (an environment key without its prefix) to `maxWorkers`.
pub fn env_key_to_field(key: &str) -> String {
    let mut field = String::with_capacity(key.len());
    let mut upper = false;
    for c in key.chars() {
        if c == '_' {
            upper = !field.is_empty();
        } else if upper {
            field.push(c.to_ascii_uppercase());
            upper = false;
        } else {
            field.push(c.to_ascii_lowercase());
        }
    }
    field
}

impl SnapdocConfig {
    /// Load configuration from every source.
    ///
    /// `config_path` must exist when given; otherwise `snapdoc.config.json`
    /// in `cwd` is used if present.
    pub fn load(overrides: &ConfigOverrides, config_path: Option<&Path>, cwd: &Path) -> Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(Self::default_config()));

        let config_file = match config_path {
            Some(path) => {
                let path = if path.is_absolute() {
                    path.to_path_buf()
                } else {
                    cwd.join(path)
                };
                if !path.is_file() {
                    return Err(ConfigError::NotFound(path).into());
                }
                Some(path)
            }
            None => Some(cwd.join(CONFIG_FILE)).filter(|path| path.is_file()),
        };

        if let Some(path) = &config_file {
            tracing::debug!(path = %path.display(), "loading config file");
            figment = figment.merge(Json::file(path));
        }

        figment = figment.merge(
            Env::prefixed(ENV_PREFIX).map(|key| env_key_to_field(key.as_str()).into()),
        );

        figment = figment.merge(Serialized::defaults(overrides));

        figment
            .extract()
            .map_err(|e| ConfigError::Invalid(e.to_string()).into())
    }
}
