use snapdoc_graph::ModuleKey;

use crate::config::SnapdocConfig;
use crate::error::{ConfigError, Result};

impl SnapdocConfig {
    /// Validate values serde cannot check on its own.
    pub fn validate(&self) -> Result<()> {
        if self.entry.as_os_str().is_empty() {
            return Err(ConfigError::MissingField {
                field: "entry".to_string(),
                hint: "Set the application's entry module, e.g. \"entry\": \"index.js\"".to_string(),
            }
            .into());
        }

        if self.max_workers == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "maxWorkers".to_string(),
                value: "0".to_string(),
                hint: "At least one worker is needed; omit the field for the default".to_string(),
            }
            .into());
        }

        for (field, path) in [("bundler", &self.bundler), ("node", &self.node)] {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    value: String::new(),
                    hint: "Provide an executable name or path".to_string(),
                }
                .into());
            }
        }

        for raw in &self.force_no_rewrite {
            if let Err(e) = ModuleKey::new(raw) {
                return Err(ConfigError::InvalidValue {
                    field: "forceNoRewrite".to_string(),
                    value: raw.clone(),
                    hint: e.to_string(),
                }
                .into());
            }
        }

        if self.cache_dir.is_some() && self.cache_dir == self.base_dir {
            return Err(ConfigError::InvalidValue {
                field: "cacheDir".to_string(),
                value: self
                    .cache_dir
                    .as_deref()
                    .map(|dir| dir.display().to_string())
                    .unwrap_or_default(),
                hint: "Snapshot artifacts need their own directory inside the project".to_string(),
            }
            .into());
        }

        Ok(())
    }
}
