#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    use tempfile::TempDir;

    use crate::config::*;
    use crate::error::{CliError, ConfigError};

    fn write_config(dir: &Path, json: &str) {
        fs::write(dir.join(CONFIG_FILE), json).unwrap();
    }

    #[test]
    fn test_defaults() {
        let config = SnapdocConfig::default_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.entry, PathBuf::from("index.js"));
        assert_eq!(config.verify_timeout_ms, 10_000);
        assert!(config.optimize);
        assert!(config.use_cache);
        assert_eq!(config.sourcemap, SourcemapOption::None);
    }

    #[test]
    fn test_serialization() {
        let config = SnapdocConfig {
            max_workers: Some(2),
            force_no_rewrite: vec!["./node_modules/x/index.js".to_string()],
            ..SnapdocConfig::default_config()
        };
        let json = serde_json::to_value(&config).unwrap();
        assert!(json.get("verifyTimeoutMs").is_some());
        assert!(json.get("maxWorkers").is_some());
        assert!(json.get("forceNoRewrite").is_some());
        assert!(json.get("verify_timeout_ms").is_none());

        let minimal = serde_json::to_value(SnapdocConfig::default_config()).unwrap();
        assert!(minimal.get("baseDir").is_none());
        assert!(minimal.get("forceNoRewrite").is_none());

        assert_eq!(
            serde_json::to_string(&SourcemapOption::External).unwrap(),
            "\"external\""
        );
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let err = serde_json::from_str::<SnapdocConfig>(r#"{ "entry": "a.js", "minify": true }"#)
            .unwrap_err();
        assert!(err.to_string().contains("minify"));
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let config = SnapdocConfig::load(&ConfigOverrides::default(), None, temp.path()).unwrap();
        assert_eq!(config, SnapdocConfig::default_config());
    }

    #[test]
    fn test_load_from_file() {
        let temp = TempDir::new().unwrap();
        write_config(
            temp.path(),
            r#"{
                "entry": "src/main.js",
                "maxWorkers": 3,
                "verifyTimeoutMs": 0,
                "sourcemap": "embedded",
                "forceNoRewrite": ["./node_modules/debug/src/node.js"]
            }"#,
        );
        let config = SnapdocConfig::load(&ConfigOverrides::default(), None, temp.path()).unwrap();
        assert_eq!(config.entry, PathBuf::from("src/main.js"));
        assert_eq!(config.max_workers, Some(3));
        assert_eq!(config.verify_timeout_ms, 0);
        assert_eq!(config.sourcemap, SourcemapOption::Embedded);
        assert_eq!(config.force_no_rewrite.len(), 1);
        assert!(config.optimize);
    }

    #[test]
    fn test_cli_overrides_file() {
        let temp = TempDir::new().unwrap();
        write_config(
            temp.path(),
            r#"{ "entry": "src/file.js", "optimize": true, "maxWorkers": 2 }"#,
        );
        let overrides = ConfigOverrides {
            entry: Some(PathBuf::from("src/cli.js")),
            optimize: Some(false),
            ..ConfigOverrides::default()
        };
        let config = SnapdocConfig::load(&overrides, None, temp.path()).unwrap();
        assert_eq!(config.entry, PathBuf::from("src/cli.js"));
        assert!(!config.optimize);
        assert_eq!(config.max_workers, Some(2));
    }

    #[test]
    fn test_explicit_config_must_exist() {
        let temp = TempDir::new().unwrap();
        let err = SnapdocConfig::load(
            &ConfigOverrides::default(),
            Some(Path::new("missing.json")),
            temp.path(),
        )
        .unwrap_err();
        assert!(matches!(err, CliError::Config(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_invalid_file_is_reported() {
        let temp = TempDir::new().unwrap();
        write_config(temp.path(), r#"{ "entry": "index.js", "format": "esm" }"#);
        let err = SnapdocConfig::load(&ConfigOverrides::default(), None, temp.path()).unwrap_err();
        assert!(matches!(err, CliError::Config(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_env_keys_map_to_fields() {
        assert_eq!(env_key_to_field("max_workers"), "maxWorkers");
        assert_eq!(env_key_to_field("VERIFY_TIMEOUT_MS"), "verifyTimeoutMs");
        assert_eq!(env_key_to_field("node"), "node");
        assert_eq!(env_key_to_field("_entry"), "entry");
    }

    #[test]
    fn test_validation() {
        let base = SnapdocConfig::default_config();

        assert!(SnapdocConfig {
            entry: PathBuf::new(),
            ..base.clone()
        }
        .validate()
        .is_err());

        assert!(SnapdocConfig {
            max_workers: Some(0),
            ..base.clone()
        }
        .validate()
        .is_err());

        assert!(SnapdocConfig {
            force_no_rewrite: vec!["  ".to_string()],
            ..base.clone()
        }
        .validate()
        .is_err());

        assert!(SnapdocConfig {
            base_dir: Some(PathBuf::from("app")),
            cache_dir: Some(PathBuf::from("app")),
            ..base
        }
        .validate()
        .is_err());
    }

    #[test]
    fn test_project_paths() {
        let temp = TempDir::new().unwrap();
        let cwd = temp.path();

        let project = Project::from_config(SnapdocConfig::default_config(), cwd).unwrap();
        assert_eq!(project.base_dir, cwd);
        assert_eq!(project.entry, cwd.join("index.js"));
        assert_eq!(project.cache_dir, cwd.join(".snapdoc"));
        assert_eq!(project.entry_key().unwrap().as_str(), "./index.js");

        let config = SnapdocConfig {
            base_dir: Some(PathBuf::from("app")),
            entry: PathBuf::from("lib/main.js"),
            cache_dir: Some(PathBuf::from("out")),
            ..SnapdocConfig::default_config()
        };
        let project = Project::from_config(config, cwd).unwrap();
        assert_eq!(project.entry, cwd.join("app/lib/main.js"));
        assert_eq!(project.cache_dir, cwd.join("out"));
        assert_eq!(project.entry_key().unwrap().as_str(), "./lib/main.js");
    }

    #[test]
    fn test_heal_options() {
        let temp = TempDir::new().unwrap();
        let config = SnapdocConfig {
            max_workers: Some(3),
            verify_timeout_ms: 0,
            optimize: false,
            node_modules_only: true,
            force_no_rewrite: vec!["./node_modules/x/index.js".to_string()],
            ..SnapdocConfig::default_config()
        };
        let project = Project::from_config(config, temp.path()).unwrap();
        let options = project.heal_options(None).unwrap();
        assert_eq!(options.max_workers, 3);
        assert_eq!(options.verify_timeout, None);
        assert!(!options.optimize);
        assert!(options.node_modules_only);
        assert_eq!(options.force_norewrite.len(), 1);
        assert_eq!(options.entry_path(), temp.path().join("index.js"));

        let project = Project::from_config(SnapdocConfig::default_config(), temp.path()).unwrap();
        assert_eq!(project.verify_timeout(), Some(Duration::from_millis(10_000)));
    }

    #[test]
    fn test_schema_and_example() {
        let schema = SnapdocConfig::json_schema().unwrap();
        let properties = schema.get("properties").unwrap();
        assert!(properties.get("verifyTimeoutMs").is_some());
        assert!(properties.get("forceNoRewrite").is_some());

        let example = SnapdocConfig::example_config().unwrap();
        let parsed: SnapdocConfig = serde_json::from_str(&example).unwrap();
        assert!(parsed.validate().is_ok());
    }
}
