//! `snapdoc translate`: map a row of the snapshot script to its module.

use std::path::Path;

use snapdoc_bundler::{TranslatedRow, read_sections, translate_row};

use crate::cli::TranslateArgs;
use crate::commands::utils;
use crate::config::Project;
use crate::error::{BuildError, Result};

pub fn execute(args: TranslateArgs) -> Result<()> {
    let cwd = utils::get_cwd()?;
    let script_path = match &args.script {
        Some(path) if path.is_absolute() => path.clone(),
        Some(path) => cwd.join(path),
        None => {
            let project =
                Project::load(&args.project.overrides(), args.project.config.as_deref(), &cwd)?;
            project.cache().script_path()
        }
    };

    let translated = translate_script_row(&script_path, args.row)?;
    println!("{}:{}", translated.relative_path, translated.row);
    Ok(())
}

/// Translate `row` of the script at `path`.
pub fn translate_script_row(path: &Path, row: u32) -> Result<TranslatedRow> {
    if !path.is_file() {
        return Err(BuildError::ScriptNotFound(path.to_path_buf()).into());
    }
    let script = std::fs::read_to_string(path)?;
    let sections = read_sections(&script)?;
    Ok(translate_row(&sections, row))
}

#[cfg(test)]
mod tests {
    use snapdoc_bundler::{AssembleConfig, EMBEDDED_PATH, assemble_script};
    use snapdoc_graph::ModuleKey;
    use tempfile::TempDir;

    use super::*;
    use crate::error::CliError;

    const BUNDLE: &str = concat!(
        "var __commonjs = {\n",
        "\"./a.js\": function (exports, module, __filename, __dirname, require, define) {\n",
        "  exports.a = 1;\n",
        "  exports.b = 2;\n",
        "},\n",
        "\"./index.js\": function (exports, module, __filename, __dirname, require, define) {\n",
        "  require(\"./a.js\");\n",
        "},\n",
        "};\n",
    );

    #[test]
    fn rows_map_back_to_modules() {
        let temp = TempDir::new().unwrap();
        let config = AssembleConfig::new("/app", ModuleKey::new("./index.js").unwrap());
        let assembled = assemble_script(BUNDLE, &config).unwrap();
        let path = temp.path().join("snapshot.js");
        std::fs::write(&path, &assembled.script).unwrap();

        let a = &assembled.sections[0];
        let translated = translate_script_row(&path, a.start_row + 1).unwrap();
        assert_eq!(translated.relative_path, "./a.js");
        assert_eq!(translated.row, 1);

        let translated = translate_script_row(&path, 0).unwrap();
        assert_eq!(translated.relative_path, EMBEDDED_PATH);
    }

    #[test]
    fn missing_script_is_reported() {
        let temp = TempDir::new().unwrap();
        let err = translate_script_row(&temp.path().join("snapshot.js"), 3).unwrap_err();
        assert!(matches!(err, CliError::Build(BuildError::ScriptNotFound(_))));
    }
}
