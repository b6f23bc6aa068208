//! End-to-end tests of the `snapdoc` binary.
//!
//! Nothing here needs Node.js or a snapshot bundler: the commands under test
//! either stop before bundling or fail at the bundler on purpose.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

#[allow(deprecated)]
fn snapdoc(workdir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("snapdoc").expect("binary");
    cmd.current_dir(workdir).env("NO_COLOR", "1");
    cmd
}

fn project() -> TempDir {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("index.js"), "require('./lib.js');\n").unwrap();
    fs::write(temp.path().join("lib.js"), "module.exports = 1;\n").unwrap();
    fs::write(temp.path().join("package.json"), r#"{ "name": "app" }"#).unwrap();
    temp
}

#[test]
fn help_lists_commands() {
    let temp = TempDir::new().unwrap();
    snapdoc(temp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("heal"))
        .stdout(predicate::str::contains("build"))
        .stdout(predicate::str::contains("translate"));
}

#[test]
fn check_passes_for_valid_project() {
    let temp = project();
    fs::write(
        temp.path().join("snapdoc.config.json"),
        r#"{ "entry": "index.js", "maxWorkers": 2, "forceNoRewrite": ["./node_modules/x/index.js"] }"#,
    )
    .unwrap();

    snapdoc(temp.path())
        .arg("check")
        .assert()
        .success()
        .stderr(predicate::str::contains("./index.js"))
        .stderr(predicate::str::contains("No stored results"))
        .stderr(predicate::str::contains("All checks passed"));
}

#[test]
fn check_rejects_unknown_config_fields() {
    let temp = project();
    fs::write(
        temp.path().join("snapdoc.config.json"),
        r#"{ "entry": "index.js", "minify": true }"#,
    )
    .unwrap();

    snapdoc(temp.path())
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid configuration"));
}

#[test]
fn check_reports_missing_entry() {
    let temp = project();
    snapdoc(temp.path())
        .args(["check", "--entry", "missing.js"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Entry point not found"));
}

#[test]
fn check_reports_missing_explicit_config() {
    let temp = project();
    snapdoc(temp.path())
        .args(["check", "--config", "other.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Config file not found"));
}

#[test]
fn check_prints_schema() {
    let temp = TempDir::new().unwrap();
    snapdoc(temp.path())
        .args(["check", "--print-schema"])
        .assert()
        .success()
        .stdout(predicate::str::contains("verifyTimeoutMs"))
        .stdout(predicate::str::contains("includeHealthyOrphans"));
}

#[test]
fn translate_maps_rows_of_a_cached_script() {
    let temp = project();
    let cache = temp.path().join(".snapdoc");
    fs::create_dir_all(&cache).unwrap();
    fs::write(
        cache.join("snapshot.js"),
        concat!(
            r#"var snapshotAuxiliaryData = {"entryPoint":"./index.js","sections":[{"relativePath":"./lib.js","startRow":3,"endRow":5}]};"#,
            "\n// shell\n",
            "\"./lib.js\": function (exports, module, __filename, __dirname, require, define) {\n",
            "  module.exports = 1;\n",
            "  exports.x = 2;\n",
            "},\n",
        ),
    )
    .unwrap();

    snapdoc(temp.path())
        .args(["translate", "4"])
        .assert()
        .success()
        .stdout("./lib.js:1\n");

    snapdoc(temp.path())
        .args(["translate", "1"])
        .assert()
        .success()
        .stdout("<embedded>:1\n");
}

#[test]
fn translate_without_script_fails() {
    let temp = project();
    snapdoc(temp.path())
        .args(["translate", "10"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("snapdoc build"));
}

#[test]
fn heal_reports_bundler_failures() {
    let temp = project();
    snapdoc(temp.path())
        .args(["heal", "--bundler", "./no-such-bundler", "--no-cache"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Bundler failed"));
}
