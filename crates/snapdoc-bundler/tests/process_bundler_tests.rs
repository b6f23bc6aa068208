//! End-to-end tests for the process bundler against stand-in executables.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use snapdoc_bundler::{
    AssembleConfig, BundleRequest, Bundler, Error, ProcessBundler, assemble_script, read_sections,
    translate_row,
};
use snapdoc_graph::ModuleKey;

const BUNDLE: &str = r#"var __commonjs = {
"./index.js": function (exports, module, __filename, __dirname, require, define) {
module.exports = require("./util.js");
},
"./util.js": function (exports, module, __filename, __dirname, require, define) {
module.exports = 42;
},
};
"#;

const METAFILE: &str = r#"{"inputs":{
  "./index.js":{"bytes":40,"imports":[{"path":"./util.js","kind":"require-call"}]},
  "./util.js":{"bytes":20,"imports":[]}
}}"#;

fn write_executable(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();
    path
}

/// A bundler that prints a canned result and records its arguments.
fn canned_bundler(dir: &Path) -> PathBuf {
    let output = serde_json::json!({
        "warnings": [
            { "location": { "file": "./util.js", "line": 1, "column": 0, "lineText": "" },
              "text": "[SNAPSHOT_REWRITE_FAILURE] cannot rewrite" },
            { "text": "no location" }
        ],
        "outfiles": [{ "contents": hex::encode(BUNDLE) }],
        "metafile": { "contents": hex::encode(METAFILE) }
    });
    fs::write(dir.join("output.json"), output.to_string()).unwrap();
    write_executable(
        dir,
        "bundler.sh",
        &format!(
            "#!/bin/sh\necho \"$@\" > {args}\ncat {out}\n",
            args = dir.join("args.txt").display(),
            out = dir.join("output.json").display()
        ),
    )
}

#[tokio::test]
async fn bundles_through_child_process() {
    let dir = tempfile::tempdir().unwrap();
    let bundler = ProcessBundler::new(canned_bundler(dir.path()));
    let norewrite = [ModuleKey::new("./legacy.js").unwrap()];
    let request = BundleRequest::new(dir.path(), dir.path().join("index.js"))
        .norewrite(norewrite.iter())
        .doctor(true);

    let output = bundler.create_bundle(&request).await.unwrap();
    assert_eq!(output.bundle, BUNDLE);
    assert_eq!(output.metafile.inputs.len(), 2);
    assert_eq!(output.warnings.len(), 2);

    let args = fs::read_to_string(dir.path().join("args.txt")).unwrap();
    assert!(args.contains("--metafile"));
    assert!(args.contains("--norewrite=./legacy.js"));
    assert!(args.contains("--doctor"));
    assert!(!args.contains("--deferred"));

    let entry = ModuleKey::new("./index.js").unwrap();
    let assembled = assemble_script(&output.bundle, &AssembleConfig::new(dir.path(), entry)).unwrap();
    let sections = read_sections(&assembled.script).unwrap();
    let util = sections.iter().find(|s| s.relative_path == "./util.js").unwrap();
    let translated = translate_row(&sections, util.start_row);
    assert_eq!(translated.relative_path, "./util.js");
    assert_eq!(translated.row, 0);
}

#[tokio::test]
async fn non_zero_exit_is_fatal_with_command() {
    let dir = tempfile::tempdir().unwrap();
    let failing = write_executable(dir.path(), "fail.sh", "#!/bin/sh\necho 'cannot resolve' >&2\nexit 3\n");
    let bundler = ProcessBundler::new(&failing);
    let request = BundleRequest::new(dir.path(), "index.js");

    match bundler.create_bundle(&request).await {
        Err(Error::BundlerProcess { command, stderr, .. }) => {
            assert!(command.starts_with(&failing.display().to_string()));
            assert!(command.contains("index.js"));
            assert_eq!(stderr, "cannot resolve");
        }
        other => panic!("expected process error, got {other:?}"),
    }
}

#[tokio::test]
async fn garbage_stdout_is_an_output_error() {
    let dir = tempfile::tempdir().unwrap();
    let garbage = write_executable(dir.path(), "garbage.sh", "#!/bin/sh\necho 'hello'\n");
    let bundler = ProcessBundler::new(garbage);
    let request = BundleRequest::new(dir.path(), "index.js");

    assert!(matches!(
        bundler.create_bundle(&request).await,
        Err(Error::BundlerOutput { .. })
    ));
}
