//! The snapshot bundler contract.
//!
//! The bundler is an external program. Given an entry file and the current
//! deferred / no-rewrite lists it prints one JSON object on stdout:
//!
//! ```json
//! { "warnings": [...], "outfiles": [{ "contents": "<hex>" }], "metafile": { "contents": "<hex>" } }
//! ```
//!
//! `outfiles[0]` is the bundle, `outfiles[1]` the source map (only with
//! `--sourcemap`), and the metafile decodes to [`Metafile`] JSON.

use std::ffi::OsString;
use std::path::{MAIN_SEPARATOR, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use snapdoc_graph::{Metafile, ModuleKey};
use tokio::process::Command;
use tracing::{debug, instrument};

use crate::{Error, Result, Warning};

/// Produces bundles for a given exclusion configuration.
#[async_trait]
pub trait Bundler: Send + Sync {
    /// Bundle `request.entry`. Failures are not retried.
    async fn create_bundle(&self, request: &BundleRequest) -> Result<BundleOutput>;
}

/// Inputs of one bundler invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleRequest {
    pub base_dir: PathBuf,
    pub entry: PathBuf,
    /// Additional entry files bundled after `entry`.
    pub extra_entries: Vec<PathBuf>,
    /// Modules excluded from the bundle.
    pub deferred: Vec<ModuleKey>,
    /// Modules bundled without the global-reference rewrite.
    pub norewrite: Vec<ModuleKey>,
    /// Stricter, verification-friendly output.
    pub doctor: bool,
    pub sourcemap: bool,
}

impl BundleRequest {
    pub fn new(base_dir: impl Into<PathBuf>, entry: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            entry: entry.into(),
            extra_entries: Vec::new(),
            deferred: Vec::new(),
            norewrite: Vec::new(),
            doctor: false,
            sourcemap: false,
        }
    }

    pub fn deferred<'a>(mut self, keys: impl IntoIterator<Item = &'a ModuleKey>) -> Self {
        self.deferred = keys.into_iter().cloned().collect();
        self
    }

    pub fn norewrite<'a>(mut self, keys: impl IntoIterator<Item = &'a ModuleKey>) -> Self {
        self.norewrite = keys.into_iter().cloned().collect();
        self
    }

    pub fn extra_entries(mut self, entries: impl IntoIterator<Item = PathBuf>) -> Self {
        self.extra_entries = entries.into_iter().collect();
        self
    }

    pub fn doctor(mut self, doctor: bool) -> Self {
        self.doctor = doctor;
        self
    }

    pub fn sourcemap(mut self, sourcemap: bool) -> Self {
        self.sourcemap = sourcemap;
        self
    }

    /// Command-line arguments for the bundler process.
    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::new();
        let mut basedir = OsString::from("--basedir=");
        basedir.push(&self.base_dir);
        args.push(basedir);
        args.push(self.entry.clone().into_os_string());
        args.extend(self.extra_entries.iter().map(|e| e.clone().into_os_string()));
        args.push("--metafile".into());
        if !self.deferred.is_empty() {
            args.push(format!("--deferred={}", join_keys(&self.deferred)).into());
        }
        if !self.norewrite.is_empty() {
            args.push(format!("--norewrite={}", join_keys(&self.norewrite)).into());
        }
        if self.doctor {
            args.push("--doctor".into());
        }
        if self.sourcemap {
            args.push("--sourcemap".into());
        }
        args
    }
}

fn join_keys(keys: &[ModuleKey]) -> String {
    keys.iter()
        .map(|key| {
            if MAIN_SEPARATOR == '/' {
                key.as_str().to_string()
            } else {
                key.as_str().replace('/', &MAIN_SEPARATOR.to_string())
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Decoded result of one bundler invocation.
#[derive(Debug, Clone, Default)]
pub struct BundleOutput {
    /// Module definitions (`var __commonjs = {...}`).
    pub bundle: String,
    pub metafile: Metafile,
    pub warnings: Vec<Warning>,
    pub source_map: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawOutput {
    #[serde(default)]
    warnings: Vec<Warning>,
    outfiles: Vec<HexContents>,
    metafile: HexContents,
}

#[derive(Debug, Deserialize)]
struct HexContents {
    contents: String,
}

impl BundleOutput {
    /// Parse the bundler's stdout.
    pub fn from_stdout(stdout: &[u8], command: &str, sourcemap: bool) -> Result<Self> {
        let invalid = |reason: String| Error::BundlerOutput {
            command: command.to_string(),
            reason,
        };

        let raw: RawOutput =
            serde_json::from_slice(stdout).map_err(|e| invalid(format!("not JSON: {e}")))?;

        let mut outfiles = raw.outfiles.into_iter();
        let bundle = outfiles
            .next()
            .ok_or_else(|| invalid("no outfiles".to_string()))?;
        let bundle = decode_utf8(&bundle.contents).map_err(|e| invalid(format!("bundle: {e}")))?;

        let source_map = if sourcemap {
            let map = outfiles
                .next()
                .ok_or_else(|| invalid("source map requested but not emitted".to_string()))?;
            Some(decode_utf8(&map.contents).map_err(|e| invalid(format!("source map: {e}")))?)
        } else {
            None
        };

        let metafile = hex::decode(raw.metafile.contents.trim())?;
        let metafile = Metafile::from_slice(&metafile)?;

        Ok(Self {
            bundle,
            metafile,
            warnings: raw.warnings,
            source_map,
        })
    }
}

fn decode_utf8(contents: &str) -> std::result::Result<String, String> {
    let bytes = hex::decode(contents.trim()).map_err(|e| e.to_string())?;
    String::from_utf8(bytes).map_err(|e| e.to_string())
}

/// Runs the bundler executable as a child process.
#[derive(Debug, Clone)]
pub struct ProcessBundler {
    program: PathBuf,
}

impl ProcessBundler {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Shell-style rendering of the invocation, for error messages.
    pub fn command_line(&self, request: &BundleRequest) -> String {
        std::iter::once(self.program.clone().into_os_string())
            .chain(request.args())
            .map(|arg| {
                let arg = arg.to_string_lossy().into_owned();
                if arg.contains(' ') {
                    format!("'{arg}'")
                } else {
                    arg
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[async_trait]
impl Bundler for ProcessBundler {
    #[instrument(skip_all, fields(entry = %request.entry.display(), deferred = request.deferred.len(), norewrite = request.norewrite.len()))]
    async fn create_bundle(&self, request: &BundleRequest) -> Result<BundleOutput> {
        let command = self.command_line(request);
        debug!(%command, "invoking bundler");

        let output = Command::new(&self.program)
            .args(request.args())
            .current_dir(&request.base_dir)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| Error::BundlerProcess {
                command: command.clone(),
                status: "not started".to_string(),
                stderr: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(Error::BundlerProcess {
                command,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let bundle = BundleOutput::from_stdout(&output.stdout, &command, request.sourcemap)?;
        debug!(
            modules = bundle.metafile.inputs.len(),
            warnings = bundle.warnings.len(),
            bytes = bundle.bundle.len(),
            "bundle created"
        );
        Ok(bundle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(raw: &str) -> ModuleKey {
        ModuleKey::new(raw).unwrap()
    }

    fn stdout(bundle: &str, metafile: &str, map: Option<&str>) -> Vec<u8> {
        let mut outfiles = vec![serde_json::json!({ "contents": hex::encode(bundle) })];
        if let Some(map) = map {
            outfiles.push(serde_json::json!({ "contents": hex::encode(map) }));
        }
        serde_json::to_vec(&serde_json::json!({
            "warnings": [{ "location": { "file": "./a.js", "line": 1, "column": 0, "lineText": "x" }, "text": "hi" }],
            "outfiles": outfiles,
            "metafile": { "contents": hex::encode(metafile) },
        }))
        .unwrap()
    }

    #[test]
    fn args_follow_bundler_contract() {
        let deferred = [key("./a.js"), key("./b.js")];
        let request = BundleRequest::new("/app", "/app/index.js")
            .deferred(deferred.iter())
            .doctor(true);
        let args: Vec<String> = request
            .args()
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        assert_eq!(args[0], "--basedir=/app");
        assert_eq!(args[1], "/app/index.js");
        assert_eq!(args[2], "--metafile");
        assert!(args.contains(&"--doctor".to_string()));
        assert!(!args.iter().any(|a| a.starts_with("--norewrite")));
        assert!(!args.contains(&"--sourcemap".to_string()));
        if MAIN_SEPARATOR == '/' {
            assert!(args.contains(&"--deferred=./a.js,./b.js".to_string()));
        }
    }

    #[test]
    fn decodes_hex_payloads() {
        let raw = stdout(
            "var __commonjs = {};",
            r#"{"inputs":{"./a.js":{"bytes":1,"imports":[]}}}"#,
            Some(r#"{"version":3}"#),
        );
        let output = BundleOutput::from_stdout(&raw, "bundler", true).unwrap();
        assert_eq!(output.bundle, "var __commonjs = {};");
        assert_eq!(output.metafile.inputs.len(), 1);
        assert_eq!(output.source_map.as_deref(), Some(r#"{"version":3}"#));
        assert_eq!(output.warnings[0].location.as_ref().unwrap().line_text, "x");
    }

    #[test]
    fn missing_source_map_is_an_error() {
        let raw = stdout("x", r#"{"inputs":{}}"#, None);
        let err = BundleOutput::from_stdout(&raw, "bundler --sourcemap", true).unwrap_err();
        assert!(matches!(err, Error::BundlerOutput { .. }));
    }

    #[test]
    fn malformed_output_carries_command() {
        let err = BundleOutput::from_stdout(b"not json", "bundler ./index.js", false).unwrap_err();
        match err {
            Error::BundlerOutput { command, .. } => assert_eq!(command, "bundler ./index.js"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn missing_program_is_a_process_error() {
        let bundler = ProcessBundler::new("/definitely/not/a/bundler");
        let request = BundleRequest::new(std::env::temp_dir(), "index.js");
        let err = bundler.create_bundle(&request).await.unwrap_err();
        match err {
            Error::BundlerProcess { command, .. } => {
                assert!(command.starts_with("/definitely/not/a/bundler --basedir="))
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
