//! Shared test utilities for snapdoc-doctor tests
//!
//! A `SimProject` describes a small module graph and how each module behaves
//! at snapshot creation time. `SimBundler` and `SimVerifier` stand in for the
//! snapshot bundler and for Node.js: the bundler writes the bundle in the
//! real definition format plus one `// sim:` line carrying its deferred and
//! no-rewrite lists, and the verifier executes the graph from the script's
//! entry point.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use snapdoc_bundler::{
    BundleOutput, BundleRequest, Bundler, ErrorKind, ScriptError, ScriptVerifier, Warning,
};
use snapdoc_doctor::{HealOptions, SnapshotDoctor};
use snapdoc_graph::{ImportKind, ImportRecord, InputEntry, Metafile, ModuleKey};

pub const SIM_MARKER: &str = "// sim:";

/// Base directory of every simulated project.
pub fn project_dir() -> PathBuf {
    std::env::temp_dir().join("snapdoc-sim-project")
}

pub fn key(raw: &str) -> ModuleKey {
    ModuleKey::new(raw).unwrap()
}

pub fn keys(raws: &[&str]) -> Vec<ModuleKey> {
    raws.iter().map(|raw| key(raw)).collect()
}

/// How an importer uses an import while it initializes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Only bound; a deferred import is fine.
    Plain,
    /// Used during initialization; a deferred import throws.
    LoadTime,
}

#[derive(Debug, Clone)]
pub enum Behavior {
    Ok,
    Throws(ScriptError),
    /// Bundler cannot rewrite its global references.
    Unrewritable,
    /// Never finishes.
    Hangs,
}

#[derive(Debug, Clone)]
pub struct SimModule {
    pub key: String,
    pub imports: Vec<(String, Access)>,
    pub behavior: Behavior,
    pub uses_globals: bool,
}

impl SimModule {
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            imports: Vec::new(),
            behavior: Behavior::Ok,
            uses_globals: false,
        }
    }

    pub fn import(mut self, key: &str) -> Self {
        self.imports.push((key.to_string(), Access::Plain));
        self
    }

    pub fn load_time(mut self, key: &str) -> Self {
        self.imports.push((key.to_string(), Access::LoadTime));
        self
    }

    /// Throws a snapshot-restriction error (like touching `Buffer`).
    pub fn throws(mut self) -> Self {
        self.behavior = Behavior::Throws(ScriptError::js(
            "Error",
            format!(
                "[SNAPSHOT_CACHE_FAILURE] Buffer cannot be used while creating the snapshot ({})",
                self.key
            ),
        ));
        self
    }

    pub fn throws_error(mut self, error: ScriptError) -> Self {
        self.behavior = Behavior::Throws(error);
        self
    }

    pub fn unrewritable(mut self) -> Self {
        self.behavior = Behavior::Unrewritable;
        self.uses_globals = true;
        self
    }

    pub fn hangs(mut self) -> Self {
        self.behavior = Behavior::Hangs;
        self
    }

    pub fn uses_globals(mut self) -> Self {
        self.uses_globals = true;
        self
    }
}

/// A module graph with an entry point.
#[derive(Debug, Clone)]
pub struct SimProject {
    pub entry: String,
    pub modules: BTreeMap<String, SimModule>,
    /// Keep warning about unrewritable modules even once they are no-rewrite.
    pub sticky_warnings: bool,
}

impl SimProject {
    pub fn new(entry: &str) -> Self {
        Self {
            entry: entry.to_string(),
            modules: BTreeMap::new(),
            sticky_warnings: false,
        }
    }

    pub fn module(mut self, module: SimModule) -> Self {
        self.modules.insert(module.key.clone(), module);
        self
    }

    pub fn sticky_warnings(mut self) -> Self {
        self.sticky_warnings = true;
        self
    }

    pub fn options(&self) -> HealOptions {
        let entry = self.entry.trim_start_matches("./");
        HealOptions::new(project_dir(), entry).max_workers(4)
    }
}

/// State the simulated bundler embeds in each bundle.
#[derive(Debug, Default, Serialize, Deserialize)]
struct SimState {
    deferred: BTreeSet<String>,
    norewrite: BTreeSet<String>,
}

/// Bundler producing real-format bundles from a [`SimProject`].
pub struct SimBundler {
    project: Arc<SimProject>,
    pub requests: Mutex<Vec<BundleRequest>>,
}

impl SimBundler {
    pub fn new(project: Arc<SimProject>) -> Self {
        Self {
            project,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    fn render(&self, request: &BundleRequest) -> BundleOutput {
        let base = &request.base_dir;
        let deferred: BTreeSet<String> = request
            .deferred
            .iter()
            .map(|k| k.as_str().to_string())
            .collect();
        let norewrite: BTreeSet<String> = request
            .norewrite
            .iter()
            .map(|k| k.as_str().to_string())
            .collect();

        let roots: Vec<String> = std::iter::once(&request.entry)
            .chain(&request.extra_entries)
            .map(|path| ModuleKey::from_path(path, base).unwrap().as_str().to_string())
            .collect();

        let mut included: BTreeSet<String> = BTreeSet::new();
        let mut queue: Vec<String> = roots.clone();
        while let Some(current) = queue.pop() {
            if !included.insert(current.clone()) {
                continue;
            }
            if let Some(module) = self.project.modules.get(&current) {
                for (import, _) in &module.imports {
                    if !deferred.contains(import) && !included.contains(import) {
                        queue.push(import.clone());
                    }
                }
            }
        }

        let mut metafile = Metafile::default();
        let mut warnings = Vec::new();
        let state = SimState {
            deferred: deferred.clone(),
            norewrite: norewrite.clone(),
        };
        let mut bundle = format!("{SIM_MARKER}{}\n", serde_json::to_string(&state).unwrap());
        bundle.push_str("var __commonjs = {\n");

        for current in &included {
            let Some(module) = self.project.modules.get(current) else {
                continue;
            };
            metafile.inputs.insert(
                key(current),
                InputEntry {
                    bytes: 64,
                    imports: module
                        .imports
                        .iter()
                        .map(|(path, _)| ImportRecord {
                            path: key(path),
                            kind: ImportKind::RequireCall,
                        })
                        .collect(),
                    file_info: None,
                },
            );

            let rewritten = !norewrite.contains(current);
            if matches!(module.behavior, Behavior::Unrewritable)
                && !deferred.contains(current)
                && (rewritten || self.project.sticky_warnings)
            {
                warnings.push(
                    Warning::new(format!(
                        "[SNAPSHOT_REWRITE_FAILURE] Cannot rewrite `process` access in {current}"
                    ))
                    .at(current.clone(), 1, 0),
                );
            }

            bundle.push_str(&format!(
                "\"{current}\": function (exports, module, __filename, __dirname, require, define) {{\n"
            ));
            for (import, _) in &module.imports {
                bundle.push_str(&format!("  require(\"{import}\");\n"));
            }
            if module.uses_globals {
                if rewritten {
                    bundle.push_str("  module.exports = get_process().env;\n");
                } else {
                    bundle.push_str("  module.exports = process.env;\n");
                }
            }
            bundle.push_str("},\n");
        }
        bundle.push_str("};\n");

        let source_map = request
            .sourcemap
            .then(|| r#"{"version":3,"sources":[],"names":[],"mappings":"AAAA"}"#.to_string());

        BundleOutput {
            bundle,
            metafile,
            warnings,
            source_map,
        }
    }
}

#[async_trait]
impl Bundler for SimBundler {
    async fn create_bundle(&self, request: &BundleRequest) -> snapdoc_bundler::Result<BundleOutput> {
        self.requests.lock().push(request.clone());
        Ok(self.render(request))
    }
}

/// Bundler that always fails.
pub struct FailingBundler;

#[async_trait]
impl Bundler for FailingBundler {
    async fn create_bundle(&self, _request: &BundleRequest) -> snapdoc_bundler::Result<BundleOutput> {
        Err(snapdoc_bundler::Error::BundlerProcess {
            command: "snapshot-bundler ./index.js".to_string(),
            status: "exit status: 1".to_string(),
            stderr: "Could not resolve './missing.js'".to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuxData {
    entry_point: String,
    #[serde(default)]
    extra_entries: Vec<String>,
}

/// Executes a simulated snapshot script.
pub struct SimVerifier {
    project: Arc<SimProject>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub labels: Mutex<Vec<String>>,
    /// Time each verification takes.
    pub latency: Duration,
}

impl SimVerifier {
    pub fn new(project: Arc<SimProject>) -> Self {
        Self {
            project,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            labels: Mutex::new(Vec::new()),
            latency: Duration::from_millis(1),
        }
    }

    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn runs(&self) -> usize {
        self.labels.lock().len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn execute(
        &self,
        current: &str,
        state: &SimState,
        done: &mut BTreeSet<String>,
    ) -> Result<bool, ScriptError> {
        if !done.insert(current.to_string()) {
            return Ok(false);
        }
        let Some(module) = self.project.modules.get(current) else {
            return Ok(false);
        };

        let mut hangs = false;
        for (import, access) in &module.imports {
            if state.deferred.contains(import) {
                if *access == Access::LoadTime {
                    return Err(ScriptError::js(
                        "Error",
                        format!("Cannot require '{import}' before the real require is installed"),
                    ));
                }
                continue;
            }
            hangs |= self.execute(import, state, done)?;
        }

        match &module.behavior {
            Behavior::Ok => Ok(hangs),
            Behavior::Throws(error) => Err(error.clone()),
            Behavior::Unrewritable if state.norewrite.contains(current) => Ok(hangs),
            Behavior::Unrewritable => Err(ScriptError::js(
                "Error",
                format!("[SNAPSHOT_REWRITE_FAILURE] Cannot rewrite {current}"),
            )),
            Behavior::Hangs => Ok(true),
        }
    }

    fn run(&self, script: &str) -> Result<bool, ScriptError> {
        let harness = |message: &str| ScriptError::new(ErrorKind::Harness, message);
        let first = script.lines().next().unwrap_or_default();
        let aux = first
            .strip_prefix("var snapshotAuxiliaryData = ")
            .and_then(|rest| rest.strip_suffix(';'))
            .ok_or_else(|| harness("missing auxiliary data"))?;
        let aux: AuxData = serde_json::from_str(aux).map_err(|e| harness(&e.to_string()))?;

        let state = script
            .lines()
            .find_map(|line| line.strip_prefix(SIM_MARKER))
            .ok_or_else(|| harness("missing sim state"))?;
        let state: SimState = serde_json::from_str(state).map_err(|e| harness(&e.to_string()))?;

        let mut done = BTreeSet::new();
        let mut hangs = false;
        for entry in std::iter::once(&aux.entry_point).chain(&aux.extra_entries) {
            hangs |= self.execute(entry, &state, &mut done)?;
        }
        Ok(hangs)
    }
}

#[async_trait]
impl ScriptVerifier for SimVerifier {
    async fn verify(&self, script: &str, label: &str) -> Result<(), ScriptError> {
        self.labels.lock().push(label.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.latency).await;
        let outcome = self.run(script);
        if matches!(outcome, Ok(true)) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome.map(|_| ())
    }
}

/// Doctor, bundler and verifier wired to one project.
pub struct Harness {
    pub project: Arc<SimProject>,
    pub bundler: Arc<SimBundler>,
    pub verifier: Arc<SimVerifier>,
}

impl Harness {
    pub fn new(project: SimProject) -> Self {
        let project = Arc::new(project);
        Self {
            bundler: Arc::new(SimBundler::new(Arc::clone(&project))),
            verifier: Arc::new(SimVerifier::new(Arc::clone(&project))),
            project,
        }
    }

    pub fn with_verifier(mut self, verifier: SimVerifier) -> Self {
        self.verifier = Arc::new(verifier);
        self
    }

    pub fn doctor(&self, options: HealOptions) -> SnapshotDoctor {
        SnapshotDoctor::new(
            Arc::clone(&self.bundler) as Arc<dyn Bundler>,
            Arc::clone(&self.verifier) as Arc<dyn ScriptVerifier>,
            options,
        )
    }

    pub fn default_doctor(&self) -> SnapshotDoctor {
        self.doctor(self.project.options())
    }
}
