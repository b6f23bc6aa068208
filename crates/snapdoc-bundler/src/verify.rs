//! Isolated execution of assembled snapshot scripts.
//!
//! A verifier runs a script in a fresh context that has nothing but what the
//! script's own sandbox shell defines. Any throw means the module graph
//! rooted at the script's entry cannot run at snapshot creation time.

use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;

/// Default per-script time limit.
pub const DEFAULT_VERIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Built-in JavaScript error classes.
pub const JS_ERROR_CLASSES: &[&str] = &[
    "Error",
    "ReferenceError",
    "TypeError",
    "SyntaxError",
    "RangeError",
    "EvalError",
    "URIError",
    "AggregateError",
];

/// Structured shape of a verification failure.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The script could not be assembled for this entry.
    Assembly,
    /// The script did not finish within the time limit.
    Timeout,
    /// The script threw an `Error` (or subclass); carries the nearest
    /// built-in class name.
    Js(String),
    /// The script threw a value that is not an `Error`.
    Thrown,
    /// The verifier itself misbehaved (could not start, no report).
    Harness,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Assembly => f.write_str("AssemblyError"),
            ErrorKind::Timeout => f.write_str("Timeout"),
            ErrorKind::Js(name) => f.write_str(name),
            ErrorKind::Thrown => f.write_str("Thrown"),
            ErrorKind::Harness => f.write_str("HarnessError"),
        }
    }
}

/// A failed verification.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ScriptError {
    pub kind: ErrorKind,
    pub message: String,
    pub stack: Option<String>,
}

impl ScriptError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            stack: None,
        }
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// A JavaScript error of the given class.
    pub fn js(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Js(name.into()), message)
    }

    pub fn assembly(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Assembly, message)
    }

    pub fn timeout(label: &str, limit: Duration) -> Self {
        Self::new(
            ErrorKind::Timeout,
            format!("{label} did not finish within {}ms", limit.as_millis()),
        )
    }
}

/// Executes assembled scripts in isolation.
#[async_trait]
pub trait ScriptVerifier: Send + Sync {
    /// Run `script`; `label` identifies the run in logs and stack traces.
    async fn verify(&self, script: &str, label: &str) -> Result<(), ScriptError>;
}

/// Runs each script in a new `vm` context of a Node.js child process.
#[derive(Debug, Clone)]
pub struct NodeVerifier {
    node: PathBuf,
    timeout: Option<Duration>,
    scratch_dir: Option<PathBuf>,
}

impl Default for NodeVerifier {
    fn default() -> Self {
        Self {
            node: PathBuf::from("node"),
            timeout: Some(DEFAULT_VERIFY_TIMEOUT),
            scratch_dir: None,
        }
    }
}

impl NodeVerifier {
    pub fn new(node: impl Into<PathBuf>) -> Self {
        Self {
            node: node.into(),
            ..Self::default()
        }
    }

    /// Per-script time limit; `None` waits indefinitely.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Directory for the temporary script files (system temp dir otherwise).
    pub fn scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    async fn run(&self, script: &str, label: &str) -> Result<(), ScriptError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("snapdoc-verify-").suffix(".js");
        let file = match &self.scratch_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .map_err(|e| harness_error(format!("cannot create script file: {e}")))?;

        tokio::fs::write(file.path(), script)
            .await
            .map_err(|e| harness_error(format!("cannot write script file: {e}")))?;

        let output = Command::new(&self.node)
            .arg("-e")
            .arg(HARNESS)
            .arg(file.path())
            .arg(label)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| harness_error(format!("cannot start {}: {e}", self.node.display())))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let report = stdout
            .lines()
            .rev()
            .find(|line| line.starts_with('{'))
            .and_then(|line| serde_json::from_str::<HarnessReport>(line).ok())
            .ok_or_else(|| {
                let stderr = String::from_utf8_lossy(&output.stderr);
                harness_error(format!(
                    "no verification report ({}): {}",
                    output.status,
                    stderr.trim()
                ))
            })?;

        report.into_result()
    }
}

#[async_trait]
impl ScriptVerifier for NodeVerifier {
    async fn verify(&self, script: &str, label: &str) -> Result<(), ScriptError> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.run(script, label))
                .await
                .unwrap_or_else(|_| Err(ScriptError::timeout(label, limit))),
            None => self.run(script, label).await,
        }
    }
}

fn harness_error(message: String) -> ScriptError {
    ScriptError::new(ErrorKind::Harness, message)
}

#[derive(Debug, Deserialize)]
struct HarnessReport {
    ok: bool,
    #[serde(default)]
    error: Option<ReportedError>,
}

#[derive(Debug, Deserialize)]
struct ReportedError {
    name: Option<String>,
    message: String,
    stack: Option<String>,
}

impl HarnessReport {
    fn into_result(self) -> Result<(), ScriptError> {
        if self.ok {
            return Ok(());
        }
        let Some(error) = self.error else {
            return Err(harness_error("failure reported without error".to_string()));
        };
        let kind = match error.name {
            Some(name) => ErrorKind::Js(name),
            None => ErrorKind::Thrown,
        };
        Err(ScriptError {
            kind,
            message: error.message,
            stack: error.stack,
        })
    }
}

/// Node program that runs `argv[1]` in an empty context and prints one JSON
/// report line. Errors are reported with the nearest built-in class name so
/// that subclasses and cross-realm errors classify the same way.
const HARNESS: &str = r#"
const fs = require('fs');
const vm = require('vm');
const [file, label] = process.argv.slice(1);
const source = fs.readFileSync(file, 'utf8');
const BUILTINS = ['AggregateError', 'EvalError', 'RangeError', 'ReferenceError',
  'SyntaxError', 'TypeError', 'URIError', 'Error'];
function builtinName(err) {
  for (let p = Object.getPrototypeOf(err); p; p = Object.getPrototypeOf(p)) {
    const name = p.constructor && p.constructor.name;
    if (BUILTINS.includes(name)) return name;
  }
  return 'Error';
}
let report;
try {
  vm.runInNewContext(source, {}, { filename: label, displayErrors: false });
  report = { ok: true };
} catch (err) {
  const isError = err !== null && typeof err === 'object'
    && typeof err.message === 'string' && typeof err.stack === 'string';
  report = isError
    ? { ok: false, error: { name: builtinName(err), message: err.message, stack: err.stack } }
    : { ok: false, error: { name: null, message: String(err), stack: null } };
}
process.stdout.write(JSON.stringify(report) + '\n');
"#;
