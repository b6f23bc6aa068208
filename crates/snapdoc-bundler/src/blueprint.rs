//! The sandbox shell wrapped around every snapshot bundle.
//!
//! During snapshot creation there is no real `process`, no timers, no
//! `Buffer` and no `require`. The shell defines a stand-in for each of those
//! names. The bundler rewrites global references in module code to
//! `get_<name>()` accessors, so every stand-in is read through one binding
//! table. Once the snapshot is loaded into a live process, `setGlobals(real)`
//! swaps the whole table for the real bindings in a single assignment.
//!
//! The stand-in set is plain data ([`Blueprint`]); rendering is pure and
//! deterministic for a given blueprint.

use std::fmt::Write as _;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::{Error, Result};

/// How a stand-in behaves before activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StandInKind {
    /// An empty object.
    Object,
    /// A function that throws when called.
    Throwing,
    /// A fixed JavaScript expression.
    Literal(String),
}

/// One named stand-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandIn {
    pub name: String,
    pub kind: StandInKind,
}

impl StandIn {
    pub fn object(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: StandInKind::Object,
        }
    }

    pub fn throwing(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: StandInKind::Throwing,
        }
    }

    pub fn literal(name: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: StandInKind::Literal(expression.into()),
        }
    }

    fn initializer(&self) -> String {
        match &self.kind {
            StandInKind::Object => "{}".to_string(),
            StandInKind::Throwing => format!("__placeholder({:?})", self.name),
            StandInKind::Literal(expression) => expression.clone(),
        }
    }
}

const PROCESS_STAND_IN: &str = r#"{ env: {}, argv: [], execArgv: [], version: "", versions: {}, platform: "", release: {}, cwd: function () { return "/"; }, nextTick: __placeholder("process.nextTick") }"#;

const CONSOLE_STAND_IN: &str = "{ log: __noop, info: __noop, warn: __noop, error: __noop, debug: __noop, trace: __noop }";

const THROWING_GLOBALS: &[&str] = &[
    "Buffer",
    "setTimeout",
    "clearTimeout",
    "setInterval",
    "clearInterval",
    "setImmediate",
    "clearImmediate",
    "queueMicrotask",
    "fetch",
    "XMLHttpRequest",
    "WebSocket",
    "TextEncoder",
    "TextDecoder",
    "URL",
    "URLSearchParams",
    "performance",
];

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").expect("identifier regex is valid")
});

/// Immutable description of the sandbox shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blueprint {
    stand_ins: Vec<StandIn>,
}

impl Default for Blueprint {
    fn default() -> Self {
        let mut stand_ins = vec![
            StandIn::literal("process", PROCESS_STAND_IN),
            StandIn::literal("console", CONSOLE_STAND_IN),
            StandIn::object("window"),
            StandIn::object("document"),
            StandIn::object("global"),
        ];
        stand_ins.extend(THROWING_GLOBALS.iter().map(|name| StandIn::throwing(*name)));
        Self { stand_ins }
    }
}

impl Blueprint {
    pub fn new(stand_ins: Vec<StandIn>) -> Self {
        Self { stand_ins }
    }

    pub fn stand_ins(&self) -> &[StandIn] {
        &self.stand_ins
    }

    /// Add a stand-in, replacing one with the same name.
    pub fn with(mut self, stand_in: StandIn) -> Self {
        match self.stand_ins.iter_mut().find(|s| s.name == stand_in.name) {
            Some(existing) => *existing = stand_in,
            None => self.stand_ins.push(stand_in),
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        for stand_in in &self.stand_ins {
            if !IDENTIFIER.is_match(&stand_in.name) {
                return Err(Error::Assembly(format!(
                    "stand-in name '{}' is not a JavaScript identifier",
                    stand_in.name
                )));
            }
        }
        Ok(())
    }

    /// Opening half of the shell, up to where module definitions go.
    pub fn shell_open(&self) -> String {
        let mut out = String::new();
        out.push_str("function generateSnapshot() {\n");
        out.push_str("  function __noop() {}\n");
        out.push_str("  function __placeholder(name) {\n");
        out.push_str("    return function () {\n");
        out.push_str("      throw new Error(\"[SNAPSHOT_CACHE_FAILURE] \" + name + \" cannot be used while creating the snapshot\");\n");
        out.push_str("    };\n");
        out.push_str("  }\n");
        out.push_str("  let __bindings = Object.freeze({\n");
        for stand_in in &self.stand_ins {
            let _ = writeln!(out, "    {}: {},", stand_in.name, stand_in.initializer());
        }
        out.push_str("  });\n");
        for stand_in in &self.stand_ins {
            let _ = writeln!(
                out,
                "  function get_{0}() {{ return __bindings.{0}; }}",
                stand_in.name
            );
        }
        out.push_str("  let require = function (id) {\n");
        out.push_str("    throw new Error(\"Cannot require '\" + id + \"' before the real require is installed\");\n");
        out.push_str("  };\n");
        out
    }

    /// Closing half: module loader, entry invocation and exports.
    pub fn shell_close(&self) -> String {
        SHELL_CLOSE.to_string()
    }
}

const SHELL_CLOSE: &str = r#"  const __moduleCache = Object.create(null);
  function customRequire(id) {
    const cached = __moduleCache[id];
    if (cached) return cached.exports;
    const definition = __commonjs[id];
    if (typeof definition !== "function") return require(id);
    const module = { id: id, exports: {}, loaded: false };
    __moduleCache[id] = module;
    const slash = id.lastIndexOf("/");
    const dirname = slash > 0 ? id.slice(0, slash) : ".";
    definition(module.exports, module, id, dirname, customRequire, customRequire);
    module.loaded = true;
    return module.exports;
  }
  customRequire.definitions = __commonjs;
  customRequire.cache = __moduleCache;
  function setGlobals(real) {
    __bindings = Object.freeze(Object.assign({}, __bindings, real));
    if (typeof real.require === "function") require = real.require;
  }
  function translateSnapshotRow(row) {
    const sections = snapshotAuxiliaryData.sections;
    let lo = 0;
    let hi = sections.length - 1;
    while (lo <= hi) {
      const mid = (lo + hi) >> 1;
      const section = sections[mid];
      if (row < section.startRow) hi = mid - 1;
      else if (row >= section.endRow) lo = mid + 1;
      else return { relativePath: section.relativePath, row: row - section.startRow };
    }
    return { relativePath: "<embedded>", row: row };
  }
  customRequire(snapshotAuxiliaryData.entryPoint);
  (snapshotAuxiliaryData.extraEntries || []).forEach(function (id) { customRequire(id); });
  return { customRequire: customRequire, setGlobals: setGlobals, translateSnapshotRow: translateSnapshotRow };
}
var snapshotResult = generateSnapshot.call({});
"#;
