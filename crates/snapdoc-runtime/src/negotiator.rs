//! Mapping `require` requests to snapshot module keys.
//!
//! Inside the snapshot every module is addressed by its project-relative
//! key. At runtime, requests arrive as whatever the caller wrote: a relative
//! specifier, an absolute path produced by Node's resolver, a package name or
//! a built-in. The negotiator rewrites the ones the snapshot can serve and
//! leaves the rest to the normal loader.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use path_clean::PathClean;
use snapdoc_graph::{Metafile, ModuleKey};
use tracing::trace;

use crate::{Result, RuntimeError};

const NODE_PREFIX: &str = "node:";

/// Separator of `resolverMap` entries (`<importer>***<request>`).
const RESOLVER_SEPARATOR: &str = "***";

const NODE_BUILTINS: &[&str] = &[
    "assert",
    "assert/strict",
    "async_hooks",
    "buffer",
    "child_process",
    "cluster",
    "console",
    "constants",
    "crypto",
    "dgram",
    "diagnostics_channel",
    "dns",
    "dns/promises",
    "domain",
    "events",
    "fs",
    "fs/promises",
    "http",
    "http2",
    "https",
    "inspector",
    "module",
    "net",
    "os",
    "path",
    "path/posix",
    "path/win32",
    "perf_hooks",
    "process",
    "punycode",
    "querystring",
    "readline",
    "repl",
    "stream",
    "stream/promises",
    "string_decoder",
    "sys",
    "timers",
    "timers/promises",
    "tls",
    "trace_events",
    "tty",
    "url",
    "util",
    "util/types",
    "v8",
    "vm",
    "wasi",
    "worker_threads",
    "zlib",
];

/// `true` for Node.js built-in modules, with or without the `node:` scheme.
pub fn is_builtin(request: &str) -> bool {
    if let Some(name) = request.strip_prefix(NODE_PREFIX) {
        return !name.is_empty();
    }
    NODE_BUILTINS.contains(&request)
}

/// Result of negotiating one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Negotiated {
    /// A built-in; passed to the normal loader unchanged.
    Builtin(String),
    /// A module the snapshot may know.
    Module(ModuleKey),
}

/// Rewrites require requests into module keys.
#[derive(Debug, Clone)]
pub struct ModuleNegotiator {
    root: PathBuf,
    resolved: BTreeMap<String, ModuleKey>,
}

impl ModuleNegotiator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into().clean(),
            resolved: BTreeMap::new(),
        }
    }

    /// Also use the bundler's recorded resolutions.
    ///
    /// Entries whose target is not a valid key are skipped.
    pub fn with_resolver_map(mut self, metafile: &Metafile) -> Self {
        for (request, target) in &metafile.resolver_map {
            if let Ok(key) = ModuleKey::new(target) {
                self.resolved.insert(request.clone(), key);
            }
        }
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Module key of an absolute (or root-relative) path.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::OutsideProject`] if the path is not under the root.
    pub fn key_for_path(&self, path: &Path) -> Result<ModuleKey> {
        let absolute = if path.is_absolute() {
            path.to_path_buf().clean()
        } else {
            self.root.join(path).clean()
        };
        if !absolute.starts_with(&self.root) || absolute == self.root {
            return Err(RuntimeError::OutsideProject {
                path: absolute,
                root: self.root.clone(),
            });
        }
        Ok(ModuleKey::from_path(&absolute, &self.root)?)
    }

    /// Negotiate `request` as issued by `parent`.
    ///
    /// Order: built-ins, the bundler's recorded resolution for this
    /// importer, relative specifiers against the importer's directory,
    /// absolute paths. Bare package names without a recorded resolution are
    /// [`RuntimeError::NotResolvable`] and go to the normal loader.
    pub fn negotiate(&self, parent: Option<&ModuleKey>, request: &str) -> Result<Negotiated> {
        if is_builtin(request) {
            return Ok(Negotiated::Builtin(request.to_string()));
        }

        if let Some(parent) = parent {
            let lookup = format!("{parent}{RESOLVER_SEPARATOR}{request}");
            if let Some(key) = self.resolved.get(&lookup) {
                trace!(%parent, request, %key, "resolved from resolver map");
                return Ok(Negotiated::Module(key.clone()));
            }
        }

        let path = Path::new(request);
        if path.is_absolute() {
            return self.key_for_path(path).map(Negotiated::Module);
        }

        if request.starts_with("./") || request.starts_with("../") {
            let base = match parent {
                Some(parent) => parent
                    .to_path(&self.root)
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| self.root.clone()),
                None => self.root.clone(),
            };
            return self.key_for_path(&base.join(path)).map(Negotiated::Module);
        }

        Err(RuntimeError::NotResolvable {
            request: request.to_string(),
        })
    }
}
