//! Mapping bundler warnings and verification errors to consequences.
//!
//! Both classifiers are ordered rule lists. The first matching rule wins.
//! Warnings always classify (unmatched text is [`Consequence::None`]);
//! errors may not, and the caller must treat an unclassified error as fatal.

use snapdoc_graph::{KeySet, ModuleKey};
use tracing::debug;

use crate::verify::{ErrorKind, JS_ERROR_CLASSES, ScriptError};
use crate::warning::{Consequence, ProcessedWarning, Warning};

/// Marker the bundler puts in warnings and errors about code it cannot rewrite.
pub const REWRITE_FAILURE_MARKER: &str = "[SNAPSHOT_REWRITE_FAILURE]";

const CANNOT_REWRITE: &str = "Cannot rewrite";

fn mentions_rewrite_failure(text: &str) -> bool {
    text.contains(REWRITE_FAILURE_MARKER) || text.contains(CANNOT_REWRITE)
}

/// One `(predicate, consequence)` rule of the error classifier.
#[derive(Clone, Copy)]
pub struct ClassifyRule {
    pub name: &'static str,
    pub matches: fn(&ScriptError) -> bool,
    pub consequence: Consequence,
}

impl std::fmt::Debug for ClassifyRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifyRule")
            .field("name", &self.name)
            .field("consequence", &self.consequence)
            .finish()
    }
}

const DEFAULT_RULES: &[ClassifyRule] = &[
    ClassifyRule {
        name: "rewrite-failure",
        matches: |err| mentions_rewrite_failure(&err.message),
        consequence: Consequence::NoRewrite,
    },
    ClassifyRule {
        name: "assembly-failure",
        matches: |err| err.kind == ErrorKind::Assembly,
        consequence: Consequence::Defer,
    },
    ClassifyRule {
        name: "timeout",
        matches: |err| err.kind == ErrorKind::Timeout,
        consequence: Consequence::Defer,
    },
    ClassifyRule {
        name: "javascript-error",
        matches: |err| match &err.kind {
            ErrorKind::Js(name) => JS_ERROR_CLASSES.contains(&name.as_str()),
            ErrorKind::Thrown => true,
            _ => false,
        },
        consequence: Consequence::Defer,
    },
];

/// Maps verification errors to consequences.
#[derive(Debug, Clone)]
pub struct ErrorClassifier {
    rules: Vec<ClassifyRule>,
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self {
            rules: DEFAULT_RULES.to_vec(),
        }
    }
}

impl ErrorClassifier {
    pub fn rules(&self) -> &[ClassifyRule] {
        &self.rules
    }

    /// Consequence of `error`, or `None` if no rule matches.
    pub fn classify(&self, error: &ScriptError) -> Option<Consequence> {
        self.rules
            .iter()
            .find(|rule| (rule.matches)(error))
            .map(|rule| rule.consequence)
    }
}

/// Classifies bundler warnings against the current heal state.
#[derive(Debug, Clone, Default)]
pub struct WarningsProcessor;

impl WarningsProcessor {
    pub fn new() -> Self {
        Self
    }

    /// Classify `warnings`.
    ///
    /// Warnings without a location are dropped. A warning about a module
    /// that is already deferred, or already no-rewrite when the warning asks
    /// for no-rewrite, is kept with [`Consequence::None`]. The input is not
    /// modified, so processing the same list twice yields the same result.
    pub fn process(
        &self,
        warnings: &[Warning],
        deferred: &impl KeySet,
        norewrite: &impl KeySet,
    ) -> Vec<ProcessedWarning> {
        warnings
            .iter()
            .filter_map(|warning| {
                let Some(location) = &warning.location else {
                    debug!(text = %warning.text, "dropping warning without location");
                    return None;
                };
                let module = match ModuleKey::new(&location.file) {
                    Ok(module) => module,
                    Err(err) => {
                        debug!(file = %location.file, error = %err, "dropping warning with invalid file");
                        return None;
                    }
                };

                let consequence = match self.classify_text(&warning.text) {
                    _ if deferred.has(&module) => Consequence::None,
                    Consequence::NoRewrite if norewrite.has(&module) => Consequence::None,
                    consequence => consequence,
                };

                Some(ProcessedWarning {
                    warning: warning.clone(),
                    module,
                    consequence,
                })
            })
            .collect()
    }

    fn classify_text(&self, text: &str) -> Consequence {
        if mentions_rewrite_failure(text) {
            Consequence::NoRewrite
        } else {
            Consequence::None
        }
    }
}
