//! Terminal output: status lines, a spinner for long steps, and summaries.
//!
//! Everything goes to stderr; stdout is reserved for `--json` output and
//! command results.
//!
//! ```no_run
//! use snapdoc_cli::ui;
//!
//! ui::init_colors(false);
//! let spinner = ui::Spinner::new("Healing...");
//! spinner.finish("Healed in 2 passes");
//! ui::success("Snapshot written");
//! ```

mod format;
mod messages;
mod spinner;

use std::sync::atomic::{AtomicBool, Ordering};

pub use format::{format_duration, format_size, print_artifacts, print_heal_summary};
pub use messages::{error, info, success, warning};
pub use spinner::Spinner;

static COLORS: AtomicBool = AtomicBool::new(true);

/// `true` when running under a common CI provider.
pub fn is_ci() -> bool {
    ["CI", "GITHUB_ACTIONS", "GITLAB_CI", "CIRCLECI", "TRAVIS"]
        .iter()
        .any(|var| std::env::var_os(var).is_some())
}

/// Whether the environment asks for colors.
///
/// `NO_COLOR` wins over `FORCE_COLOR`; otherwise colors are used when stderr
/// is a terminal.
pub fn should_use_color() -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    if std::env::var_os("FORCE_COLOR").is_some() {
        return true;
    }
    console::user_attended_stderr()
}

/// Decide once whether status lines are colored. `no_color` is `--no-color`.
pub fn init_colors(no_color: bool) {
    COLORS.store(!no_color && should_use_color(), Ordering::Relaxed);
}

pub(crate) fn colors_enabled() -> bool {
    COLORS.load(Ordering::Relaxed)
}
