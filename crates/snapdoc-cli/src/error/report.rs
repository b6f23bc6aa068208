//! Conversion of CLI errors into miette reports.

use miette::Report;

use crate::error::CliError;

/// Convert a [`CliError`] into a report for `main`.
///
/// Library errors keep their diagnostic codes and help text.
pub fn cli_error_to_miette(err: CliError) -> Report {
    match err {
        CliError::Heal(e) => Report::new(e),
        CliError::Bundle(e) => Report::new(e),
        CliError::Runtime(e) => Report::new(e),
        other => miette::miette!("{}", other),
    }
}
