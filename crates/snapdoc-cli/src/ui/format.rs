//! Human-readable sizes, durations and result summaries.

use std::path::PathBuf;
use std::time::Duration;

use console::Term;
use owo_colors::OwoColorize;
use snapdoc_doctor::HealResult;

/// Format a byte count with the largest fitting unit.
///
/// ```
/// use snapdoc_cli::ui::format_size;
///
/// assert_eq!(format_size(500), "500 B");
/// assert_eq!(format_size(1536), "1.50 KB");
/// ```
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];

    let mut size = bytes as f64;
    let mut unit_idx = 0;
    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}

/// Format a duration as `ms`, seconds, or minutes and seconds.
pub fn format_duration(duration: Duration) -> String {
    let total_ms = duration.as_millis();
    if total_ms < 1000 {
        format!("{}ms", total_ms)
    } else if total_ms < 60_000 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        let secs = duration.as_secs();
        format!("{}m {}s", secs / 60, secs % 60)
    }
}

fn rule() -> String {
    let width = Term::stderr().size().1 as usize;
    "─".repeat(width.clamp(20, 80))
}

/// Print the classification counts and the deferred modules.
pub fn print_heal_summary(result: &HealResult, elapsed: Duration) {
    eprintln!("\n{}", "Heal Summary".bold().underline());
    eprintln!("{}", rule());
    eprintln!("  {:<16} {}", "entry".dimmed(), result.entry);
    eprintln!("  {:<16} {}", "healthy".dimmed(), result.healthy.len().green());
    eprintln!("  {:<16} {}", "deferred".dimmed(), result.deferred.len().yellow());
    eprintln!("  {:<16} {}", "norewrite".dimmed(), result.norewrite.len().cyan());
    if !result.healthy_orphans.is_empty() {
        eprintln!(
            "  {:<16} {}",
            "healthy orphans".dimmed(),
            result.healthy_orphans.len()
        );
    }
    for key in &result.deferred {
        eprintln!("    {} {}", "▸".yellow(), key);
    }
    for key in &result.norewrite {
        eprintln!("    {} {} {}", "▸".cyan(), key, "(norewrite)".dimmed());
    }
    eprintln!("{}", rule());
    eprintln!(
        "  {} {} passes in {}",
        "Total:".bold(),
        result.iterations,
        format_duration(elapsed).green()
    );
}

/// Print written artifacts with their sizes.
pub fn print_artifacts(artifacts: &[(PathBuf, u64)]) {
    eprintln!("\n{}", "Snapshot Artifacts".bold().underline());
    eprintln!("{}", rule());
    for (path, size) in artifacts {
        eprintln!(
            "  {} {} {}",
            "▸".blue(),
            path.display().bright_white().bold(),
            format_size(*size).dimmed()
        );
    }
    let total: u64 = artifacts.iter().map(|(_, size)| size).sum();
    eprintln!("{}", rule());
    eprintln!("  {} {}", "Total:".bold(), format_size(total).green());
}
