//! `snapdoc check`: validate the configuration without bundling.

use snapdoc_bundler::project_hash;

use crate::cli::CheckArgs;
use crate::commands::utils;
use crate::config::{Project, SnapdocConfig};
use crate::error::Result;
use crate::ui;

/// Steps:
///
/// 1. load and validate the merged configuration
/// 2. check that the project directory and entry exist
/// 3. map the entry and `forceNoRewrite` to module keys
/// 4. report whether stored heal results would be reused
pub fn execute(args: CheckArgs) -> Result<()> {
    if args.print_schema {
        println!("{}", serde_json::to_string_pretty(&SnapdocConfig::json_schema()?)?);
        return Ok(());
    }

    let cwd = utils::get_cwd()?;
    ui::info("Checking configuration...");
    let project = Project::load(&args.project.overrides(), args.project.config.as_deref(), &cwd)?;
    ui::success("Configuration is valid");

    utils::validate_project(&project)?;
    let entry = project.entry_key()?;
    ui::success(&format!("Entry module {entry} exists"));

    for key in project.force_no_rewrite()? {
        ui::info(&format!("  always bundled without rewriting: {key}"));
    }

    let cache = project.cache();
    let current_hash = project_hash(&project.base_dir)?;
    match cache.load_meta() {
        Ok(Some(meta)) if meta.deferred_hash == current_hash => {
            ui::info(&format!(
                "Stored results are current ({} healthy, {} deferred, {} norewrite)",
                meta.healthy.len(),
                meta.deferred.len(),
                meta.norewrite.len()
            ));
        }
        Ok(Some(_)) => ui::warning("Stored results are stale; the next heal starts from scratch"),
        Ok(None) => ui::info(&format!("No stored results in {}", cache.dir().display())),
        Err(e) => ui::warning(&format!("Stored results are unreadable: {e}")),
    }

    ui::success("All checks passed!");
    Ok(())
}
