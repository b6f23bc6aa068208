//! `snapdoc build`: heal, then write the snapshot script and artifacts.

use std::path::PathBuf;

use snapdoc_bundler::{SnapshotCache, SourcemapMode, assemble_bundle_export};
use snapdoc_doctor::SnapshotBuild;

use crate::cli::BuildArgs;
use crate::commands::{heal, utils};
use crate::config::Project;
use crate::error::{BuildError, Result};
use crate::ui;

pub async fn execute(args: BuildArgs) -> Result<()> {
    let cwd = utils::get_cwd()?;
    let project = Project::load(&args.overrides(), args.project.config.as_deref(), &cwd)?;

    let healed = heal::heal_project(&project).await?;
    ui::print_heal_summary(&healed.result, healed.elapsed);

    let sourcemap: SourcemapMode = project.config.sourcemap.into();
    let spinner = ui::Spinner::new("Assembling snapshot script...");
    let build = match healed.doctor.final_build(&healed.result, sourcemap).await {
        Ok(build) => build,
        Err(e) => {
            spinner.fail("Final bundle failed");
            return Err(e.into());
        }
    };
    spinner.finish("Snapshot script assembled");

    let mut artifacts = write_artifacts(&project.cache(), &build)?;
    let meta_path = project.cache().meta_path();
    let meta_size = std::fs::metadata(&meta_path).map(|m| m.len()).unwrap_or(0);
    artifacts.push((meta_path, meta_size));

    ui::print_artifacts(&artifacts);
    ui::success(&format!(
        "Snapshot script written to {}",
        project.cache().script_path().display()
    ));
    Ok(())
}

/// Write the script, the definitions bundle and an external source map.
///
/// Returns each written path with its size.
pub fn write_artifacts(cache: &SnapshotCache, build: &SnapshotBuild) -> Result<Vec<(PathBuf, u64)>> {
    let write_failed = |path: PathBuf| {
        move |e: snapdoc_bundler::Error| BuildError::ArtifactWriteFailed {
            path,
            error: e.to_string(),
        }
    };

    let mut written = Vec::new();

    let script = &build.assembled.script;
    let path = cache
        .write_script(script)
        .map_err(write_failed(cache.script_path()))?;
    written.push((path, script.len() as u64));

    let bundle = assemble_bundle_export(&build.bundle.bundle);
    let path = cache
        .write_bundle(&bundle)
        .map_err(write_failed(cache.bundle_path()))?;
    written.push((path, bundle.len() as u64));

    if let Some(map) = &build.assembled.source_map {
        let path = cache
            .write_source_map(map)
            .map_err(write_failed(cache.source_map_path()))?;
        written.push((path, map.len() as u64));
    }

    Ok(written)
}
