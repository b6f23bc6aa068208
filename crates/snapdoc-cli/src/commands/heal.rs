//! `snapdoc heal`: classify every module and store the results.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use snapdoc_bundler::project_hash;
use snapdoc_doctor::{HealResult, SnapshotDoctor};
use snapdoc_graph::ModuleKey;
use tracing::info;

use crate::cli::HealArgs;
use crate::commands::utils;
use crate::config::Project;
use crate::error::{BuildError, Result};
use crate::ui;

/// Machine-readable heal result (`--json`).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealReport<'a> {
    pub entry: &'a ModuleKey,
    pub healthy: &'a [ModuleKey],
    pub deferred: &'a [ModuleKey],
    pub norewrite: &'a [ModuleKey],
    pub healthy_orphans: &'a [ModuleKey],
    pub iterations: usize,
}

impl<'a> From<&'a HealResult> for HealReport<'a> {
    fn from(result: &'a HealResult) -> Self {
        Self {
            entry: &result.entry,
            healthy: &result.healthy,
            deferred: &result.deferred,
            norewrite: &result.norewrite,
            healthy_orphans: &result.healthy_orphans,
            iterations: result.iterations,
        }
    }
}

/// A finished heal run and the doctor that produced it.
pub struct Healed {
    pub doctor: SnapshotDoctor,
    pub result: HealResult,
    pub elapsed: Duration,
}

pub async fn execute(args: HealArgs) -> Result<()> {
    let cwd = utils::get_cwd()?;
    let project = Project::load(&args.project.overrides(), args.project.config.as_deref(), &cwd)?;

    let healed = heal_project(&project).await?;
    ui::print_heal_summary(&healed.result, healed.elapsed);

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&HealReport::from(&healed.result))?
        );
    }
    Ok(())
}

/// Heal `project`, seeded from its stored results, and store the new ones.
pub async fn heal_project(project: &Project) -> Result<Healed> {
    utils::validate_project(project)?;

    let seed = utils::load_seed(project);
    if let Some(seed) = &seed {
        ui::info(&format!(
            "Starting from stored results ({} deferred, {} norewrite)",
            seed.deferred.len(),
            seed.norewrite.len()
        ));
    }

    let options = project.heal_options(seed)?;
    let doctor = SnapshotDoctor::new(
        Arc::new(project.bundler()),
        Arc::new(project.verifier()),
        options,
    );

    let spinner = ui::Spinner::new("Healing module graph...");
    let start = Instant::now();
    let result = match doctor.heal().await {
        Ok(result) => result,
        Err(e) => {
            spinner.fail("Heal failed");
            return Err(e.into());
        }
    };
    let elapsed = start.elapsed();
    spinner.finish(&format!(
        "Healed in {} passes ({})",
        result.iterations,
        ui::format_duration(elapsed)
    ));

    let cache = project.cache();
    let meta = result.to_meta(project_hash(&project.base_dir)?);
    cache
        .store_meta(&meta)
        .map_err(|e| BuildError::ArtifactWriteFailed {
            path: cache.meta_path(),
            error: e.to_string(),
        })?;
    info!(path = %cache.meta_path().display(), "stored snapshot metadata");

    Ok(Healed {
        doctor,
        result,
        elapsed,
    })
}
