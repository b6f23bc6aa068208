//! The heal loop.

use std::collections::BTreeSet;
use std::sync::Arc;

use snapdoc_bundler::{
    AssembleConfig, AssembledScript, BundleOutput, BundleRequest, Bundler, Consequence,
    ErrorClassifier, ScriptVerifier, SnapshotMeta, SourcemapMode, WarningsProcessor,
    assemble_script,
};
use snapdoc_graph::{CircularImports, Metafile, ModuleKey, healthy_orphans, sort_by_leafness};
use tracing::{Instrument, debug, debug_span, info, info_span, warn};

use crate::{HealError, HealOptions, HealState, ModuleOutcome, Result, VerifyPool};

/// Outcome of [`SnapshotDoctor::heal`].
#[derive(Debug, Clone)]
pub struct HealResult {
    pub entry: ModuleKey,
    /// Sorted by key.
    pub healthy: Vec<ModuleKey>,
    /// Sorted leaves first.
    pub deferred: Vec<ModuleKey>,
    /// Sorted by key.
    pub norewrite: Vec<ModuleKey>,
    /// Healthy modules the entry reaches only through deferred modules.
    pub healthy_orphans: Vec<ModuleKey>,
    /// Number of heal passes run.
    pub iterations: usize,
    /// Union of every metafile seen during the run.
    pub metafile: Metafile,
}

impl HealResult {
    /// Persistable form of the result, tagged with the project hash.
    pub fn to_meta(&self, deferred_hash: impl Into<String>) -> SnapshotMeta {
        SnapshotMeta {
            norewrite: self.norewrite.clone(),
            deferred: self.deferred.clone(),
            healthy: self.healthy.clone(),
            deferred_hash: deferred_hash.into(),
        }
    }
}

/// Final bundle and assembled script for a heal result.
#[derive(Debug, Clone)]
pub struct SnapshotBuild {
    pub bundle: BundleOutput,
    pub assembled: AssembledScript,
}

/// Drives the heal loop for one project.
pub struct SnapshotDoctor {
    pub(crate) bundler: Arc<dyn Bundler>,
    pub(crate) pool: VerifyPool,
    pub(crate) classifier: ErrorClassifier,
    warnings: WarningsProcessor,
    pub(crate) options: HealOptions,
}

impl std::fmt::Debug for SnapshotDoctor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotDoctor")
            .field("pool", &self.pool)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl SnapshotDoctor {
    pub fn new(
        bundler: Arc<dyn Bundler>,
        verifier: Arc<dyn ScriptVerifier>,
        options: HealOptions,
    ) -> Self {
        let pool = VerifyPool::new(verifier, options.max_workers, options.verify_timeout);
        Self {
            bundler,
            pool,
            classifier: ErrorClassifier::default(),
            warnings: WarningsProcessor::new(),
            options,
        }
    }

    pub fn with_classifier(mut self, classifier: ErrorClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn options(&self) -> &HealOptions {
        &self.options
    }

    /// Module key of the configured entry file.
    pub fn entry_key(&self) -> Result<ModuleKey> {
        Ok(ModuleKey::from_path(
            &self.options.entry_path(),
            &self.options.base_dir,
        )?)
    }

    /// Classify every module of the project.
    ///
    /// # Errors
    ///
    /// Fails on the first bundler error and on any verification failure that
    /// no classification rule covers.
    pub async fn heal(&self) -> Result<HealResult> {
        let span = info_span!("heal", entry = %self.options.entry.display());
        self.run_heal().instrument(span).await
    }

    async fn run_heal(&self) -> Result<HealResult> {
        let entry = self.entry_key()?;
        let mut state = self.initial_state();
        let mut union = Metafile::default();

        if self.options.node_modules_only {
            let first = self.bundle(&state.deferred, &state.norewrite, &[]).await?;
            union.absorb(&first.metafile);
            let project: Vec<ModuleKey> = first
                .metafile
                .keys()
                .filter(|key| !key.is_node_module() && **key != entry)
                .cloned()
                .collect();
            info!(count = project.len(), "deferring project modules outside node_modules");
            state = state.with_deferred(project);
        }

        let mut iterations = 0;
        loop {
            iterations += 1;
            let pass = info_span!("pass", iteration = iterations);
            let bundle = self
                .bundle(&state.deferred, &state.norewrite, &[])
                .instrument(pass.clone())
                .await?;
            union.absorb(&bundle.metafile);

            let next = self
                .process_current_script(state, &bundle)
                .instrument(pass)
                .await?;
            let (merged, changed) = next.merge_needs();
            info!(
                iteration = iterations,
                healthy = merged.healthy.len(),
                deferred = merged.deferred.len(),
                norewrite = merged.norewrite.len(),
                "heal pass finished"
            );
            state = merged;
            if !changed {
                break;
            }
        }

        let unsettled = union.keys().filter(|key| !state.is_settled(key)).count();
        if unsettled > 0 {
            warn!(unsettled, "heal converged with modules that were never verified");
        }

        if self.options.optimize && !state.deferred.is_empty() {
            state = self
                .optimize_deferred(&entry, state, &mut union)
                .instrument(info_span!("optimize"))
                .await?;
        }

        let circular = CircularImports::detect_all(&union);
        let deferred = sort_by_leafness(&union, state.deferred.iter(), &circular);
        let healthy_orphans: Vec<ModuleKey> =
            healthy_orphans(&union, &entry, state.healthy.iter(), &state.deferred)
                .into_iter()
                .collect();
        if !healthy_orphans.is_empty() {
            info!(count = healthy_orphans.len(), "healthy modules only reachable through deferred modules");
        }

        info!(
            iterations,
            healthy = state.healthy.len(),
            deferred = deferred.len(),
            norewrite = state.norewrite.len(),
            "heal finished"
        );

        Ok(HealResult {
            entry,
            healthy: state.healthy.into_iter().collect(),
            deferred,
            norewrite: state.norewrite.into_iter().collect(),
            healthy_orphans,
            iterations,
            metafile: union,
        })
    }

    fn initial_state(&self) -> HealState {
        let forced = self.options.force_norewrite.iter().cloned();
        match &self.options.seed {
            Some(seed) => HealState::seeded(
                seed.healthy.iter().cloned(),
                seed.deferred.iter().cloned(),
                seed.norewrite.iter().cloned().chain(forced),
            ),
            None => HealState::seeded([], [], forced),
        }
    }

    pub(crate) async fn bundle(
        &self,
        deferred: &BTreeSet<ModuleKey>,
        norewrite: &BTreeSet<ModuleKey>,
        extra_entries: &[ModuleKey],
    ) -> Result<BundleOutput> {
        let request = BundleRequest::new(&self.options.base_dir, self.options.entry_path())
            .deferred(deferred)
            .norewrite(norewrite)
            .extra_entries(
                extra_entries
                    .iter()
                    .map(|key| key.to_path(&self.options.base_dir)),
            )
            .doctor(true);
        Ok(self.bundler.create_bundle(&request).await?)
    }

    pub(crate) fn assemble_config(&self, entry: ModuleKey) -> AssembleConfig {
        AssembleConfig::new(&self.options.base_dir, entry).blueprint(self.options.blueprint.clone())
    }

    /// Fold the bundle's warnings into `state`, then verify what is left.
    async fn process_current_script(
        &self,
        mut state: HealState,
        bundle: &BundleOutput,
    ) -> Result<HealState> {
        for processed in self
            .warnings
            .process(&bundle.warnings, &state.deferred, &state.norewrite)
        {
            match processed.consequence {
                Consequence::NoRewrite => {
                    info!(module = %processed.module, "bundler cannot rewrite module");
                    state = state.with_need_norewrite(processed.module);
                }
                Consequence::Defer => {
                    info!(module = %processed.module, "bundler asks to defer module");
                    state = state.with_need_defer(processed.module);
                }
                Consequence::None => debug!(warning = %processed.warning, "bundler warning"),
            }
        }

        // Isolated verification of a bundle that still rewrites a module it
        // cannot rewrite would misattribute the failure.
        if !state.need_norewrite.is_empty() {
            info!(
                count = state.need_norewrite.len(),
                "rebuilding before verification"
            );
            return Ok(state);
        }

        let file = self.write_stage_bundle(&bundle.bundle).await?;
        let circular = CircularImports::detect_all(&bundle.metafile);
        let config = self.assemble_config(self.entry_key()?);

        let mut index = 0;
        loop {
            let leaves = if index == 0 {
                leaf_stage(&bundle.metafile, &state)
            } else {
                Vec::new()
            };
            let stage = if leaves.is_empty() {
                verifiable_stage(&bundle.metafile, &state, &circular)
            } else {
                leaves
            };
            if stage.is_empty() {
                break;
            }

            debug!(index, modules = stage.len(), "verifying stage");
            let outcomes = self
                .pool
                .verify_stage(file.path(), &stage, &config)
                .instrument(debug_span!("stage", index))
                .await?;
            state = self.fold_outcomes(state, outcomes)?;
            index += 1;
        }

        if let Err(err) = file.close() {
            warn!(error = %err, "failed to remove stage bundle");
        }
        Ok(state)
    }

    async fn write_stage_bundle(&self, bundle: &str) -> Result<tempfile::NamedTempFile> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("snapdoc-stage-").suffix(".js");
        let file = match &self.options.scratch_dir {
            Some(dir) => {
                tokio::fs::create_dir_all(dir).await?;
                builder.tempfile_in(dir)?
            }
            None => builder.tempfile()?,
        };
        tokio::fs::write(file.path(), bundle).await?;
        Ok(file)
    }

    fn fold_outcomes(
        &self,
        mut state: HealState,
        outcomes: Vec<(ModuleKey, ModuleOutcome)>,
    ) -> Result<HealState> {
        for (key, outcome) in outcomes {
            state = match outcome {
                ModuleOutcome::Healthy => state.with_healthy(key),
                ModuleOutcome::Failed { step, error } => match self.classifier.classify(&error) {
                    Some(Consequence::Defer) => {
                        info!(module = %key, %step, %error, "deferring module");
                        state.with_need_defer(key)
                    }
                    Some(Consequence::NoRewrite) => {
                        info!(module = %key, %step, %error, "module cannot be rewritten");
                        state.with_need_norewrite(key)
                    }
                    Some(Consequence::None) | None => {
                        return Err(HealError::UnclassifiedFailure { key, step, error });
                    }
                },
            };
        }
        Ok(state)
    }

    /// Bundle and assemble the snapshot for `result`.
    ///
    /// With `include_healthy_orphans`, orphans are bundled and required as
    /// extra entry points so they are initialized in the snapshot too.
    pub async fn final_build(
        &self,
        result: &HealResult,
        sourcemap: SourcemapMode,
    ) -> Result<SnapshotBuild> {
        let extras: Vec<ModuleKey> = if self.options.include_healthy_orphans {
            result.healthy_orphans.clone()
        } else {
            Vec::new()
        };
        let request = BundleRequest::new(&self.options.base_dir, self.options.entry_path())
            .deferred(&result.deferred)
            .norewrite(&result.norewrite)
            .extra_entries(extras.iter().map(|key| key.to_path(&self.options.base_dir)))
            .sourcemap(sourcemap != SourcemapMode::None);
        let bundle = self.bundler.create_bundle(&request).await?;

        let config = self
            .assemble_config(result.entry.clone())
            .extra_entries(extras)
            .sourcemap(sourcemap, bundle.source_map.clone());
        let assembled = assemble_script(&bundle.bundle, &config)?;
        info!(
            bytes = assembled.script.len(),
            sections = assembled.sections.len(),
            "snapshot script assembled"
        );
        Ok(SnapshotBuild { bundle, assembled })
    }
}

fn is_pending(state: &HealState, key: &ModuleKey) -> bool {
    !state.is_settled(key) && !state.is_flagged(key)
}

/// Pending modules without imports of their own.
pub(crate) fn leaf_stage(metafile: &Metafile, state: &HealState) -> Vec<ModuleKey> {
    metafile
        .keys()
        .filter(|key| is_pending(state, key) && metafile.imports_of(key).all(|import| import == *key))
        .cloned()
        .collect()
}

/// Pending modules whose imports are all resolved.
///
/// An import is resolved if it is not in the bundle, already classified, or
/// part of the same import cycle. A module flagged in this pass does not
/// count: its importers wait for the next bundle.
pub(crate) fn verifiable_stage(
    metafile: &Metafile,
    state: &HealState,
    circular: &CircularImports,
) -> Vec<ModuleKey> {
    metafile
        .keys()
        .filter(|key| {
            is_pending(state, key)
                && metafile.imports_of(key).all(|import| {
                    import == *key
                        || !metafile.contains(import)
                        || state.is_settled(import)
                        || circular.in_cycle_with(key, import)
                })
        })
        .cloned()
        .collect()
}
