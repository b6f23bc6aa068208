//! Shrinking the deferred set after the heal loop converged.
//!
//! The heal loop defers a module as soon as verifying it fails, even when
//! the failure really comes from one of its imports. The optimizer walks the
//! deferred modules leaves first and keeps a module deferred only if
//! deferring its imports instead does not make it verify.

use std::collections::BTreeSet;

use snapdoc_bundler::{Consequence, assemble_script};
use snapdoc_graph::{CircularImports, Metafile, ModuleKey, sort_by_leafness};
use tracing::{debug, info, warn};

use crate::{FailedStep, HealError, HealState, Result, SnapshotDoctor};

impl SnapshotDoctor {
    pub(crate) async fn optimize_deferred(
        &self,
        entry: &ModuleKey,
        state: HealState,
        union: &mut Metafile,
    ) -> Result<HealState> {
        let HealState {
            mut healthy,
            deferred,
            mut norewrite,
            ..
        } = state;

        // Seeded deferrals may never have been bundled during this run.
        let unseen: Vec<ModuleKey> = deferred
            .iter()
            .filter(|key| !union.contains(key))
            .cloned()
            .collect();
        if !unseen.is_empty() {
            debug!(count = unseen.len(), "bundling unseen deferred modules");
            let discovery = self.bundle(&BTreeSet::new(), &norewrite, &unseen).await?;
            union.absorb(&discovery.metafile);
        }
        let union: &Metafile = union;

        let circular = CircularImports::detect_all(union);
        let order = sort_by_leafness(union, deferred.iter(), &circular);
        let mut optimized: BTreeSet<ModuleKey> = BTreeSet::new();

        for module in order {
            if optimized.contains(&module) {
                continue;
            }
            let imports: BTreeSet<ModuleKey> = union
                .imports_of(&module)
                .filter(|import| **import != module && union.contains(import))
                .cloned()
                .collect();
            if imports.is_empty() {
                optimized.insert(module);
                continue;
            }

            if self.probe(&module, &optimized, &norewrite).await? {
                debug!(module = %module, "deferral not needed");
                healthy.insert(module);
                continue;
            }

            let mut with_imports = optimized.clone();
            with_imports.extend(imports.iter().cloned());
            if !self.probe(&module, &with_imports, &norewrite).await? {
                debug!(module = %module, "module fails on its own");
                optimized.insert(module);
                continue;
            }

            let mut replaced = false;
            for import in &imports {
                if optimized.contains(import) {
                    continue;
                }
                let mut candidate = optimized.clone();
                candidate.insert(import.clone());
                if self.probe(&module, &candidate, &norewrite).await? {
                    info!(module = %module, import = %import, "deferring import instead");
                    healthy.remove(import);
                    norewrite.remove(import);
                    healthy.insert(module.clone());
                    optimized = candidate;
                    replaced = true;
                    break;
                }
            }
            if !replaced {
                warn!(
                    module = %module,
                    imports = imports.len(),
                    "no single import explains the failure, keeping module deferred"
                );
                optimized.insert(module);
            }
        }

        if !self.options.include_healthy_orphans && !optimized.contains(entry) {
            for module in optimized.clone() {
                let mut without = optimized.clone();
                without.remove(&module);
                if self.probe(entry, &without, &norewrite).await? {
                    debug!(module = %module, "deferral is redundant");
                    optimized = without;
                }
            }
        }

        info!(
            before = deferred.len(),
            after = optimized.len(),
            "deferred set optimized"
        );
        Ok(HealState {
            healthy,
            deferred: optimized,
            norewrite,
            ..HealState::default()
        })
    }

    /// Bundle with `deferred` excluded and verify `module` as the entry.
    ///
    /// `Ok(false)` for any classified failure; unclassified failures are
    /// fatal, as in the heal loop.
    async fn probe(
        &self,
        module: &ModuleKey,
        deferred: &BTreeSet<ModuleKey>,
        norewrite: &BTreeSet<ModuleKey>,
    ) -> Result<bool> {
        let entry = self.entry_key()?;
        let extras = if *module == entry {
            Vec::new()
        } else {
            vec![module.clone()]
        };
        let bundle = self.bundle(deferred, norewrite, &extras).await?;

        let assembled = match assemble_script(&bundle.bundle, &self.assemble_config(module.clone())) {
            Ok(assembled) => assembled,
            Err(err) => {
                debug!(module = %module, error = %err, "probe assembly failed");
                return Ok(false);
            }
        };

        let label = format!("<snapshot:probe:{module}>");
        match self.pool.verify_script(&assembled.script, &label).await {
            Ok(()) => Ok(true),
            Err(error) => match self.classifier.classify(&error) {
                Some(Consequence::Defer | Consequence::NoRewrite) => {
                    debug!(module = %module, %error, "probe failed");
                    Ok(false)
                }
                Some(Consequence::None) | None => Err(HealError::UnclassifiedFailure {
                    key: module.clone(),
                    step: FailedStep::VerifyScript,
                    error,
                }),
            },
        }
    }
}
