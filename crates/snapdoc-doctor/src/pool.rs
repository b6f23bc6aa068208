//! Bounded concurrent verification of one stage.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use snapdoc_bundler::{AssembleConfig, ScriptError, ScriptVerifier, assemble_script};
use snapdoc_graph::ModuleKey;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{Instrument, debug, debug_span};

use crate::{HealError, Result};

/// Which step of an isolated verification failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailedStep {
    AssembleScript,
    VerifyScript,
}

impl std::fmt::Display for FailedStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailedStep::AssembleScript => f.write_str("failed:assembleScript"),
            FailedStep::VerifyScript => f.write_str("failed:verifyScript"),
        }
    }
}

/// Result of verifying one module as the sole entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleOutcome {
    Healthy,
    Failed { step: FailedStep, error: ScriptError },
}

/// Log label of an isolated verification.
pub fn entry_label(key: &ModuleKey) -> String {
    format!("<snapshot:entry:{key}>")
}

/// Runs isolated verifications with bounded parallelism.
#[derive(Clone)]
pub struct VerifyPool {
    verifier: Arc<dyn ScriptVerifier>,
    max_workers: usize,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for VerifyPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerifyPool")
            .field("max_workers", &self.max_workers)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl VerifyPool {
    pub fn new(verifier: Arc<dyn ScriptVerifier>, max_workers: usize, timeout: Option<Duration>) -> Self {
        Self {
            verifier,
            max_workers: max_workers.max(1),
            timeout,
        }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Verify every module of `stage` against the bundle at `bundle_path`.
    ///
    /// Returns once every job has finished, sorted by module key. The bundle
    /// file must stay in place until then.
    pub async fn verify_stage(
        &self,
        bundle_path: &Path,
        stage: &[ModuleKey],
        config: &AssembleConfig,
    ) -> Result<Vec<(ModuleKey, ModuleOutcome)>> {
        let mut join_set = JoinSet::new();
        let semaphore = Arc::new(Semaphore::new(self.max_workers));

        for key in stage {
            let key = key.clone();
            let path = bundle_path.to_path_buf();
            let config = config.for_entry(key.clone());
            let verifier = Arc::clone(&self.verifier);
            let permit = Arc::clone(&semaphore);
            let timeout = self.timeout;
            let span = debug_span!("verify", label = %entry_label(&key));

            join_set.spawn(
                async move {
                    let _permit = permit
                        .acquire_owned()
                        .await
                        .map_err(|_| HealError::TaskPanicked("verification pool closed".to_string()))?;
                    let outcome = verify_one(verifier.as_ref(), &path, &config, timeout).await?;
                    Ok::<_, HealError>((key, outcome))
                }
                .instrument(span),
            );
        }

        let mut results = Vec::with_capacity(stage.len());
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(result) => results.push(result?),
                Err(join_err) => {
                    return Err(HealError::TaskPanicked(format!(
                        "verification task panicked: {join_err}"
                    )));
                }
            }
        }

        results.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(results)
    }

    /// Verify one assembled script under the pool's time limit.
    pub async fn verify_script(&self, script: &str, label: &str) -> std::result::Result<(), ScriptError> {
        verify_with_limit(self.verifier.as_ref(), script, label, self.timeout).await
    }
}

async fn verify_with_limit(
    verifier: &dyn ScriptVerifier,
    script: &str,
    label: &str,
    timeout: Option<Duration>,
) -> std::result::Result<(), ScriptError> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, verifier.verify(script, label))
            .await
            .unwrap_or_else(|_| Err(ScriptError::timeout(label, limit))),
        None => verifier.verify(script, label).await,
    }
}

async fn verify_one(
    verifier: &dyn ScriptVerifier,
    bundle_path: &Path,
    config: &AssembleConfig,
    timeout: Option<Duration>,
) -> Result<ModuleOutcome> {
    let bundle = tokio::fs::read_to_string(bundle_path).await?;
    let label = entry_label(&config.entry);

    let assembled = match assemble_script(&bundle, config) {
        Ok(assembled) => assembled,
        Err(err) => {
            debug!(error = %err, "assembly failed");
            return Ok(ModuleOutcome::Failed {
                step: FailedStep::AssembleScript,
                error: ScriptError::assembly(err.to_string()),
            });
        }
    };

    Ok(match verify_with_limit(verifier, &assembled.script, &label, timeout).await {
        Ok(()) => {
            debug!("healthy");
            ModuleOutcome::Healthy
        }
        Err(error) => {
            debug!(%error, "verification failed");
            ModuleOutcome::Failed {
                step: FailedStep::VerifyScript,
                error,
            }
        }
    })
}
