//! `snapdoc graph`: module graph of the bundle for the stored classification.

use std::collections::BTreeSet;

use owo_colors::OwoColorize;
use serde::Serialize;
use snapdoc_bundler::{BundleRequest, Bundler};
use snapdoc_graph::{CircularImports, DependencyMap, Metafile, ModuleKey, sort_by_leafness};

use crate::cli::GraphArgs;
use crate::commands::utils;
use crate::config::Project;
use crate::error::{CliError, Result};
use crate::ui;

/// One module of the graph.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleReport {
    pub key: ModuleKey,
    pub direct_deps: Vec<ModuleKey>,
    pub transitive_deps: usize,
    pub cycle_partners: Vec<ModuleKey>,
}

/// Output of `snapdoc graph`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphReport {
    pub modules: Vec<ModuleReport>,
    /// Modules ordered so each comes after its imports.
    pub leafness: Vec<ModuleKey>,
    pub cycles: Vec<Vec<ModuleKey>>,
}

pub async fn execute(args: GraphArgs) -> Result<()> {
    let cwd = utils::get_cwd()?;
    let project = Project::load(&args.project.overrides(), args.project.config.as_deref(), &cwd)?;
    utils::validate_project(&project)?;

    let mut norewrite: BTreeSet<ModuleKey> = project.force_no_rewrite()?.into_iter().collect();
    let mut deferred = Vec::new();
    if let Some(seed) = utils::load_seed(&project) {
        deferred = seed.deferred;
        norewrite.extend(seed.norewrite);
    }

    let request = BundleRequest::new(&project.base_dir, &project.entry)
        .deferred(&deferred)
        .norewrite(&norewrite)
        .doctor(true);
    let spinner = ui::Spinner::new("Bundling...");
    let output = match project.bundler().create_bundle(&request).await {
        Ok(output) => output,
        Err(e) => {
            spinner.fail("Bundling failed");
            return Err(e.into());
        }
    };
    spinner.finish(&format!("Bundled {} modules", output.metafile.inputs.len()));

    let module = args.module.as_deref().map(ModuleKey::new).transpose()?;
    let report = graph_report(&output.metafile, module.as_ref())?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

/// Build the report for every module, or only for `module`.
pub fn graph_report(metafile: &Metafile, module: Option<&ModuleKey>) -> Result<GraphReport> {
    if let Some(key) = module {
        if !metafile.contains(key) {
            return Err(CliError::InvalidArgument(format!(
                "'{key}' is not part of the bundle"
            )));
        }
    }

    let deps = DependencyMap::build(metafile);
    let circular = CircularImports::detect_all(metafile);

    let modules = metafile
        .keys()
        .filter(|key| module.is_none_or(|wanted| wanted == *key))
        .map(|key| ModuleReport {
            key: key.clone(),
            direct_deps: deps
                .direct_deps(key)
                .map(|direct| direct.iter().collect::<BTreeSet<_>>().into_iter().cloned().collect())
                .unwrap_or_default(),
            transitive_deps: deps.all_deps(key).map_or(0, |all| all.len()),
            cycle_partners: circular.cycle_partners(key).into_iter().collect(),
        })
        .collect();

    Ok(GraphReport {
        modules,
        leafness: sort_by_leafness(metafile, metafile.keys(), &circular),
        cycles: circular.cycles().to_vec(),
    })
}

fn print_report(report: &GraphReport) {
    for module in &report.modules {
        println!(
            "{} {}",
            module.key.bold(),
            format!(
                "({} direct, {} transitive)",
                module.direct_deps.len(),
                module.transitive_deps
            )
            .dimmed()
        );
        for dep in &module.direct_deps {
            println!("  -> {dep}");
        }
        if !module.cycle_partners.is_empty() {
            let partners: Vec<&str> = module.cycle_partners.iter().map(ModuleKey::as_str).collect();
            println!("  {} {}", "cycle with".yellow(), partners.join(", "));
        }
    }
    if report.modules.len() > 1 {
        println!("\n{}", "Leaf-first order".bold().underline());
        for (index, key) in report.leafness.iter().enumerate() {
            println!("  {:>4}. {key}", index + 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // index -> a -> b -> a (cycle), index -> c
    fn metafile() -> Metafile {
        Metafile::from_json(
            r#"{
                "inputs": {
                    "./index.js": { "bytes": 1, "imports": [
                        { "path": "./a.js", "kind": "require-call" },
                        { "path": "./c.js", "kind": "require-call" }
                    ] },
                    "./a.js": { "bytes": 1, "imports": [{ "path": "./b.js", "kind": "require-call" }] },
                    "./b.js": { "bytes": 1, "imports": [{ "path": "./a.js", "kind": "require-call" }] },
                    "./c.js": { "bytes": 1, "imports": [] }
                }
            }"#,
        )
        .unwrap()
    }

    fn key(raw: &str) -> ModuleKey {
        ModuleKey::new(raw).unwrap()
    }

    #[test]
    fn reports_every_module() {
        let report = graph_report(&metafile(), None).unwrap();
        assert_eq!(report.modules.len(), 4);

        let index = report.modules.iter().find(|m| m.key == key("./index.js")).unwrap();
        assert_eq!(index.direct_deps, vec![key("./a.js"), key("./c.js")]);
        assert_eq!(index.transitive_deps, 3);
        assert!(index.cycle_partners.is_empty());

        let a = report.modules.iter().find(|m| m.key == key("./a.js")).unwrap();
        assert_eq!(a.cycle_partners, vec![key("./b.js")]);

        assert_eq!(report.cycles.len(), 1);
        assert_eq!(report.leafness.last(), Some(&key("./index.js")));
    }

    #[test]
    fn filters_to_one_module() {
        let report = graph_report(&metafile(), Some(&key("./c.js"))).unwrap();
        assert_eq!(report.modules.len(), 1);
        assert_eq!(report.modules[0].key, key("./c.js"));

        let err = graph_report(&metafile(), Some(&key("./missing.js"))).unwrap_err();
        assert!(matches!(err, CliError::InvalidArgument(_)));
    }

    #[test]
    fn report_serializes_camel_case() {
        let json = serde_json::to_value(graph_report(&metafile(), None).unwrap()).unwrap();
        assert!(json["modules"][0].get("directDeps").is_some());
        assert!(json["modules"][0].get("cyclePartners").is_some());
    }
}
