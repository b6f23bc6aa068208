use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::cli::validation::{parse_max_workers, parse_module_key};
use crate::config::{ConfigOverrides, SourcemapOption};

/// Available snapdoc subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Classify every module as healthy, deferred or norewrite
    ///
    /// Bundles the application repeatedly, verifying each module as the
    /// entry of a snapshot script, until the classification settles. The
    /// result is stored in the cache directory and seeds the next run.
    Heal(HealArgs),

    /// Heal, then write the snapshot script
    ///
    /// Writes snapshot.js, snapshot-bundle.js, snapshot-meta.json and, with
    /// --sourcemap external, snapshot.js.map to the cache directory.
    Build(BuildArgs),

    /// Show the module graph of the current bundle
    ///
    /// Bundles once with the stored classification and prints direct and
    /// transitive dependencies, import cycles and the leaf-first order.
    Graph(GraphArgs),

    /// Map a row of the snapshot script back to its source module
    Translate(TranslateArgs),

    /// Validate the configuration without bundling
    Check(CheckArgs),
}

/// Project selection and configuration overrides shared by all commands.
#[derive(Args, Debug, Clone, Default)]
pub struct ProjectArgs {
    /// Config file (default: ./snapdoc.config.json when present)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Entry module, relative to the project directory
    #[arg(short, long, value_name = "FILE")]
    pub entry: Option<PathBuf>,

    /// Project directory
    #[arg(long, value_name = "DIR")]
    pub base_dir: Option<PathBuf>,

    /// Directory for snapshot artifacts (default: <base-dir>/.snapdoc)
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Snapshot bundler executable
    #[arg(long, value_name = "PATH")]
    pub bundler: Option<PathBuf>,

    /// Node.js executable used for verification
    #[arg(long, value_name = "PATH")]
    pub node: Option<PathBuf>,

    /// Maximum concurrent verifications
    #[arg(short = 'j', long, value_name = "N", value_parser = parse_max_workers)]
    pub max_workers: Option<usize>,

    /// Time limit per verification in milliseconds (0 disables)
    #[arg(long, value_name = "MS")]
    pub verify_timeout_ms: Option<u64>,

    /// Keep the deferred set as found by the heal loop
    #[arg(long)]
    pub no_optimize: bool,

    /// Initialize healthy modules that the entry no longer reaches
    #[arg(long)]
    pub include_healthy_orphans: bool,

    /// Defer every module outside node_modules up front
    #[arg(long)]
    pub node_modules_only: bool,

    /// Ignore results stored by a previous run
    #[arg(long)]
    pub no_cache: bool,

    /// Module key to always bundle without rewriting (repeatable)
    #[arg(long = "force-no-rewrite", value_name = "KEY", value_parser = parse_module_key)]
    pub force_no_rewrite: Vec<String>,
}

impl ProjectArgs {
    /// Configuration values given on the command line.
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            entry: self.entry.clone(),
            base_dir: self.base_dir.clone(),
            cache_dir: self.cache_dir.clone(),
            bundler: self.bundler.clone(),
            node: self.node.clone(),
            max_workers: self.max_workers,
            verify_timeout_ms: self.verify_timeout_ms,
            optimize: self.no_optimize.then_some(false),
            include_healthy_orphans: self.include_healthy_orphans.then_some(true),
            force_no_rewrite: (!self.force_no_rewrite.is_empty())
                .then(|| self.force_no_rewrite.clone()),
            sourcemap: None,
            node_modules_only: self.node_modules_only.then_some(true),
            use_cache: self.no_cache.then_some(false),
        }
    }
}

/// Arguments for the heal command
#[derive(Args, Debug)]
pub struct HealArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Print the classification as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the build command
#[derive(Args, Debug)]
pub struct BuildArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Source map output
    #[arg(long, value_enum)]
    pub sourcemap: Option<SourcemapOption>,
}

impl BuildArgs {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            sourcemap: self.sourcemap,
            ..self.project.overrides()
        }
    }
}

/// Arguments for the graph command
#[derive(Args, Debug)]
pub struct GraphArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Only show this module key
    #[arg(short, long, value_name = "KEY", value_parser = parse_module_key)]
    pub module: Option<String>,

    /// Print the graph as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the translate command
#[derive(Args, Debug)]
pub struct TranslateArgs {
    /// Zero-based row of the snapshot script
    #[arg(value_name = "ROW")]
    pub row: u32,

    /// Snapshot script to read (default: <cache-dir>/snapshot.js)
    #[arg(short, long, value_name = "FILE")]
    pub script: Option<PathBuf>,

    #[command(flatten)]
    pub project: ProjectArgs,
}

/// Arguments for the check command
#[derive(Args, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Print the JSON schema of snapdoc.config.json and exit
    #[arg(long)]
    pub print_schema: bool,
}
