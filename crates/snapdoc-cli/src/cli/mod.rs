//! Command-line interface definition.
//!
//! - `snapdoc heal` - classify every module and store the results
//! - `snapdoc build` - heal, then write the snapshot script and artifacts
//! - `snapdoc graph` - show the bundle's module graph
//! - `snapdoc translate` - map a row of `snapshot.js` back to its source
//! - `snapdoc check` - validate the configuration

mod commands;
mod validation;

use clap::Parser;

pub use commands::{
    BuildArgs, CheckArgs, Command, GraphArgs, HealArgs, ProjectArgs, TranslateArgs,
};
pub use validation::{parse_max_workers, parse_module_key};

/// snapdoc - prepare Node.js applications for V8 startup snapshots
#[derive(Parser, Debug)]
#[command(
    name = "snapdoc",
    version,
    about = "Prepare Node.js applications for V8 startup snapshots",
    long_about = "snapdoc bundles an application into a single snapshot script, finds the modules\n\
                  that cannot run while a V8 snapshot is created, and defers them or bundles them\n\
                  without rewriting until the rest of the application can be snapshotted."
)]
pub struct Cli {
    /// Enable verbose logging (debug level)
    ///
    /// Logs every verification outcome, stage and pass of the heal run.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}
