//! snapdoc CLI - heal and build V8 startup snapshots.
//!
//! Parses arguments, sets up logging and dispatches to the command
//! implementations.

use clap::Parser;
use miette::Result;
use snapdoc_cli::{cli, commands, error, logger, ui};

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    logger::init_logger(args.verbose, args.quiet, args.no_color);
    ui::init_colors(args.no_color);

    let result = match args.command {
        cli::Command::Heal(heal_args) => commands::heal_execute(heal_args).await,
        cli::Command::Build(build_args) => commands::build_execute(build_args).await,
        cli::Command::Graph(graph_args) => commands::graph_execute(graph_args).await,
        cli::Command::Translate(translate_args) => commands::translate_execute(translate_args),
        cli::Command::Check(check_args) => commands::check_execute(check_args),
    };

    result.map_err(error::cli_error_to_miette)
}
