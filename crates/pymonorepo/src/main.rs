use std::process::ExitCode;

use anstream::eprintln;
use anyhow::Result;
use clap::Parser;
use owo_colors::OwoColorize;

use pymonorepo_workspace::ResolverOptions;

use crate::cli::{Cli, Commands};
use crate::commands::ExitStatus;

mod cli;
mod commands;
mod logging;

fn run() -> Result<ExitStatus> {
    let cli = Cli::parse();

    logging::setup_logging(logging::Level::from_verbosity(cli.verbose))?;

    let resolver_options = ResolverOptions {
        module_discovery: cli.module_discovery,
    };
    match cli.command {
        Commands::Analyse(args) => commands::analyse(&args.project, resolver_options),
        Commands::Wheel(args) => {
            commands::build_wheel(&args.project, &args.out_dir, resolver_options)
        }
        Commands::Editable(args) => {
            commands::build_editable(&args.project, &args.out_dir, resolver_options)
        }
        Commands::Sdist(args) => commands::build_sdist(
            &args.build.project,
            &args.build.out_dir,
            args.allow_non_vcs,
            resolver_options,
        ),
    }
}

#[allow(clippy::print_stderr)]
fn main() -> ExitCode {
    match run() {
        Ok(code) => code.into(),
        Err(err) => {
            let mut causes = err.chain();
            if let Some(err) = causes.next() {
                eprintln!("{}: {}", "error".red().bold(), err);
            }
            for err in causes {
                eprintln!("  {}: {}", "Caused by".red().bold(), err);
            }
            ExitStatus::Error.into()
        }
    }
}
