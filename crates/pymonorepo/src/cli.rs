use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use pymonorepo_workspace::ModuleDiscovery;

#[derive(Parser)]
#[command(name = "pymonorepo", author, version, about)]
#[command(propagate_version = true)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Commands,

    /// Use verbose output, `-vv` for trace output.
    ///
    /// You can configure fine-grained logging using the `PYMONOREPO_LOG` environment variable.
    /// (<https://docs.rs/tracing-subscriber/latest/tracing_subscriber/filter/struct.EnvFilter.html#directives>)
    #[arg(global = true, action = clap::ArgAction::Count, long, short)]
    pub(crate) verbose: u8,

    /// How to find the module of a project that doesn't configure
    /// `tool.monorepo.package.module`.
    #[arg(global = true, long, value_enum, default_value = "first-match")]
    pub(crate) module_discovery: ModuleDiscovery,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Show the resolved metadata, modules and workspace dependencies of a project.
    Analyse(AnalyseArgs),
    /// Build a wheel.
    Wheel(BuildArgs),
    /// Build an editable wheel, which puts the module directories on `sys.path`.
    Editable(BuildArgs),
    /// Build a source distribution.
    Sdist(SdistArgs),
}

#[derive(Args)]
pub(crate) struct AnalyseArgs {
    /// The project or workspace directory, containing a `pyproject.toml`.
    #[arg(default_value = ".")]
    pub(crate) project: PathBuf,
}

#[derive(Args)]
pub(crate) struct BuildArgs {
    /// The project or workspace directory, containing a `pyproject.toml`.
    #[arg(default_value = ".")]
    pub(crate) project: PathBuf,

    /// The directory to write the distribution to.
    #[arg(long, short, default_value = "dist")]
    pub(crate) out_dir: PathBuf,
}

#[derive(Args)]
pub(crate) struct SdistArgs {
    #[command(flatten)]
    pub(crate) build: BuildArgs,

    /// Include all files if the project is not in a git repository, instead of failing.
    #[arg(long)]
    pub(crate) allow_non_vcs: bool,
}
