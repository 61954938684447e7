#![allow(clippy::print_stdout)]

use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use pymonorepo_build_backend::BuildOptions;
use pymonorepo_fs::Simplified;
use pymonorepo_workspace::{ProjectAnalysis, ProjectResolver, ResolverOptions, StaticSourceInfo};

use crate::commands::ExitStatus;

pub(crate) fn build_wheel(
    project: &Path,
    wheel_directory: &Path,
    resolver_options: ResolverOptions,
) -> Result<ExitStatus> {
    let analysis = resolve_project(project, resolver_options)?;
    let options = BuildOptions::from_env();
    let wheel = pymonorepo_build_backend::build_wheel(&analysis, wheel_directory, &options)
        .with_context(|| format!("Failed to build a wheel for `{}`", analysis.name()))?;
    report(&wheel);
    Ok(ExitStatus::Success)
}

pub(crate) fn build_editable(
    project: &Path,
    wheel_directory: &Path,
    resolver_options: ResolverOptions,
) -> Result<ExitStatus> {
    let analysis = resolve_project(project, resolver_options)?;
    let options = BuildOptions::from_env();
    let wheel = pymonorepo_build_backend::build_editable(&analysis, wheel_directory, &options)
        .with_context(|| {
            format!(
                "Failed to build an editable wheel for `{}`",
                analysis.name()
            )
        })?;
    report(&wheel);
    Ok(ExitStatus::Success)
}

pub(crate) fn build_sdist(
    project: &Path,
    sdist_directory: &Path,
    allow_non_vcs: bool,
    resolver_options: ResolverOptions,
) -> Result<ExitStatus> {
    let analysis = resolve_project(project, resolver_options)?;
    let options = BuildOptions {
        allow_non_vcs,
        ..BuildOptions::from_env()
    };
    let sdist = pymonorepo_build_backend::build_sdist(&analysis, sdist_directory, &options)
        .with_context(|| {
            format!(
                "Failed to build a source distribution for `{}`",
                analysis.name()
            )
        })?;
    report(&sdist);
    Ok(ExitStatus::Success)
}

pub(super) fn resolve_project(
    project: &Path,
    options: ResolverOptions,
) -> Result<ProjectAnalysis> {
    let project = std::path::absolute(project)?;
    debug!("Resolving project: `{}`", project.simplified_display());
    let analysis = ProjectResolver::new(options, &StaticSourceInfo)
        .analyse(&project)
        .with_context(|| format!("Failed to resolve `{}`", project.simplified_display()))?;
    Ok(analysis)
}

/// Print the path of the built distribution, for scripts to pick up.
fn report(path: &Path) {
    println!("{}", path.simplified_display());
}
