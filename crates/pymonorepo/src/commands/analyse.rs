#![allow(clippy::print_stdout)]

use std::fmt::Write;
use std::path::Path;

use anstream::println;
use anyhow::Result;
use owo_colors::OwoColorize;

use pymonorepo_fs::Simplified;
use pymonorepo_metadata::{License, format_specifiers};
use pymonorepo_workspace::{ProjectAnalysis, ResolverOptions};

use crate::commands::ExitStatus;
use crate::commands::build::resolve_project;

/// Show what a build of the project would be made from.
pub(crate) fn analyse(project: &Path, resolver_options: ResolverOptions) -> Result<ExitStatus> {
    let analysis = resolve_project(project, resolver_options)?;
    println!("{}", render(&analysis)?);
    Ok(ExitStatus::Success)
}

fn render(analysis: &ProjectAnalysis) -> Result<String> {
    let metadata = &analysis.metadata;
    let mut output = String::new();

    let version = metadata
        .version
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| "(no version)".to_string());
    let kind = if analysis.is_workspace {
        "workspace"
    } else {
        "project"
    };
    writeln!(
        output,
        "{} {} ({kind}): `{}`",
        metadata.name.bold(),
        version.bold(),
        analysis.root.simplified_display()
    )?;
    if let Some(requires_python) = &metadata.requires_python {
        writeln!(
            output,
            "{}: {}",
            "requires-python".cyan(),
            format_specifiers(requires_python)
        )?;
    }

    writeln!(output, "{}:", "modules".cyan())?;
    for (name, path) in &analysis.modules {
        writeln!(output, "  {name}: `{}`", path.simplified_display())?;
    }

    if !metadata.dependencies.is_empty() {
        writeln!(output, "{}:", "dependencies".cyan())?;
        for dependency in &metadata.dependencies {
            writeln!(output, "  {dependency}")?;
        }
    }

    for (member, edges) in &analysis.dependency_graph {
        if edges.is_empty() {
            continue;
        }
        let edges = edges
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        writeln!(output, "{} {member}: {edges}", "workspace dependencies of".cyan())?;
    }

    for (group, entries) in &metadata.entry_points {
        writeln!(output, "{} {group}:", "entry points".cyan())?;
        for (name, target) in entries {
            writeln!(output, "  {name} = {target}")?;
        }
    }

    for license in &metadata.licenses {
        match license {
            License::File(path) => {
                writeln!(output, "{}: `{}`", "license file".cyan(), path.portable_display())?;
            }
            License::Text(text) => {
                writeln!(output, "{}: {}", "license".cyan(), text.lines().next().unwrap_or(""))?;
            }
        }
    }

    Ok(output.trim_end().to_string())
}
