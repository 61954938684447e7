use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use itertools::Itertools;
use tracing::debug;

use pep508_rs::PackageName;
use pep508_rs::pep440_rs::VersionSpecifiers;
use pymonorepo_fs::{Simplified, relative_to};
use pymonorepo_metadata::{
    DynamicField, License, ProjectMetadata, RequirementSpec, ToolSettings, WorkspaceConfig,
    format_specifiers, reduce,
};

use crate::analysis::{ProjectAnalysis, ProjectResolver};
use crate::Error;

/// The fields a workspace computes from its members, which it must declare as dynamic.
pub(crate) const WORKSPACE_DYNAMIC: [DynamicField; 6] = [
    DynamicField::License,
    DynamicField::RequiresPython,
    DynamicField::Dependencies,
    DynamicField::EntryPoints,
    DynamicField::Scripts,
    DynamicField::GuiScripts,
];

/// Resolve each member of the workspace at `root` and merge them into one project.
///
/// Members are resolved in the order of `config.packages`, which also determines the order of
/// the merged entry points and external dependencies.
pub(crate) fn resolve_workspace(
    resolver: &ProjectResolver,
    root: PathBuf,
    mut metadata: ProjectMetadata,
    mut tool: ToolSettings,
    config: &WorkspaceConfig,
) -> Result<ProjectAnalysis, Error> {
    check_dynamic(&root, &metadata)?;

    let mut members: IndexMap<PackageName, ProjectAnalysis> = IndexMap::new();
    for path in &config.packages {
        debug!("Resolving workspace member: `{}`", path.simplified_display());
        let member = resolver.analyse_member(path)?;
        if let Some(existing) = members.get(member.name()) {
            return Err(Error::DuplicatePackage {
                name: member.name().clone(),
                first: existing.root.clone(),
                second: member.root,
            });
        }
        members.insert(member.name().clone(), member);
    }

    metadata.licenses = collate_licenses(&root, &members)?;
    metadata.requires_python = collate_requires_python(&members);
    metadata.entry_points = collate_entry_points(&members)?;
    let modules = collate_modules(&members)?;
    let (dependencies, dependency_graph) = collate_dependencies(&members)?;
    metadata.dependencies = dependencies;
    for member in members.values() {
        let prefix = relative_to(&member.root, &root)?
            .portable_display()
            .into_owned();
        let prefixed = |glob: &String| {
            if prefix.is_empty() {
                glob.clone()
            } else {
                format!("{prefix}/{glob}")
            }
        };
        tool.sdist
            .include
            .extend(member.tool.sdist.include.iter().map(prefixed));
        tool.sdist
            .exclude
            .extend(member.tool.sdist.exclude.iter().map(prefixed));
    }
    metadata.dynamic.clear();

    Ok(ProjectAnalysis {
        root,
        is_workspace: true,
        metadata,
        tool,
        modules,
        dependency_graph,
    })
}

/// The workspace computes exactly the fields in [`WORKSPACE_DYNAMIC`], so it must declare all of
/// them as dynamic and nothing else.
fn check_dynamic(root: &Path, metadata: &ProjectMetadata) -> Result<(), Error> {
    let expected: BTreeSet<DynamicField> = WORKSPACE_DYNAMIC.into_iter().collect();
    if metadata.dynamic == expected {
        return Ok(());
    }
    Err(Error::WorkspaceDynamic {
        root: root.to_path_buf(),
        missing: expected.difference(&metadata.dynamic).copied().collect(),
        unexpected: metadata.dynamic.difference(&expected).copied().collect(),
    })
}

/// The license files of all members, relative to the workspace root. License texts of members
/// can't be combined and are dropped.
fn collate_licenses(
    root: &Path,
    members: &IndexMap<PackageName, ProjectAnalysis>,
) -> Result<Vec<License>, Error> {
    let mut licenses = Vec::new();
    for member in members.values() {
        for license in &member.metadata.licenses {
            if let License::File(path) = license {
                licenses.push(License::File(relative_to(member.root.join(path), root)?));
            }
        }
    }
    Ok(licenses)
}

/// The intersection of the `requires-python` of all members that declare one.
fn collate_requires_python(
    members: &IndexMap<PackageName, ProjectAnalysis>,
) -> Option<VersionSpecifiers> {
    let declared: Vec<&VersionSpecifiers> = members
        .values()
        .filter_map(|member| member.metadata.requires_python.as_ref())
        .collect();
    if declared.is_empty() {
        return None;
    }
    let mut specifiers = Vec::new();
    for specifier in declared.into_iter().flat_map(|specifiers| specifiers.iter()) {
        if !specifiers.contains(specifier) {
            specifiers.push(specifier.clone());
        }
    }
    Some(specifiers.into_iter().collect())
}

fn collate_entry_points(
    members: &IndexMap<PackageName, ProjectAnalysis>,
) -> Result<IndexMap<String, IndexMap<String, String>>, Error> {
    let mut entry_points: IndexMap<String, IndexMap<String, String>> = IndexMap::new();
    let mut origins: HashMap<(&str, &str), &Path> = HashMap::new();
    for member in members.values() {
        for (group, entries) in &member.metadata.entry_points {
            let merged = entry_points.entry(group.clone()).or_default();
            for (name, target) in entries {
                let origin = member.root.as_path();
                if let Some(first) = origins.insert((group.as_str(), name.as_str()), origin) {
                    return Err(Error::DuplicateEntryPoint {
                        group: group.clone(),
                        name: name.clone(),
                        first: first.to_path_buf(),
                        second: member.root.clone(),
                    });
                }
                merged.insert(name.clone(), target.clone());
            }
        }
    }
    Ok(entry_points)
}

fn collate_modules(
    members: &IndexMap<PackageName, ProjectAnalysis>,
) -> Result<BTreeMap<String, PathBuf>, Error> {
    let mut modules = BTreeMap::new();
    for member in members.values() {
        for (name, path) in &member.modules {
            if let Some(first) = modules.insert(name.clone(), path.clone()) {
                return Err(Error::DuplicateModule {
                    name: name.clone(),
                    first,
                    second: path.clone(),
                });
            }
        }
    }
    Ok(modules)
}

type DependencyGraph = BTreeMap<PackageName, Vec<RequirementSpec>>;

/// Split the member dependencies into edges between members and external dependencies.
///
/// Edges must be satisfied by the version of the member they point to. External dependencies
/// are merged with [`reduce`].
fn collate_dependencies(
    members: &IndexMap<PackageName, ProjectAnalysis>,
) -> Result<(Vec<RequirementSpec>, DependencyGraph), Error> {
    let mut external = Vec::new();
    let mut graph = DependencyGraph::new();
    for member in members.values() {
        let mut edges = Vec::new();
        for dependency in &member.metadata.dependencies {
            let Some(target) = members.get(&dependency.name) else {
                external.push(dependency.clone());
                continue;
            };
            if let Some(version) = &target.metadata.version {
                if !dependency.specifiers.contains(version) {
                    return Err(Error::WorkspaceVersionMismatch {
                        consumer: member.root.clone(),
                        dependency: dependency.name.clone(),
                        specifiers: format_specifiers(&dependency.specifiers),
                        target: target.root.clone(),
                        version: version.clone(),
                    });
                }
            }
            if !dependency.extras.is_empty() {
                return Err(Error::WorkspaceExtras {
                    consumer: member.root.clone(),
                    dependency: dependency.name.clone(),
                    extras: dependency.extras.iter().map(ToString::to_string).collect(),
                });
            }
            edges.push(dependency.clone());
        }
        debug!(
            "Workspace member `{}` depends on: [{}]",
            member.name(),
            edges.iter().map(|edge| edge.name.to_string()).join(", ")
        );
        graph.insert(member.name().clone(), edges);
    }
    Ok((reduce(external), graph))
}
