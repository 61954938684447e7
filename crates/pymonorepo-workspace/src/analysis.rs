use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use toml::Table;
use tracing::debug;

use pep508_rs::PackageName;
use pymonorepo_fs::{Simplified, normalize_path};
use pymonorepo_metadata::{
    ProjectMetadata, RequirementSpec, ToolConfig, ToolSettings, ValidationErrors,
    resolve_tool_config, validate_project,
};

use crate::dynamic::resolve_dynamic;
use crate::locate::{ModuleDiscovery, locate_module};
use crate::source_info::{SourceInfoExtractor, StaticSourceInfo};
use crate::workspace::resolve_workspace;
use crate::Error;

/// A fully resolved project, ready to be built.
#[derive(Debug, Clone)]
pub struct ProjectAnalysis {
    /// The absolute project directory, containing the `pyproject.toml`.
    pub root: PathBuf,
    pub is_workspace: bool,
    /// The metadata with all dynamic fields resolved.
    pub metadata: ProjectMetadata,
    pub tool: ToolSettings,
    /// The import name and absolute path of each module.
    pub modules: BTreeMap<String, PathBuf>,
    /// For workspaces, the dependencies of each member on other members. Every member has an
    /// entry.
    pub dependency_graph: BTreeMap<PackageName, Vec<RequirementSpec>>,
}

impl ProjectAnalysis {
    pub fn name(&self) -> &PackageName {
        &self.metadata.name
    }

    /// The name with `-` replaced by `_`.
    pub fn snake_name(&self) -> String {
        self.metadata.snake_name()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolverOptions {
    pub module_discovery: ModuleDiscovery,
}

/// Resolves project directories into [`ProjectAnalysis`]es.
pub struct ProjectResolver<'a> {
    options: ResolverOptions,
    source_info: &'a dyn SourceInfoExtractor,
}

impl<'a> ProjectResolver<'a> {
    pub fn new(options: ResolverOptions, source_info: &'a dyn SourceInfoExtractor) -> Self {
        Self {
            options,
            source_info,
        }
    }

    /// Resolve the project or workspace at `root`.
    pub fn analyse(&self, root: &Path) -> Result<ProjectAnalysis, Error> {
        self.analyse_inner(root, false)
    }

    /// Resolve a workspace member, which must not be a workspace itself.
    pub(crate) fn analyse_member(&self, root: &Path) -> Result<ProjectAnalysis, Error> {
        self.analyse_inner(root, true)
    }

    fn analyse_inner(&self, root: &Path, in_workspace: bool) -> Result<ProjectAnalysis, Error> {
        let root = normalize_path(std::path::absolute(root)?);
        let (mut metadata, tool) = read_pyproject_toml(&root)?;

        let package = match &tool.config {
            ToolConfig::Workspace(workspace) => {
                if in_workspace {
                    return Err(Error::NestedWorkspace(root));
                }
                let workspace = workspace.clone();
                return resolve_workspace(self, root, metadata, tool, &workspace);
            }
            ToolConfig::Package(package) => package,
        };

        debug!(
            "Resolving package `{}` in: `{}`",
            metadata.name,
            root.simplified_display()
        );
        let module = locate_module(
            &root,
            &metadata.snake_name(),
            package.module.as_deref(),
            self.options.module_discovery,
        )?;
        if !metadata.dynamic.is_empty() {
            let source = match &package.about {
                Some(about) => root.join(about),
                None => module.init_file(),
            };
            resolve_dynamic(&mut metadata, &source, self.source_info)?;
        }

        Ok(ProjectAnalysis {
            root,
            is_workspace: false,
            metadata,
            tool,
            modules: BTreeMap::from([(module.name, module.path)]),
            dependency_graph: BTreeMap::new(),
        })
    }
}

/// Resolve the project or workspace at `root` with the default options, reading dynamic
/// metadata with [`StaticSourceInfo`].
pub fn analyse_project(root: &Path) -> Result<ProjectAnalysis, Error> {
    ProjectResolver::new(ResolverOptions::default(), &StaticSourceInfo).analyse(root)
}

/// Read and validate `{root}/pyproject.toml`, reporting all field-level problems at once.
pub fn read_pyproject_toml(root: &Path) -> Result<(ProjectMetadata, ToolSettings), Error> {
    let path = root.join("pyproject.toml");
    if !path.is_file() {
        return Err(Error::MissingPyprojectToml(root.to_path_buf()));
    }
    let contents = fs_err::read_to_string(&path)?;
    let tree: Table = toml::from_str(&contents).map_err(|err| Error::Toml {
        path: path.clone(),
        err,
    })?;

    let validation = validate_project(&tree, root);
    let (tool, tool_errors) = resolve_tool_config(&tree, root);
    let mut errors = validation.errors;
    errors.extend(tool_errors);
    match validation.metadata {
        Some(metadata) if errors.is_empty() => Ok((metadata, tool)),
        _ => Err(ValidationErrors { path, errors }.into()),
    }
}
