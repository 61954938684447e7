use std::io;
use std::path::PathBuf;

use itertools::Itertools;
use thiserror::Error;

use pep508_rs::PackageName;
use pep508_rs::pep440_rs::{Version, VersionParseError};
use pymonorepo_fs::Simplified;
use pymonorepo_metadata::{DynamicField, ValidationErrors};

use crate::source_info::SourceInfoError;

/// A problem that stops the resolution of a project.
///
/// Field-level problems of a single `pyproject.toml` are all reported together through
/// [`Error::Validation`], the other variants are raised as soon as they are found.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("No `pyproject.toml` found in: `{}`", _0.simplified_display())]
    MissingPyprojectToml(PathBuf),
    #[error("Invalid `{}`", path.simplified_display())]
    Toml {
        path: PathBuf,
        #[source]
        err: toml::de::Error,
    },
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error("Workspaces cannot contain other workspaces: `{}`", _0.simplified_display())]
    NestedWorkspace(PathBuf),
    #[error(
        "Workspace `project.dynamic` must be exactly [{}], missing: [{}], unexpected: [{}]: `{}`",
        crate::workspace::WORKSPACE_DYNAMIC.iter().join(", "),
        missing.iter().join(", "),
        unexpected.iter().join(", "),
        root.simplified_display()
    )]
    WorkspaceDynamic {
        root: PathBuf,
        missing: Vec<DynamicField>,
        unexpected: Vec<DynamicField>,
    },
    #[error(
        "Duplicate package name `{name}` in `{}` and `{}`",
        first.simplified_display(),
        second.simplified_display()
    )]
    DuplicatePackage {
        name: PackageName,
        first: PathBuf,
        second: PathBuf,
    },
    #[error(
        "Module `{name}` defined in both `{}` and `{}`",
        first.simplified_display(),
        second.simplified_display()
    )]
    DuplicateModule {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },
    #[error(
        "Entry point `{group}.{name}` defined in both `{}` and `{}`",
        first.simplified_display(),
        second.simplified_display()
    )]
    DuplicateEntryPoint {
        group: String,
        name: String,
        first: PathBuf,
        second: PathBuf,
    },
    #[error(
        "`{}` requires `{dependency}{specifiers}`, but the workspace member in `{}` has version `{version}`",
        consumer.simplified_display(),
        target.simplified_display()
    )]
    WorkspaceVersionMismatch {
        consumer: PathBuf,
        dependency: PackageName,
        specifiers: String,
        target: PathBuf,
        version: Version,
    },
    #[error(
        "Extras on dependencies between workspace members are not implemented: `{}` requires `{dependency}[{}]`",
        consumer.simplified_display(),
        extras.join(",")
    )]
    WorkspaceExtras {
        consumer: PathBuf,
        dependency: PackageName,
        extras: Vec<String>,
    },
    #[error(
        "No module found for `{name}`, tried: {}",
        candidates.iter().map(|path| format!("`{}`", path.simplified_display())).join(", ")
    )]
    ModuleNotFound {
        name: String,
        candidates: Vec<PathBuf>,
    },
    #[error(
        "Multiple modules found for `{name}`: {}",
        matches.iter().map(|path| format!("`{}`", path.simplified_display())).join(", ")
    )]
    AmbiguousModule { name: String, matches: Vec<PathBuf> },
    #[error(
        "Dynamic fields [{}] not found in `{}`",
        fields.iter().join(", "),
        path.simplified_display()
    )]
    MissingDynamic {
        path: PathBuf,
        fields: Vec<DynamicField>,
    },
    #[error("Invalid dynamic version `{version}` in `{}`", path.simplified_display())]
    DynamicVersion {
        path: PathBuf,
        version: String,
        #[source]
        err: VersionParseError,
    },
    #[error("Failed to read metadata from `{}`", path.simplified_display())]
    SourceInfo {
        path: PathBuf,
        #[source]
        err: SourceInfoError,
    },
}

impl Error {
    /// Whether this is a feature that is recognized but not supported yet.
    pub fn is_not_implemented(&self) -> bool {
        matches!(self, Self::WorkspaceExtras { .. })
    }
}
