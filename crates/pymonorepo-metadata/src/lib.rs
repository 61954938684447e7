//! Typed project metadata for `pyproject.toml` based projects.
//!
//! The raw TOML table is validated into a [`ProjectMetadata`] and a [`ToolSettings`] here and
//! never leaves this crate. Field-level problems are collected as [`ValidationError`]s instead of
//! failing on the first one.

pub use error::{MetadataError, ValidationError, ValidationErrorKind, ValidationErrors};
pub use project::{Contact, DynamicField, License, ProjectMetadata, Readme};
pub use render::{CoreMetadata, entry_points_format};
pub use requirement::{RequirementSpec, reduce};
pub use tool::{
    PackageConfig, SdistSettings, TOOL_NAME, ToolConfig, ToolSettings, WorkspaceConfig,
    resolve_tool_config,
};
pub use validate::{ProjectValidation, validate_project};

use pep508_rs::pep440_rs::VersionSpecifiers;

mod error;
mod project;
mod render;
mod requirement;
mod tool;
mod validate;

/// Render a specifier set in the compact `>=1,<2` form used by core metadata.
pub fn format_specifiers(specifiers: &VersionSpecifiers) -> String {
    specifiers.iter().map(ToString::to_string).collect::<Vec<_>>().join(",")
}
