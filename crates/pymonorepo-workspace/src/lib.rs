//! Resolve a project directory, or a workspace of project directories, into a single
//! [`ProjectAnalysis`].
//!
//! A workspace is a project that declares its members in `[tool.monorepo.workspace]` and derives
//! its license files, `requires-python`, dependencies and entry points from them. Members are
//! resolved one after the other in declaration order, conflicts between them are fatal.

pub use analysis::{
    ProjectAnalysis, ProjectResolver, ResolverOptions, analyse_project, read_pyproject_toml,
};
pub use dynamic::resolve_dynamic;
pub use error::Error;
pub use locate::{Module, ModuleDiscovery, locate_module};
pub use source_info::{
    SourceInfo, SourceInfoError, SourceInfoExtractor, StaticSourceInfo, parse_source_info,
};

mod analysis;
mod dynamic;
mod error;
mod locate;
mod source_info;
mod workspace;

#[cfg(test)]
mod tests;
