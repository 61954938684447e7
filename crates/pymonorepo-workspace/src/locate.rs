use std::path::{Path, PathBuf};

use tracing::debug;

use pymonorepo_fs::Simplified;

use crate::Error;

/// How to pick the module of a project when none is configured explicitly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum ModuleDiscovery {
    /// Use the first existing candidate, in the order `{name}/`, `src/{name}/`, `{name}.py`,
    /// `src/{name}.py`.
    #[default]
    FirstMatch,
    /// Require exactly one existing candidate.
    Unique,
}

/// The importable module of a project, either a package directory or a single file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    /// The import name.
    pub name: String,
    /// The absolute path of the package directory or the module file.
    pub path: PathBuf,
}

impl Module {
    /// The file that holds the module level docstring and globals.
    pub fn init_file(&self) -> PathBuf {
        if self.path.is_dir() {
            self.path.join("__init__.py")
        } else {
            self.path.clone()
        }
    }
}

/// Find the module of the project at `root`.
///
/// An explicit `module` path (relative to `root`) is used as is: a directory is a package named
/// after the directory, a file is a module named after its stem. Otherwise the module name is the
/// project name with `-` replaced by `_` and the conventional layouts are probed.
pub fn locate_module(
    root: &Path,
    snake_name: &str,
    module: Option<&Path>,
    discovery: ModuleDiscovery,
) -> Result<Module, Error> {
    if let Some(module) = module {
        let path = root.join(module);
        let name = if path.is_dir() {
            path.file_name()
        } else {
            path.file_stem()
        }
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
        debug!(
            "Using configured module `{name}`: `{}`",
            path.simplified_display()
        );
        return Ok(Module { name, path });
    }

    let candidates = [
        (root.join(snake_name), true),
        (root.join("src").join(snake_name), true),
        (root.join(format!("{snake_name}.py")), false),
        (root.join("src").join(format!("{snake_name}.py")), false),
    ];
    let mut matches = candidates
        .iter()
        .filter(|(path, is_dir)| if *is_dir { path.is_dir() } else { path.is_file() })
        .map(|(path, _)| path.clone());

    let Some(path) = matches.next() else {
        return Err(Error::ModuleNotFound {
            name: snake_name.to_string(),
            candidates: candidates.into_iter().map(|(path, _)| path).collect(),
        });
    };
    if discovery == ModuleDiscovery::Unique {
        let others: Vec<PathBuf> = matches.collect();
        if !others.is_empty() {
            return Err(Error::AmbiguousModule {
                name: snake_name.to_string(),
                matches: std::iter::once(path).chain(others).collect(),
            });
        }
    }
    debug!(
        "Found module `{snake_name}`: `{}`",
        path.simplified_display()
    );
    Ok(Module {
        name: snake_name.to_string(),
        path,
    })
}
