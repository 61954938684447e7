use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use toml::{Table, Value};
use tracing::debug;

use pymonorepo_fs::{Simplified, is_contained_relative};

use crate::error::{ValidationError, ValidationErrorKind};

/// The name of our table below `[tool]`.
pub const TOOL_NAME: &str = "monorepo";

/// Windows file names can't contain these and they have no business in a glob.
static CONTROL_CHARACTERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\x00-\x1f\x7f]").expect("control character regex is valid")
});

/// The validated `[tool.monorepo]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolSettings {
    pub config: ToolConfig,
    pub sdist: SdistSettings,
}

/// Whether the project is a workspace of member packages or a single package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolConfig {
    Workspace(WorkspaceConfig),
    Package(PackageConfig),
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self::Package(PackageConfig::default())
    }
}

impl ToolConfig {
    pub fn is_workspace(&self) -> bool {
        matches!(self, Self::Workspace(_))
    }
}

/// `[tool.monorepo.workspace]`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkspaceConfig {
    /// The absolute member directories, in the order of the patterns that matched them.
    pub packages: Vec<PathBuf>,
}

/// `[tool.monorepo.package]`
///
/// Both paths are relative to the project root and exist.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageConfig {
    /// The module file or package directory, instead of the one derived from the project name.
    pub module: Option<PathBuf>,
    /// The Python file to read dynamic metadata from, instead of the module itself.
    pub about: Option<PathBuf>,
}

/// `[tool.monorepo.sdist]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdistSettings {
    /// Select the files tracked by git, instead of all files below the project root.
    pub use_git: bool,
    /// Relative glob patterns of additional files to include.
    pub include: Vec<String>,
    /// Relative glob patterns of files to leave out.
    pub exclude: Vec<String>,
}

impl Default for SdistSettings {
    fn default() -> Self {
        Self {
            use_git: true,
            include: Vec::new(),
            exclude: Vec::new(),
        }
    }
}

/// Validate `[tool.monorepo]`, expanding workspace member globs against `root`.
///
/// A missing table yields the defaults: a single package with the module derived from the
/// project name.
pub fn resolve_tool_config(tree: &Table, root: &Path) -> (ToolSettings, Vec<ValidationError>) {
    let prefix = format!("tool.{TOOL_NAME}");
    let mut errors = Vec::new();
    let mut settings = ToolSettings::default();

    let Some(tool) = tree.get("tool") else {
        return (settings, errors);
    };
    let Some(tool) = tool.as_table() else {
        errors.push(ValidationError::wrong_type("tool", "a table"));
        return (settings, errors);
    };
    let Some(config) = tool.get(TOOL_NAME) else {
        return (settings, errors);
    };
    let Some(config) = config.as_table() else {
        errors.push(ValidationError::wrong_type(prefix, "a table"));
        return (settings, errors);
    };

    unknown_keys(config, &prefix, &["workspace", "package", "sdist"], &mut errors);
    if config.contains_key("workspace") && config.contains_key("package") {
        errors.push(ValidationError::new(
            &prefix,
            ValidationErrorKind::MissingKey,
            "cannot contain both 'workspace' and 'package'",
        ));
    }

    if let Some(workspace) = config.get("workspace") {
        let key = format!("{prefix}.workspace");
        if let Some(workspace) = as_table(workspace, &key, &mut errors) {
            settings.config =
                ToolConfig::Workspace(workspace_config(workspace, &key, root, &mut errors));
        }
    } else if let Some(package) = config.get("package") {
        let key = format!("{prefix}.package");
        if let Some(package) = as_table(package, &key, &mut errors) {
            settings.config =
                ToolConfig::Package(package_config(package, &key, root, &mut errors));
        }
    }

    if let Some(sdist) = config.get("sdist") {
        let key = format!("{prefix}.sdist");
        if let Some(sdist) = as_table(sdist, &key, &mut errors) {
            settings.sdist = sdist_settings(sdist, &key, &mut errors);
        }
    }

    (settings, errors)
}

fn workspace_config(
    table: &Table,
    prefix: &str,
    root: &Path,
    errors: &mut Vec<ValidationError>,
) -> WorkspaceConfig {
    unknown_keys(table, prefix, &["packages"], errors);
    let mut config = WorkspaceConfig::default();
    let Some(packages) = table.get("packages") else {
        return config;
    };
    let key = format!("{prefix}.packages");
    let Some(patterns) = packages.as_array() else {
        errors.push(ValidationError::wrong_type(key, "an array"));
        return config;
    };

    let escaped_root = glob::Pattern::escape(&root.to_string_lossy());
    for (index, pattern) in patterns.iter().enumerate() {
        let key = format!("{key}.{index}");
        let Some(pattern) = pattern.as_str() else {
            errors.push(ValidationError::wrong_type(key, "a string"));
            continue;
        };
        if pattern.starts_with('/') || Path::new(pattern).is_absolute() {
            errors.push(ValidationError::invalid(key, "must be a relative path"));
            continue;
        }
        if !is_contained_relative(pattern) {
            errors.push(ValidationError::invalid(key, "path must not contain '..'"));
            continue;
        }
        let paths = match glob::glob(&format!("{escaped_root}/{pattern}")) {
            Ok(paths) => paths,
            Err(err) => {
                errors.push(ValidationError::invalid(key, format!("invalid glob: {err}")));
                continue;
            }
        };
        let mut matches: Vec<PathBuf> = paths
            .filter_map(Result::ok)
            .filter(|path| path.is_dir())
            .collect();
        if matches.is_empty() {
            errors.push(ValidationError::invalid(key, "no matching directories found"));
            continue;
        }
        matches.sort();
        for path in matches {
            if !config.packages.contains(&path) {
                debug!("Found workspace member: `{}`", path.simplified_display());
                config.packages.push(path);
            }
        }
    }
    config
}

fn package_config(
    table: &Table,
    prefix: &str,
    root: &Path,
    errors: &mut Vec<ValidationError>,
) -> PackageConfig {
    unknown_keys(table, prefix, &["module", "about"], errors);
    PackageConfig {
        module: table
            .get("module")
            .and_then(|value| relative_path(value, &format!("{prefix}.module"), root, errors)),
        about: table
            .get("about")
            .and_then(|value| relative_path(value, &format!("{prefix}.about"), root, errors)),
    }
}

fn sdist_settings(
    table: &Table,
    prefix: &str,
    errors: &mut Vec<ValidationError>,
) -> SdistSettings {
    unknown_keys(table, prefix, &["use-git", "include", "exclude"], errors);
    let mut settings = SdistSettings::default();
    if let Some(use_git) = table.get("use-git") {
        match use_git {
            Value::Boolean(use_git) => settings.use_git = *use_git,
            _ => errors.push(ValidationError::wrong_type(
                format!("{prefix}.use-git"),
                "a boolean",
            )),
        }
    }
    for (name, globs) in [
        ("include", &mut settings.include),
        ("exclude", &mut settings.exclude),
    ] {
        let Some(value) = table.get(name) else {
            continue;
        };
        let key = format!("{prefix}.{name}");
        let Some(items) = value.as_array() else {
            errors.push(ValidationError::wrong_type(key, "an array"));
            continue;
        };
        for (index, item) in items.iter().enumerate() {
            if let Some(glob) = relative_glob(item, &format!("{key}.{index}"), errors) {
                globs.push(glob);
            }
        }
    }
    settings
}

/// Validate a `/`-delimited path relative to `root` that points to an existing file or directory.
fn relative_path(
    value: &Value,
    key: &str,
    root: &Path,
    errors: &mut Vec<ValidationError>,
) -> Option<PathBuf> {
    let Some(value) = value.as_str() else {
        errors.push(ValidationError::wrong_type(key, "a string"));
        return None;
    };
    if value.starts_with('/') || Path::new(value).is_absolute() {
        errors.push(ValidationError::invalid(key, "path must be relative"));
        return None;
    }
    if !is_contained_relative(value) {
        errors.push(ValidationError::invalid(key, "path must not contain '..'"));
        return None;
    }
    let path: PathBuf = value
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect();
    let full_path = root.join(&path);
    if !full_path.exists() {
        errors.push(ValidationError::invalid(
            key,
            format!("path not found: {}", full_path.simplified_display()),
        ));
        return None;
    }
    Some(path)
}

/// Validate a relative glob. A trailing `/` selects everything below the directory.
fn relative_glob(value: &Value, key: &str, errors: &mut Vec<ValidationError>) -> Option<String> {
    let Some(value) = value.as_str() else {
        errors.push(ValidationError::wrong_type(key, "a string"));
        return None;
    };
    if CONTROL_CHARACTERS.is_match(value) {
        errors.push(ValidationError::invalid(
            key,
            "glob must not contain control characters",
        ));
        return None;
    }
    if value.starts_with('/') || Path::new(value).is_absolute() {
        errors.push(ValidationError::invalid(key, "glob must be relative"));
        return None;
    }
    if !is_contained_relative(value) {
        errors.push(ValidationError::invalid(key, "glob must not contain '..'"));
        return None;
    }
    if let Err(err) = glob::Pattern::new(value) {
        errors.push(ValidationError::invalid(key, format!("invalid glob: {err}")));
        return None;
    }
    let glob = value
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/");
    if value.ends_with('/') {
        Some(format!("{glob}/**/*"))
    } else {
        Some(glob)
    }
}

fn as_table<'a>(
    value: &'a Value,
    key: &str,
    errors: &mut Vec<ValidationError>,
) -> Option<&'a Table> {
    let table = value.as_table();
    if table.is_none() {
        errors.push(ValidationError::wrong_type(key, "a table"));
    }
    table
}

fn unknown_keys(table: &Table, prefix: &str, known: &[&str], errors: &mut Vec<ValidationError>) {
    for key in table.keys() {
        if !known.contains(&key.as_str()) {
            errors.push(ValidationError::new(
                format!("{prefix}.{key}"),
                ValidationErrorKind::MissingKey,
                "unknown",
            ));
        }
    }
}
