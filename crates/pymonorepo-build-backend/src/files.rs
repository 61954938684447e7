use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use tracing::{debug, trace, warn};
use walkdir::WalkDir;

use pymonorepo_fs::Simplified;

use crate::Error;
use crate::git::TrackedFiles;

/// Which files below a root make it into an archive.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FileSelection<'a> {
    /// Start from the files tracked by git instead of all files.
    pub(crate) use_git: bool,
    /// Walk the file system if the tracked files can't be listed.
    pub(crate) allow_non_vcs: bool,
    /// Globs relative to the root whose files are added.
    pub(crate) include: &'a [String],
    /// Globs relative to the root whose files are removed.
    pub(crate) exclude: &'a [String],
    /// The setting the globs come from, for error messages.
    pub(crate) field: &'a str,
}

/// Gather the files below `root`, sorted by path.
///
/// 1. All tracked files, or all files when git is not used.
/// 2. Plus files matching an include glob.
/// 3. Minus `__pycache__` directories and `.pyc` files.
/// 4. Minus files matching an exclude glob.
pub(crate) fn gather_files(
    root: &Path,
    selection: &FileSelection,
    tracked_files: &dyn TrackedFiles,
) -> Result<Vec<PathBuf>, Error> {
    let mut files = if selection.use_git {
        match tracked_files.tracked_files(root) {
            Ok(files) => files
                .into_iter()
                .filter(|path| path.is_file())
                .collect(),
            Err(err) if selection.allow_non_vcs => {
                warn!(
                    "Including all files in `{}`, the tracked files can't be listed: {err}",
                    root.simplified_display()
                );
                walk_files(root)?
            }
            Err(err) => {
                return Err(Error::Git {
                    root: root.to_path_buf(),
                    err,
                });
            }
        }
    } else {
        walk_files(root)?
    };

    for include in selection.include {
        let pattern = format!("{}/{include}", glob::Pattern::escape(&root.to_string_lossy()));
        let paths = glob::glob(&pattern).map_err(|err| Error::Pattern {
            field: selection.field.to_string(),
            glob: include.clone(),
            err,
        })?;
        for path in paths {
            let path = path.map_err(glob::GlobError::into_error)?;
            if path.is_file() {
                trace!("Including: `{}`", path.simplified_display());
                files.insert(path);
            }
        }
    }

    files.retain(|path| !is_bytecode(path));

    let excludes = exclude_matcher(selection)?;
    files.retain(|path| {
        let excluded = path
            .strip_prefix(root)
            .is_ok_and(|relative| excludes.is_match(relative));
        if excluded {
            trace!("Excluding: `{}`", path.simplified_display());
        }
        !excluded
    });

    debug!(
        "Gathered {} files from: `{}`",
        files.len(),
        root.simplified_display()
    );
    Ok(files.into_iter().collect())
}

/// All files below `root`, skipping `.git` directories.
fn walk_files(root: &Path) -> Result<BTreeSet<PathBuf>, Error> {
    let mut files = BTreeSet::new();
    for entry in WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !(entry.file_type().is_dir() && entry.file_name() == ".git"))
    {
        let entry = entry.map_err(|err| Error::WalkDir {
            root: root.to_path_buf(),
            err,
        })?;
        if entry.file_type().is_file() {
            files.insert(entry.into_path());
        }
    }
    Ok(files)
}

fn is_bytecode(path: &Path) -> bool {
    path.extension().is_some_and(|extension| extension == "pyc")
        || path
            .components()
            .any(|component| component == Component::Normal("__pycache__".as_ref()))
}

/// Exclude globs match relative paths, with `*` not crossing directory boundaries.
fn exclude_matcher(selection: &FileSelection) -> Result<GlobSet, Error> {
    let mut builder = GlobSetBuilder::new();
    for exclude in selection.exclude {
        let glob = GlobBuilder::new(exclude)
            .literal_separator(true)
            .build()
            .map_err(|err| Error::GlobSet {
                field: selection.field.to_string(),
                glob: exclude.clone(),
                err,
            })?;
        builder.add(glob);
    }
    builder.build().map_err(|err| Error::GlobSet {
        field: selection.field.to_string(),
        glob: selection.exclude.join(", "),
        err,
    })
}

/// Normalize permissions to `644`, or `755` if any executable bit is set. Version control only
/// tracks the executable bit, the rest depends on the umask.
pub(crate) fn normalized_mode(path: &Path) -> Result<u32, Error> {
    #[cfg(unix)]
    let executable = {
        use std::os::unix::fs::PermissionsExt;
        fs_err::metadata(path)?.permissions().mode() & 0o111 != 0
    };
    // Windows has no executable bit
    #[cfg(not(unix))]
    let executable = {
        let _ = path;
        false
    };
    Ok(if executable { 0o755 } else { 0o644 })
}
