use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::LazyLock;

use thiserror::Error;
use tracing::debug;

use pymonorepo_fs::Simplified;

#[derive(Debug, Error)]
pub enum GitError {
    #[error("Git executable not found. Ensure that Git is installed and available.")]
    GitNotFound,
    #[error(transparent)]
    Other(#[from] which::Error),
    #[error("Not inside a git repository: `{}`", _0.simplified_display())]
    NotARepository(PathBuf),
    #[error("`git {args}` failed ({status}):\n{stderr}")]
    Command {
        args: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A global cache of the result of `which git`.
static GIT: LazyLock<Result<PathBuf, which::Error>> = LazyLock::new(|| which::which("git"));

/// Lists the files under version control below a directory.
pub trait TrackedFiles {
    /// The absolute paths of all tracked files below `root`.
    fn tracked_files(&self, root: &Path) -> Result<BTreeSet<PathBuf>, GitError>;
}

/// Lists tracked files with `git ls-files`, including the files of submodules.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitTrackedFiles;

impl TrackedFiles for GitTrackedFiles {
    fn tracked_files(&self, root: &Path) -> Result<BTreeSet<PathBuf>, GitError> {
        if find_git_root(root).is_none() {
            return Err(GitError::NotARepository(root.to_path_buf()));
        }
        let git = match &*GIT {
            Ok(git) => git,
            Err(which::Error::CannotFindBinaryPath) => return Err(GitError::GitNotFound),
            Err(err) => return Err(GitError::Other(err.clone())),
        };

        let args = ["ls-files", "--recurse-submodules", "-z"];
        debug!(
            "Running `git {}` in: `{}`",
            args.join(" "),
            root.simplified_display()
        );
        let output = Command::new(git).args(args).current_dir(root).output()?;
        if !output.status.success() {
            return Err(GitError::Command {
                args: args.join(" "),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        // Paths are relative to the working directory and always `/`-separated.
        Ok(output
            .stdout
            .split(|byte| *byte == b'\0')
            .filter(|location| !location.is_empty())
            .map(|location| {
                String::from_utf8_lossy(location)
                    .split('/')
                    .fold(root.to_path_buf(), |path, segment| path.join(segment))
            })
            .collect())
    }
}

/// The closest ancestor of `path` (including itself) that contains a `.git` entry.
pub fn find_git_root(path: &Path) -> Option<&Path> {
    path.ancestors()
        .find(|ancestor| ancestor.join(".git").exists())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::{GitError, GitTrackedFiles, TrackedFiles, find_git_root};

    #[test]
    fn not_a_repository() {
        let temp_dir = TempDir::new().unwrap();
        // Temporary directories are usually not inside a repository, but CI checkouts may be.
        if find_git_root(temp_dir.path()).is_some() {
            return;
        }
        let err = GitTrackedFiles.tracked_files(temp_dir.path()).unwrap_err();
        assert!(matches!(err, GitError::NotARepository(_)), "{err}");
    }

    #[test]
    fn git_root() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("a").join("b");
        fs_err::create_dir_all(&nested).unwrap();
        fs_err::create_dir(temp_dir.path().join("a").join(".git")).unwrap();
        assert_eq!(
            find_git_root(&nested),
            Some(temp_dir.path().join("a").as_path())
        );
    }
}
