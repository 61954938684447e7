//! Write wheels and source distributions for resolved projects.
//!
//! All writers are reproducible: entries are added in a deterministic order, permissions are
//! normalized and timestamps come from [`SourceDateEpoch`].

pub use error::Error;
pub use git::{GitError, GitTrackedFiles, TrackedFiles, find_git_root};
pub use record::RecordEntry;
pub use source_dist::{SdistWriter, build_sdist};
pub use timestamp::SourceDateEpoch;
pub use wheel::{
    DirectoryWriter, WheelName, WheelWriter, build_editable, build_wheel, prepare_metadata,
};

use std::path::{Path, PathBuf};

mod error;
mod files;
mod git;
mod record;
mod source_dist;
mod timestamp;
mod wheel;


/// Common interface of the zip, tar and plain directory writers.
///
/// All paths are `/`-separated strings since archives are portable between platforms.
///
/// Contract: call [`ArchiveWriter::finish`] to obtain a valid output. A writer dropped without
/// finishing removes what it wrote so far.
pub trait ArchiveWriter {
    /// Add a file with the given content.
    fn write_bytes(&mut self, path: &str, bytes: &[u8]) -> Result<RecordEntry, Error>;

    /// Add a UTF-8 text file.
    fn write_text(&mut self, path: &str, text: &str) -> Result<RecordEntry, Error> {
        self.write_bytes(path, text.as_bytes())
    }

    /// Add a local file, streaming its content.
    fn write_path(&mut self, path: &str, source: &Path) -> Result<RecordEntry, Error>;

    /// Finalize the output and return its path.
    fn finish(self) -> Result<PathBuf, Error>
    where
        Self: Sized;
}

/// Options shared by all builds.
#[derive(Clone, Copy)]
pub struct BuildOptions<'a> {
    /// If the project is not in a git repository, include all files in the source distribution
    /// instead of failing.
    pub allow_non_vcs: bool,
    pub source_date_epoch: SourceDateEpoch,
    /// Lists the files under version control.
    pub tracked_files: &'a dyn TrackedFiles,
}

impl Default for BuildOptions<'static> {
    fn default() -> Self {
        Self {
            allow_non_vcs: false,
            source_date_epoch: SourceDateEpoch::Unset,
            tracked_files: &GitTrackedFiles,
        }
    }
}

impl BuildOptions<'static> {
    /// The default options with the timestamp read from `SOURCE_DATE_EPOCH`.
    pub fn from_env() -> Self {
        Self {
            source_date_epoch: SourceDateEpoch::from_env(),
            ..Self::default()
        }
    }
}

impl std::fmt::Debug for BuildOptions<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildOptions")
            .field("allow_non_vcs", &self.allow_non_vcs)
            .field("source_date_epoch", &self.source_date_epoch)
            .finish_non_exhaustive()
    }
}
