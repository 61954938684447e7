use std::io;
use std::path::PathBuf;

use thiserror::Error;

use pymonorepo_fs::Simplified;
use pymonorepo_metadata::MetadataError;

use crate::git::GitError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error("Failed to write wheel zip archive")]
    Zip(#[from] zip::result::ZipError),
    #[error("Failed to write RECORD file")]
    Csv(#[from] csv::Error),
    #[error("Failed to write to `{}`", _0.simplified_display())]
    TarWrite(PathBuf, #[source] io::Error),
    #[error("Failed to walk source tree: `{}`", root.simplified_display())]
    WalkDir {
        root: PathBuf,
        #[source]
        err: walkdir::Error,
    },
    #[error("Failed to list the files tracked by git in `{}`", root.simplified_display())]
    Git {
        root: PathBuf,
        #[source]
        err: GitError,
    },
    #[error("Invalid glob in `{field}`: `{glob}`")]
    Pattern {
        field: String,
        glob: String,
        #[source]
        err: glob::PatternError,
    },
    #[error("Invalid glob in `{field}`: `{glob}`")]
    GlobSet {
        field: String,
        glob: String,
        #[source]
        err: globset::Error,
    },
    #[error("Module not found: `{}`", _0.simplified_display())]
    MissingModule(PathBuf),
}
