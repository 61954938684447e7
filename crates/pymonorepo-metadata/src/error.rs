use std::fmt::{self, Display, Formatter};
use std::io;
use std::path::PathBuf;

use pymonorepo_fs::Simplified;
use thiserror::Error;

use pep508_rs::PackageName;

/// The category of a field-level problem in `pyproject.toml`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationErrorKind {
    /// A required key is absent, or a key is present that isn't allowed.
    MissingKey,
    /// The value has the wrong TOML type.
    WrongType,
    /// The value has the right type but isn't valid.
    InvalidValue,
}

impl ValidationErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MissingKey => "missing-key",
            Self::WrongType => "wrong-type",
            Self::InvalidValue => "invalid-value",
        }
    }
}

impl Display for ValidationErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single field-level problem, addressed by its dotted path into the TOML tree, e.g.
/// `project.dependencies.2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub key: String,
    pub kind: ValidationErrorKind,
    pub message: String,
}

impl ValidationError {
    pub fn new(
        key: impl Into<String>,
        kind: ValidationErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            kind,
            message: message.into(),
        }
    }

    pub fn missing(key: impl Into<String>) -> Self {
        Self::new(key, ValidationErrorKind::MissingKey, "missing")
    }

    pub fn wrong_type(key: impl Into<String>, expected: &str) -> Self {
        Self::new(key, ValidationErrorKind::WrongType, format!("must be {expected}"))
    }

    pub fn invalid(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(key, ValidationErrorKind::InvalidValue, message)
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} [{}]", self.key, self.message, self.kind)
    }
}

/// All field-level problems found in one `pyproject.toml`.
#[derive(Debug, Clone, Error)]
pub struct ValidationErrors {
    pub path: PathBuf,
    pub errors: Vec<ValidationError>,
}

impl Display for ValidationErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid `{}`:", self.path.simplified_display())?;
        for error in &self.errors {
            write!(f, "\n- {error}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("Version of `{0}` is not set, it must be resolved before writing metadata")]
    MissingVersion(PackageName),
}
