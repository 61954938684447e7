use std::collections::BTreeSet;
use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;
use std::str::FromStr;

use indexmap::IndexMap;

use pep508_rs::pep440_rs::{Version, VersionSpecifiers};
use pep508_rs::{ExtraName, PackageName};

use crate::RequirementSpec;

/// The validated `[project]` table.
///
/// Paths in [`Readme::File`] and [`License::File`] are relative to the project root and contain
/// neither absolute prefixes nor `..` segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectMetadata {
    pub name: PackageName,
    pub version: Option<Version>,
    pub description: Option<String>,
    pub readme: Option<Readme>,
    pub licenses: Vec<License>,
    pub authors: Vec<Contact>,
    pub maintainers: Vec<Contact>,
    pub keywords: Vec<String>,
    pub classifiers: Vec<String>,
    pub urls: IndexMap<String, String>,
    pub requires_python: Option<VersionSpecifiers>,
    pub dependencies: Vec<RequirementSpec>,
    pub optional_dependencies: IndexMap<ExtraName, Vec<RequirementSpec>>,
    /// Entry point groups, including `console_scripts` and `gui_scripts` populated from
    /// `project.scripts` and `project.gui-scripts`.
    pub entry_points: IndexMap<String, IndexMap<String, String>>,
    pub dynamic: BTreeSet<DynamicField>,
}

impl ProjectMetadata {
    pub fn new(name: PackageName) -> Self {
        Self {
            name,
            version: None,
            description: None,
            readme: None,
            licenses: Vec::new(),
            authors: Vec::new(),
            maintainers: Vec::new(),
            keywords: Vec::new(),
            classifiers: Vec::new(),
            urls: IndexMap::new(),
            requires_python: None,
            dependencies: Vec::new(),
            optional_dependencies: IndexMap::new(),
            entry_points: IndexMap::new(),
            dynamic: BTreeSet::new(),
        }
    }

    /// The name with `-` replaced by `_`, as used for the dist-info directory, the wheel
    /// filename and the default module name.
    pub fn snake_name(&self) -> String {
        self.name.as_ref().replace('-', "_")
    }
}

/// `project.readme`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readme {
    Text {
        text: String,
        content_type: Option<String>,
    },
    File {
        path: PathBuf,
        content_type: Option<String>,
    },
}

impl Readme {
    pub fn content_type(&self) -> Option<&str> {
        match self {
            Self::Text { content_type, .. } | Self::File { content_type, .. } => {
                content_type.as_deref()
            }
        }
    }
}

/// `project.license`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum License {
    Text(String),
    File(PathBuf),
}

/// An entry of `project.authors` or `project.maintainers`; at least one field is set.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Contact {
    pub name: Option<String>,
    pub email: Option<String>,
}

/// A `[project]` field that may be listed in `project.dynamic`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DynamicField {
    Version,
    Description,
    Readme,
    RequiresPython,
    License,
    Authors,
    Maintainers,
    Keywords,
    Classifiers,
    Urls,
    Scripts,
    GuiScripts,
    EntryPoints,
    Dependencies,
    OptionalDependencies,
}

impl DynamicField {
    pub const ALL: [Self; 15] = [
        Self::Version,
        Self::Description,
        Self::Readme,
        Self::RequiresPython,
        Self::License,
        Self::Authors,
        Self::Maintainers,
        Self::Keywords,
        Self::Classifiers,
        Self::Urls,
        Self::Scripts,
        Self::GuiScripts,
        Self::EntryPoints,
        Self::Dependencies,
        Self::OptionalDependencies,
    ];

    /// The key in the `[project]` table.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Version => "version",
            Self::Description => "description",
            Self::Readme => "readme",
            Self::RequiresPython => "requires-python",
            Self::License => "license",
            Self::Authors => "authors",
            Self::Maintainers => "maintainers",
            Self::Keywords => "keywords",
            Self::Classifiers => "classifiers",
            Self::Urls => "urls",
            Self::Scripts => "scripts",
            Self::GuiScripts => "gui-scripts",
            Self::EntryPoints => "entry-points",
            Self::Dependencies => "dependencies",
            Self::OptionalDependencies => "optional-dependencies",
        }
    }
}

impl FromStr for DynamicField {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|field| field.as_str() == s)
            .ok_or(())
    }
}

impl Display for DynamicField {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
