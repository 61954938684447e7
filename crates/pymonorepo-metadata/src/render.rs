use std::fmt::Write;
use std::path::Path;

use itertools::Itertools;
use tracing::debug;

use pymonorepo_fs::Simplified;

use crate::error::MetadataError;
use crate::project::{Contact, License, ProjectMetadata, Readme};
use crate::format_specifiers;

/// The core metadata of a distribution, the `METADATA` file of a wheel and the `PKG-INFO` file
/// of a source distribution.
///
/// <https://packaging.python.org/en/latest/specifications/core-metadata/>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreMetadata {
    /// `2.1`, or `2.4` if there are `License-File` entries.
    pub metadata_version: String,
    pub name: String,
    pub version: String,
    pub summary: Option<String>,
    pub keywords: Option<String>,
    pub author: Option<String>,
    pub author_email: Option<String>,
    pub license: Option<String>,
    pub license_files: Vec<String>,
    pub classifiers: Vec<String>,
    pub requires_dist: Vec<String>,
    pub maintainer: Option<String>,
    pub maintainer_email: Option<String>,
    pub requires_python: Option<String>,
    pub project_urls: Vec<String>,
    pub provides_extras: Vec<String>,
    pub description_content_type: Option<String>,
    pub description: Option<String>,
}

impl CoreMetadata {
    /// Collect the core metadata fields of a project, reading the readme file below `root`.
    ///
    /// All dynamic fields must already be resolved.
    pub fn from_project(metadata: &ProjectMetadata, root: &Path) -> Result<Self, MetadataError> {
        let version = metadata
            .version
            .as_ref()
            .ok_or_else(|| MetadataError::MissingVersion(metadata.name.clone()))?;

        let (author, author_email) = format_contacts(&metadata.authors);
        let (maintainer, maintainer_email) = format_contacts(&metadata.maintainers);

        let license = metadata
            .licenses
            .iter()
            .filter_map(|license| match license {
                License::Text(text) => Some(text.as_str()),
                License::File(_) => None,
            })
            .join("\n");
        let license_files: Vec<String> = metadata
            .licenses
            .iter()
            .filter_map(|license| match license {
                License::Text(_) => None,
                License::File(path) => Some(path.portable_display().to_string()),
            })
            .collect();
        // `License-File` was introduced with core metadata 2.4.
        let metadata_version = if license_files.is_empty() { "2.1" } else { "2.4" };

        let mut requires_dist: Vec<String> = metadata
            .dependencies
            .iter()
            .map(ToString::to_string)
            .collect();
        for (extra, requirements) in &metadata.optional_dependencies {
            requires_dist.extend(
                requirements
                    .iter()
                    .map(|requirement| requirement.to_extra_string(extra)),
            );
        }

        let description = match &metadata.readme {
            None => None,
            Some(Readme::Text { text, .. }) => Some(text.clone()),
            Some(Readme::File { path, .. }) => {
                let readme = root.join(path);
                debug!("Reading readme: `{}`", readme.simplified_display());
                Some(fs_err::read_to_string(readme)?)
            }
        };

        Ok(Self {
            metadata_version: metadata_version.to_string(),
            name: metadata.name.to_string(),
            version: version.to_string(),
            summary: metadata.description.clone(),
            keywords: if metadata.keywords.is_empty() {
                None
            } else {
                Some(metadata.keywords.join(","))
            },
            author,
            author_email,
            license: if license.is_empty() {
                None
            } else {
                Some(license)
            },
            license_files,
            classifiers: metadata.classifiers.clone(),
            requires_dist,
            maintainer,
            maintainer_email,
            requires_python: metadata.requires_python.as_ref().map(format_specifiers),
            project_urls: metadata
                .urls
                .iter()
                .map(|(name, url)| format!("{name}, {url}"))
                .collect(),
            provides_extras: metadata
                .optional_dependencies
                .keys()
                .map(ToString::to_string)
                .collect(),
            description_content_type: metadata
                .readme
                .as_ref()
                .and_then(Readme::content_type)
                .map(ToString::to_string),
            description,
        })
    }

    /// The header fields in the order they are written, with repeated keys for multi-use fields.
    pub fn headers(&self) -> Vec<(&'static str, &str)> {
        let single = [
            ("Metadata-Version", Some(&self.metadata_version)),
            ("Name", Some(&self.name)),
            ("Version", Some(&self.version)),
            ("Summary", self.summary.as_ref()),
            ("Keywords", self.keywords.as_ref()),
            ("Author", self.author.as_ref()),
            ("Author-email", self.author_email.as_ref()),
            ("License", self.license.as_ref()),
        ];
        let repeated = [
            ("License-File", self.license_files.as_slice()),
            ("Classifier", self.classifiers.as_slice()),
            ("Requires-Dist", self.requires_dist.as_slice()),
        ];
        let people = [
            ("Maintainer", self.maintainer.as_ref()),
            ("Maintainer-email", self.maintainer_email.as_ref()),
            ("Requires-Python", self.requires_python.as_ref()),
        ];
        let links = [
            ("Project-URL", self.project_urls.as_slice()),
            ("Provides-Extra", self.provides_extras.as_slice()),
        ];
        let trailer = [(
            "Description-Content-Type",
            self.description_content_type.as_ref(),
        )];

        single
            .into_iter()
            .filter_map(present)
            .chain(repeated.into_iter().flat_map(repeat_key))
            .chain(people.into_iter().filter_map(present))
            .chain(links.into_iter().flat_map(repeat_key))
            .chain(trailer.into_iter().filter_map(present))
            .collect()
    }

    /// Convert to the pseudo-email format used by Python's METADATA.
    ///
    /// > In the absence of a precise definition, the practical standard is set by what the
    /// > standard library `email.parser` module can parse using the `compat32` policy.
    /// - <https://packaging.python.org/en/latest/specifications/core-metadata/#core-metadata-specifications>
    ///
    /// Multi-line values continue on lines indented past the key, the description follows the
    /// headers as the message body.
    pub fn core_metadata_format(&self) -> String {
        let mut output = String::new();
        for (key, value) in self.headers() {
            let indent = " ".repeat(key.len() + 2);
            let mut lines = value.lines();
            let _ = writeln!(output, "{key}: {}", lines.next().unwrap_or_default());
            for line in lines {
                let _ = writeln!(output, "{indent}{line}");
            }
        }
        if let Some(description) = &self.description {
            output.push('\n');
            output.push_str(description);
        }
        output
    }
}

fn present<'a>(
    (key, value): (&'static str, Option<&'a String>),
) -> Option<(&'static str, &'a str)> {
    value.map(|value| (key, value.as_str()))
}

fn repeat_key<'a>(
    (key, values): (&'static str, &'a [String]),
) -> impl Iterator<Item = (&'static str, &'a str)> {
    values.iter().map(move |value| (key, value.as_str()))
}

/// Split contacts into the name-only `Author` value and the `Author-email` value, where the
/// latter renders as `Name <email>` if both are given.
fn format_contacts(contacts: &[Contact]) -> (Option<String>, Option<String>) {
    let mut names = Vec::new();
    let mut emails = Vec::new();
    for contact in contacts {
        match (&contact.name, &contact.email) {
            (Some(name), Some(email)) => emails.push(format!("{} <{email}>", quote_name(name))),
            (None, Some(email)) => emails.push(email.clone()),
            (Some(name), None) => names.push(name.clone()),
            (None, None) => {}
        }
    }
    let join = |values: Vec<String>| {
        if values.is_empty() {
            None
        } else {
            Some(values.join(", "))
        }
    };
    (join(names), join(emails))
}

/// Quote a display name that contains characters with a special meaning in an email address.
fn quote_name(name: &str) -> String {
    if name.contains([',', '"', '<', '>', '@', ':', ';', '(', ')', '[', ']', '\\']) {
        format!("\"{}\"", name.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        name.to_string()
    }
}

/// Render the `entry_points.txt` file, `None` if there are no entry points.
///
/// Groups and the names within them are sorted.
pub fn entry_points_format(metadata: &ProjectMetadata) -> Option<String> {
    if metadata.entry_points.values().all(indexmap::IndexMap::is_empty) {
        return None;
    }
    let mut writer = String::new();
    for (group, entries) in metadata
        .entry_points
        .iter()
        .sorted_by(|(a, _), (b, _)| a.cmp(b))
    {
        if entries.is_empty() {
            continue;
        }
        writer.push_str(&format!("[{group}]\n"));
        for (name, target) in entries.iter().sorted_by(|(a, _), (b, _)| a.cmp(b)) {
            writer.push_str(&format!("{name} = {target}\n"));
        }
        writer.push('\n');
    }
    Some(writer)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::str::FromStr;

    use indexmap::IndexMap;
    use indoc::indoc;
    use insta::assert_snapshot;
    use tempfile::TempDir;

    use pep508_rs::pep440_rs::{Version, VersionSpecifiers};
    use pep508_rs::{ExtraName, PackageName};

    use super::*;
    use crate::RequirementSpec;

    fn hello_world() -> ProjectMetadata {
        let mut metadata = ProjectMetadata::new(PackageName::from_str("hello-world").unwrap());
        metadata.version = Some(Version::from_str("0.1.0").unwrap());
        metadata
    }

    #[test]
    fn minimal() {
        let metadata = CoreMetadata::from_project(&hello_world(), Path::new("")).unwrap();
        assert_snapshot!(metadata.core_metadata_format(), @r"
        Metadata-Version: 2.1
        Name: hello-world
        Version: 0.1.0
        ");
    }

    #[test]
    fn missing_version() {
        let mut metadata = hello_world();
        metadata.version = None;
        let err = CoreMetadata::from_project(&metadata, Path::new("")).unwrap_err();
        assert_snapshot!(
            err,
            @"Version of `hello-world` is not set, it must be resolved before writing metadata"
        );
    }

    #[test]
    fn full() {
        let temp_dir = TempDir::new().unwrap();
        fs_err::write(
            temp_dir.path().join("README.md"),
            indoc! {r"
                # Hello world

                This is the hello world library.
            "},
        )
        .unwrap();

        let mut metadata = hello_world();
        metadata.description = Some("A Python package".to_string());
        metadata.readme = Some(Readme::File {
            path: PathBuf::from("README.md"),
            content_type: Some("text/markdown".to_string()),
        });
        metadata.licenses = vec![License::Text("MIT\nSee the LICENSE file".to_string())];
        metadata.authors = vec![
            Contact {
                name: Some("Ferris the crab".to_string()),
                email: Some("ferris@rustacean.net".to_string()),
            },
            Contact {
                name: Some("Konsti".to_string()),
                email: None,
            },
            Contact {
                name: Some("Doe, Jane".to_string()),
                email: Some("jane@example.org".to_string()),
            },
        ];
        metadata.maintainers = vec![Contact {
            name: None,
            email: Some("maintainers@example.org".to_string()),
        }];
        metadata.keywords = vec!["demo".to_string(), "example".to_string()];
        metadata.classifiers = vec!["Programming Language :: Python".to_string()];
        metadata.urls = IndexMap::from([(
            "Homepage".to_string(),
            "https://example.org".to_string(),
        )]);
        metadata.requires_python = Some(VersionSpecifiers::from_str(">=3.9,<4").unwrap());
        metadata.dependencies = vec![RequirementSpec::from_str("flask>=3,<4").unwrap()];
        metadata.optional_dependencies = IndexMap::from([(
            ExtraName::from_str("test").unwrap(),
            vec![
                RequirementSpec::from_str("pytest>=8").unwrap(),
                RequirementSpec::from_str("pywin32 ; sys_platform == 'win32'").unwrap(),
            ],
        )]);

        let core_metadata = CoreMetadata::from_project(&metadata, temp_dir.path()).unwrap();
        assert_snapshot!(core_metadata.core_metadata_format(), @r#"
        Metadata-Version: 2.1
        Name: hello-world
        Version: 0.1.0
        Summary: A Python package
        Keywords: demo,example
        Author: Konsti
        Author-email: Ferris the crab <ferris@rustacean.net>, "Doe, Jane" <jane@example.org>
        License: MIT
                 See the LICENSE file
        Classifier: Programming Language :: Python
        Requires-Dist: flask>=3,<4
        Requires-Dist: pytest>=8 ; extra == "test"
        Requires-Dist: pywin32 ; (sys_platform == 'win32') and extra == "test"
        Maintainer-email: maintainers@example.org
        Requires-Python: >=3.9,<4
        Project-URL: Homepage, https://example.org
        Provides-Extra: test
        Description-Content-Type: text/markdown

        # Hello world

        This is the hello world library.
        "#);
    }

    #[test]
    fn license_files() {
        let mut metadata = hello_world();
        metadata.licenses = vec![
            License::File(PathBuf::from("LICENSE")),
            License::File(PathBuf::from("vendor").join("LICENSE.txt")),
        ];
        let core_metadata = CoreMetadata::from_project(&metadata, Path::new("")).unwrap();
        assert_snapshot!(core_metadata.core_metadata_format(), @r"
        Metadata-Version: 2.4
        Name: hello-world
        Version: 0.1.0
        License-File: LICENSE
        License-File: vendor/LICENSE.txt
        ");
    }

    #[test]
    fn header_order() {
        let mut metadata = hello_world();
        metadata.description = Some(String::new());
        metadata.requires_python = Some(VersionSpecifiers::from_str(">=3.10").unwrap());
        metadata.classifiers = vec!["Typing :: Typed".to_string()];
        metadata.licenses = vec![
            License::File(PathBuf::from("LICENSE")),
            License::Text("Apache-2.0".to_string()),
        ];
        metadata.optional_dependencies =
            IndexMap::from([(ExtraName::from_str("cli").unwrap(), Vec::new())]);
        let core_metadata = CoreMetadata::from_project(&metadata, Path::new("")).unwrap();
        assert_eq!(
            core_metadata.headers(),
            [
                ("Metadata-Version", "2.4"),
                ("Name", "hello-world"),
                ("Version", "0.1.0"),
                ("Summary", ""),
                ("License", "Apache-2.0"),
                ("License-File", "LICENSE"),
                ("Classifier", "Typing :: Typed"),
                ("Requires-Python", ">=3.10"),
                ("Provides-Extra", "cli"),
            ]
        );
        assert_eq!(
            core_metadata.core_metadata_format(),
            indoc! {"
                Metadata-Version: 2.4
                Name: hello-world
                Version: 0.1.0
                Summary:\x20
                License: Apache-2.0
                License-File: LICENSE
                Classifier: Typing :: Typed
                Requires-Python: >=3.10
                Provides-Extra: cli
            "}
        );
    }

    #[test]
    fn entry_points() {
        let mut metadata = hello_world();
        assert_eq!(entry_points_format(&metadata), None);

        metadata.entry_points.insert(
            "pytest11".to_string(),
            IndexMap::from([("hello".to_string(), "hello_world.plugin".to_string())]),
        );
        metadata.entry_points.insert(
            "console_scripts".to_string(),
            IndexMap::from([
                ("hello".to_string(), "hello_world.cli:main".to_string()),
                ("goodbye".to_string(), "hello_world.cli:bye".to_string()),
            ]),
        );
        assert_snapshot!(entry_points_format(&metadata).unwrap(), @r"
        [console_scripts]
        goodbye = hello_world.cli:bye
        hello = hello_world.cli:main

        [pytest11]
        hello = hello_world.plugin
        ");
    }
}
