use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use indexmap::IndexMap;
use toml::{Table, Value};
use tracing::trace;

use pep508_rs::pep440_rs::{Version, VersionSpecifiers};
use pep508_rs::{ExtraName, PackageName};
use pymonorepo_fs::is_contained_relative;

use crate::error::{ValidationError, ValidationErrorKind};
use crate::project::{Contact, DynamicField, License, ProjectMetadata, Readme};
use crate::RequirementSpec;

/// The outcome of validating a `[project]` table.
///
/// `metadata` is only `None` if there is no usable `[project]` table or no usable name. In all
/// other cases it contains every field that passed validation, even if `errors` is not empty.
#[derive(Debug, Clone)]
pub struct ProjectValidation {
    pub metadata: Option<ProjectMetadata>,
    pub errors: Vec<ValidationError>,
}

impl ProjectValidation {
    /// The metadata if there are no errors, the errors otherwise.
    pub fn into_result(self) -> Result<ProjectMetadata, Vec<ValidationError>> {
        match self.metadata {
            Some(metadata) if self.errors.is_empty() => Ok(metadata),
            _ => Err(self.errors),
        }
    }
}

/// Validate the `[project]` table of a parsed `pyproject.toml`.
///
/// Every problem is recorded and validation continues with the next field or item, so a single
/// pass reports all of them. `root` is the directory of the `pyproject.toml`, file references are
/// resolved against it.
pub fn validate_project(tree: &Table, root: &Path) -> ProjectValidation {
    let mut validator = Validator {
        root,
        errors: Vec::new(),
    };
    let metadata = validator.project(tree);
    ProjectValidation {
        metadata,
        errors: validator.errors,
    }
}

const KNOWN_FIELDS: [&str; 17] = [
    "name",
    "version",
    "description",
    "readme",
    "requires-python",
    "license",
    "authors",
    "maintainers",
    "keywords",
    "classifiers",
    "urls",
    "entry-points",
    "scripts",
    "gui-scripts",
    "dependencies",
    "optional-dependencies",
    "dynamic",
];

struct Validator<'a> {
    root: &'a Path,
    errors: Vec<ValidationError>,
}

impl Validator<'_> {
    fn project(&mut self, tree: &Table) -> Option<ProjectMetadata> {
        let Some(project) = tree.get("project") else {
            self.errors.push(ValidationError::missing("project"));
            return None;
        };
        let Some(project) = project.as_table() else {
            self.errors
                .push(ValidationError::wrong_type("project", "a table"));
            return None;
        };

        for key in project.keys() {
            if !KNOWN_FIELDS.contains(&key.as_str()) {
                self.errors.push(ValidationError::new(
                    format!("project.{key}"),
                    ValidationErrorKind::MissingKey,
                    "unknown",
                ));
            }
        }

        let dynamic = self.dynamic(project);
        let name = self.name(project);

        let version = match project.get("version") {
            Some(value) => self.version(value),
            None => {
                if !dynamic.contains(&DynamicField::Version) {
                    self.errors.push(ValidationError::new(
                        "project.version",
                        ValidationErrorKind::MissingKey,
                        "missing and not in project.dynamic",
                    ));
                }
                None
            }
        };
        let description = project
            .get("description")
            .and_then(|value| self.string(value, "project.description"));
        let readme = project.get("readme").and_then(|value| self.readme(value));
        let licenses = project
            .get("license")
            .and_then(|value| self.license(value))
            .into_iter()
            .collect();
        let authors = project
            .get("authors")
            .map(|value| self.contacts(value, "project.authors"))
            .unwrap_or_default();
        let maintainers = project
            .get("maintainers")
            .map(|value| self.contacts(value, "project.maintainers"))
            .unwrap_or_default();
        let keywords = project
            .get("keywords")
            .map(|value| self.strings(value, "project.keywords"))
            .unwrap_or_default();
        let classifiers = project
            .get("classifiers")
            .map(|value| self.strings(value, "project.classifiers"))
            .unwrap_or_default();
        let urls = project
            .get("urls")
            .and_then(|value| self.string_table(value, "project.urls"))
            .unwrap_or_default();
        let requires_python = project
            .get("requires-python")
            .and_then(|value| self.requires_python(value));
        let dependencies = project
            .get("dependencies")
            .map(|value| self.requirements(value, "project.dependencies"))
            .unwrap_or_default();
        let optional_dependencies = project
            .get("optional-dependencies")
            .map(|value| self.optional_dependencies(value))
            .unwrap_or_default();
        let mut entry_points = project
            .get("entry-points")
            .map(|value| self.entry_points(value))
            .unwrap_or_default();
        for (key, group) in [("scripts", "console_scripts"), ("gui-scripts", "gui_scripts")] {
            if let Some(value) = project.get(key) {
                if let Some(scripts) = self.string_table(value, &format!("project.{key}")) {
                    entry_points.insert(group.to_string(), scripts);
                }
            }
        }

        Some(ProjectMetadata {
            name: name?,
            version,
            description,
            readme,
            licenses,
            authors,
            maintainers,
            keywords,
            classifiers,
            urls,
            requires_python,
            dependencies,
            optional_dependencies,
            entry_points,
            dynamic,
        })
    }

    fn dynamic(&mut self, project: &Table) -> BTreeSet<DynamicField> {
        let mut dynamic = BTreeSet::new();
        let Some(value) = project.get("dynamic") else {
            return dynamic;
        };
        let Some(items) = self.array(value, "project.dynamic") else {
            return dynamic;
        };
        for (index, item) in items.iter().enumerate() {
            let key = format!("project.dynamic.{index}");
            let Some(item) = self.string(item, &key) else {
                continue;
            };
            match DynamicField::from_str(&item) {
                Err(()) => self.errors.push(ValidationError::invalid(
                    key,
                    format!("not in allowed fields: {item}"),
                )),
                Ok(_) if project.contains_key(&item) => self.errors.push(
                    ValidationError::invalid(key, format!("static key found: {item}")),
                ),
                Ok(field) => {
                    dynamic.insert(field);
                }
            }
        }
        dynamic
    }

    fn name(&mut self, project: &Table) -> Option<PackageName> {
        let Some(value) = project.get("name") else {
            self.errors.push(ValidationError::missing("project.name"));
            return None;
        };
        let name = self.string(value, "project.name")?;
        if name.is_empty() {
            self.errors
                .push(ValidationError::invalid("project.name", "must not be empty"));
            return None;
        }
        match PackageName::from_str(&name) {
            Ok(name) => Some(name),
            Err(err) => {
                self.errors
                    .push(ValidationError::invalid("project.name", err.to_string()));
                None
            }
        }
    }

    fn version(&mut self, value: &Value) -> Option<Version> {
        let version = self.string(value, "project.version")?;
        match Version::from_str(&version) {
            Ok(version) => Some(version),
            Err(err) => {
                self.errors
                    .push(ValidationError::invalid("project.version", err.to_string()));
                None
            }
        }
    }

    fn readme(&mut self, value: &Value) -> Option<Readme> {
        let key = "project.readme";
        let table = match value {
            Value::String(path) => {
                let path = self.relative_file(path, key)?;
                let content_type = guess_content_type(&path);
                return Some(Readme::File { path, content_type });
            }
            Value::Table(table) => table,
            _ => {
                self.errors
                    .push(ValidationError::wrong_type(key, "a string or table"));
                return None;
            }
        };

        for unknown in table
            .keys()
            .filter(|unknown| !["text", "file", "content-type"].contains(&unknown.as_str()))
        {
            self.errors.push(ValidationError::new(
                format!("{key}.{unknown}"),
                ValidationErrorKind::MissingKey,
                "unknown",
            ));
        }
        let content_type = match table.get("content-type") {
            Some(value) => self.string(value, "project.readme.content-type"),
            None => {
                self.errors
                    .push(ValidationError::missing("project.readme.content-type"));
                None
            }
        };
        if table.contains_key("text") && table.contains_key("file") {
            self.errors.push(ValidationError::invalid(
                key,
                "table must not contain both 'text' and 'file'",
            ));
        }

        if let Some(text) = table.get("text") {
            let text = self.string(text, "project.readme.text")?;
            Some(Readme::Text { text, content_type })
        } else if let Some(file) = table.get("file") {
            let file = self.string(file, "project.readme.file")?;
            let path = self.relative_file(&file, "project.readme.file")?;
            Some(Readme::File { path, content_type })
        } else {
            self.errors.push(ValidationError::invalid(
                key,
                "table must contain either 'text' or 'file'",
            ));
            None
        }
    }

    fn license(&mut self, value: &Value) -> Option<License> {
        let key = "project.license";
        let table = self.table(value, key)?;
        if table.contains_key("file") && table.contains_key("text") {
            self.errors.push(ValidationError::new(
                key,
                ValidationErrorKind::MissingKey,
                "cannot have both 'file' and 'text'",
            ));
        }
        if let Some(file) = table.get("file") {
            let file = self.string(file, "project.license.file")?;
            let path = self.relative_file(&file, "project.license.file")?;
            Some(License::File(path))
        } else if let Some(text) = table.get("text") {
            self.string(text, "project.license.text").map(License::Text)
        } else {
            self.errors.push(ValidationError::new(
                key,
                ValidationErrorKind::MissingKey,
                "missing 'file' or 'text'",
            ));
            None
        }
    }

    fn contacts(&mut self, value: &Value, key: &str) -> Vec<Contact> {
        let Some(items) = self.array(value, key) else {
            return Vec::new();
        };
        let mut contacts = Vec::new();
        for (index, item) in items.iter().enumerate() {
            let item_key = format!("{key}.{index}");
            let Some(table) = self.table(item, &item_key) else {
                continue;
            };
            if !table.contains_key("name") && !table.contains_key("email") {
                self.errors.push(ValidationError::new(
                    item_key,
                    ValidationErrorKind::MissingKey,
                    "missing 'name' or 'email'",
                ));
                continue;
            }
            for unknown in table
                .keys()
                .filter(|unknown| *unknown != "name" && *unknown != "email")
            {
                self.errors.push(ValidationError::new(
                    format!("{item_key}.{unknown}"),
                    ValidationErrorKind::MissingKey,
                    "unknown",
                ));
            }
            let name = table
                .get("name")
                .and_then(|name| self.string(name, &format!("{item_key}.name")));
            let email = table
                .get("email")
                .and_then(|email| self.string(email, &format!("{item_key}.email")));
            if name.is_some() || email.is_some() {
                contacts.push(Contact { name, email });
            }
        }
        contacts
    }

    fn requires_python(&mut self, value: &Value) -> Option<VersionSpecifiers> {
        let key = "project.requires-python";
        let specifiers = self.string(value, key)?;
        match VersionSpecifiers::from_str(&specifiers) {
            Ok(specifiers) => Some(specifiers),
            Err(err) => {
                self.errors.push(ValidationError::invalid(key, err.to_string()));
                None
            }
        }
    }

    fn requirements(&mut self, value: &Value, key: &str) -> Vec<RequirementSpec> {
        let Some(items) = self.array(value, key) else {
            return Vec::new();
        };
        let mut requirements = Vec::new();
        for (index, item) in items.iter().enumerate() {
            let item_key = format!("{key}.{index}");
            let Some(item) = self.string(item, &item_key) else {
                continue;
            };
            match RequirementSpec::from_str(&item) {
                Ok(requirement) => requirements.push(requirement),
                Err(err) => self
                    .errors
                    .push(ValidationError::invalid(item_key, err.message.to_string())),
            }
        }
        requirements
    }

    fn optional_dependencies(
        &mut self,
        value: &Value,
    ) -> IndexMap<ExtraName, Vec<RequirementSpec>> {
        let key = "project.optional-dependencies";
        let mut optional_dependencies = IndexMap::new();
        let Some(table) = self.table(value, key) else {
            return optional_dependencies;
        };
        for (extra, requirements) in table {
            let extra_key = format!("{key}.{extra}");
            if !requirements.is_array() {
                self.errors
                    .push(ValidationError::wrong_type(extra_key, "an array"));
                continue;
            }
            let extra = match ExtraName::from_str(extra) {
                Ok(extra) => extra,
                Err(err) => {
                    self.errors
                        .push(ValidationError::invalid(extra_key, err.to_string()));
                    continue;
                }
            };
            let requirements = self.requirements(requirements, &extra_key);
            optional_dependencies.insert(extra, requirements);
        }
        optional_dependencies
    }

    fn entry_points(&mut self, value: &Value) -> IndexMap<String, IndexMap<String, String>> {
        let key = "project.entry-points";
        let mut entry_points = IndexMap::new();
        let Some(table) = self.table(value, key) else {
            return entry_points;
        };
        for (group, entries) in table {
            let group_key = format!("{key}.{group}");
            if group == "console_scripts" || group == "gui_scripts" {
                self.errors.push(ValidationError::new(
                    group_key,
                    ValidationErrorKind::MissingKey,
                    "reserved",
                ));
                continue;
            }
            if let Some(entries) = self.string_table(entries, &group_key) {
                entry_points.insert(group.clone(), entries);
            }
        }
        entry_points
    }

    /// A table with string values, in declaration order. Invalid values are skipped.
    fn string_table(&mut self, value: &Value, key: &str) -> Option<IndexMap<String, String>> {
        let table = self.table(value, key)?;
        let mut entries = IndexMap::new();
        for (name, value) in table {
            if let Value::String(value) = value {
                entries.insert(name.clone(), value.clone());
            } else {
                self.errors.push(ValidationError::new(
                    format!("{key}.{name}"),
                    ValidationErrorKind::WrongType,
                    "value must be a string",
                ));
            }
        }
        Some(entries)
    }

    fn strings(&mut self, value: &Value, key: &str) -> Vec<String> {
        let Some(items) = self.array(value, key) else {
            return Vec::new();
        };
        items
            .iter()
            .enumerate()
            .filter_map(|(index, item)| self.string(item, &format!("{key}.{index}")))
            .collect()
    }

    /// Validate a `/`-delimited path relative to the project root that points to a readable
    /// UTF-8 file.
    fn relative_file(&mut self, value: &str, key: &str) -> Option<PathBuf> {
        if value.starts_with('/') || Path::new(value).is_absolute() {
            self.errors
                .push(ValidationError::invalid(key, "path must be relative"));
            return None;
        }
        if !is_contained_relative(value) {
            self.errors
                .push(ValidationError::invalid(key, "path must not contain '..'"));
            return None;
        }
        let path: PathBuf = value
            .split('/')
            .filter(|segment| !segment.is_empty() && *segment != ".")
            .collect();
        let full_path = self.root.join(&path);
        if !full_path.is_file() {
            self.errors.push(ValidationError::invalid(
                key,
                format!("file not found: {}", full_path.display()),
            ));
            return None;
        }
        if let Err(err) = fs_err::read_to_string(&full_path) {
            self.errors.push(ValidationError::invalid(
                key,
                format!("file not readable: {err}"),
            ));
        }
        trace!("Validated `{key}`: {}", path.display());
        Some(path)
    }

    fn string(&mut self, value: &Value, key: &str) -> Option<String> {
        if let Value::String(value) = value {
            Some(value.clone())
        } else {
            self.errors.push(ValidationError::wrong_type(key, "a string"));
            None
        }
    }

    fn array<'v>(&mut self, value: &'v Value, key: &str) -> Option<&'v [Value]> {
        if let Value::Array(items) = value {
            Some(items.as_slice())
        } else {
            self.errors.push(ValidationError::wrong_type(key, "an array"));
            None
        }
    }

    fn table<'v>(&mut self, value: &'v Value, key: &str) -> Option<&'v Table> {
        if let Value::Table(table) = value {
            Some(table)
        } else {
            self.errors.push(ValidationError::wrong_type(key, "a table"));
            None
        }
    }
}

/// Infer the readme content type from its extension.
fn guess_content_type(path: &Path) -> Option<String> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    match extension.as_str() {
        "md" => Some("text/markdown".to_string()),
        "rst" => Some("text/x-rst".to_string()),
        _ => None,
    }
}
