use std::path::Path;
use std::str::FromStr;

use tracing::debug;

use pep508_rs::pep440_rs::Version;
use pymonorepo_fs::Simplified;
use pymonorepo_metadata::{Contact, DynamicField, ProjectMetadata};

use crate::Error;
use crate::source_info::SourceInfoExtractor;

/// Fill in the fields listed in `project.dynamic` from the Python file at `source`.
///
/// Only `version`, `description` and `authors` can be read from a source file, every other
/// dynamic field is reported as missing. On success, `dynamic` is empty.
pub fn resolve_dynamic(
    metadata: &mut ProjectMetadata,
    source: &Path,
    extractor: &dyn SourceInfoExtractor,
) -> Result<(), Error> {
    if metadata.dynamic.is_empty() {
        return Ok(());
    }
    debug!(
        "Reading dynamic metadata of `{}` from: `{}`",
        metadata.name,
        source.simplified_display()
    );
    let info = extractor
        .extract(source)
        .map_err(|err| Error::SourceInfo {
            path: source.to_path_buf(),
            err,
        })?;

    let mut missing = Vec::new();
    for field in &metadata.dynamic {
        match field {
            DynamicField::Version => {
                let Some(version) = &info.version else {
                    missing.push(*field);
                    continue;
                };
                let parsed = Version::from_str(version).map_err(|err| Error::DynamicVersion {
                    path: source.to_path_buf(),
                    version: version.clone(),
                    err,
                })?;
                metadata.version = Some(parsed);
            }
            DynamicField::Description => match &info.description {
                Some(description) => metadata.description = Some(description.clone()),
                None => missing.push(*field),
            },
            DynamicField::Authors => {
                if info.author_name.is_none() && info.author_email.is_none() {
                    missing.push(*field);
                } else {
                    metadata.authors = vec![Contact {
                        name: info.author_name.clone(),
                        email: info.author_email.clone(),
                    }];
                }
            }
            _ => missing.push(*field),
        }
    }
    if !missing.is_empty() {
        return Err(Error::MissingDynamic {
            path: source.to_path_buf(),
            fields: missing,
        });
    }
    metadata.dynamic.clear();
    Ok(())
}
