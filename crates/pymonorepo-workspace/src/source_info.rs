//! Read fallback metadata from a Python source file.

use std::io;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use tracing::trace;

/// Metadata declared in a Python module: the module docstring and the `__version__`,
/// `__author__` and `__email__` globals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceInfo {
    pub description: Option<String>,
    pub version: Option<String>,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
}

#[derive(Debug, Error)]
pub enum SourceInfoError {
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Extracts [`SourceInfo`] from a Python file.
pub trait SourceInfoExtractor {
    fn extract(&self, path: &Path) -> Result<SourceInfo, SourceInfoError>;
}

/// Reads [`SourceInfo`] without executing or fully parsing the file.
///
/// Only a leading string literal counts as docstring and only plain single-line string
/// assignments at the top level count as globals, e.g. `__version__ = "1.2.3"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticSourceInfo;

static DOCSTRING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"\A[rRuU]?(?:"""(?s:(?<triple_double>.*?))"""|'''(?s:(?<triple_single>.*?))'''|"(?<double>(?:[^"\\\n]|\\.)*)"|'(?<single>(?:[^'\\\n]|\\.)*)')"#,
    )
    .unwrap()
});

static ASSIGNMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?m)^(?<name>__version__|__author__|__email__)[ \t]*=[ \t]*(?:"(?<double>(?:[^"\\\n]|\\.)*)"|'(?<single>(?:[^'\\\n]|\\.)*)')[ \t]*(?:#.*)?$"#,
    )
    .unwrap()
});

impl SourceInfoExtractor for StaticSourceInfo {
    fn extract(&self, path: &Path) -> Result<SourceInfo, SourceInfoError> {
        let source = fs_err::read_to_string(path)?;
        Ok(parse_source_info(&source))
    }
}

/// Read the docstring and globals from the source of a Python module.
pub fn parse_source_info(source: &str) -> SourceInfo {
    let source = source.strip_prefix('\u{feff}').unwrap_or(source);
    let mut info = SourceInfo {
        description: docstring(source),
        ..SourceInfo::default()
    };

    // Later assignments override earlier ones, as they would at runtime.
    for captures in ASSIGNMENT.captures_iter(source) {
        let Some(value) = captures
            .name("double")
            .or_else(|| captures.name("single"))
            .map(|value| value.as_str().to_string())
        else {
            continue;
        };
        match &captures["name"] {
            "__version__" => info.version = Some(value),
            "__author__" => info.author_name = Some(value),
            "__email__" => info.author_email = Some(value),
            _ => {}
        }
    }
    trace!("Static source info: {info:?}");
    info
}

/// The module docstring, cleaned up like `inspect.cleandoc`.
fn docstring(source: &str) -> Option<String> {
    // Skip blank lines and comments, including the shebang and the encoding declaration.
    let mut offset = 0;
    for line in source.split_inclusive('\n') {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            offset += line.len();
        } else {
            break;
        }
    }
    let statement = source[offset..].trim_start_matches([' ', '\t']);
    let captures = DOCSTRING.captures(statement)?;
    let raw = ["triple_double", "triple_single", "double", "single"]
        .into_iter()
        .find_map(|group| captures.name(group))?
        .as_str();
    let cleaned = clean_docstring(raw);
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Remove the common indentation of all but the first line and strip leading and trailing
/// blank lines.
fn clean_docstring(raw: &str) -> String {
    let expanded = raw.replace('\t', "        ");
    let lines: Vec<&str> = expanded.lines().collect();
    let margin = lines
        .iter()
        .skip(1)
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.chars().count() - line.trim_start().chars().count())
        .min()
        .unwrap_or(0);
    let mut cleaned: Vec<&str> = Vec::with_capacity(lines.len());
    for (index, line) in lines.iter().enumerate() {
        if index == 0 {
            cleaned.push(line.trim_start());
        } else {
            // The margin counts characters, indentation may be multi-byte whitespace.
            let rest = line
                .char_indices()
                .nth(margin)
                .map_or("", |(start, _)| &line[start..]);
            cleaned.push(rest.trim_end());
        }
    }
    while cleaned.first().is_some_and(|line| line.trim().is_empty()) {
        cleaned.remove(0);
    }
    while cleaned.last().is_some_and(|line| line.trim().is_empty()) {
        cleaned.pop();
    }
    cleaned.join("\n")
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::{SourceInfo, parse_source_info};

    #[test]
    fn globals_and_docstring() {
        let source = indoc! {r#"
            #!/usr/bin/env python
            # -*- coding: utf-8 -*-
            """A small library.

                Indented details.
            """
            __version__ = "1.2.3"  # x-release-please-version
            __author__ = 'Ferris'
            __email__ = "ferris@rustacean.net"

            def version():
                __version__ = "0.0.0"
        "#};
        assert_eq!(
            parse_source_info(source),
            SourceInfo {
                description: Some("A small library.\n\nIndented details.".to_string()),
                version: Some("1.2.3".to_string()),
                author_name: Some("Ferris".to_string()),
                author_email: Some("ferris@rustacean.net".to_string()),
            }
        );
    }

    #[test]
    fn single_line_docstring() {
        let info =
            parse_source_info("'''Hello world'''\n__version__ = '0.1'\n__version__ = '0.2'\n");
        assert_eq!(info.description.as_deref(), Some("Hello world"));
        assert_eq!(info.version.as_deref(), Some("0.2"));
    }

    #[test]
    fn unicode_indentation() {
        let info = parse_source_info("\"\"\"Title.\n\u{3000}x\n  \u{3000}z\n\"\"\"\n");
        assert_eq!(info.description.as_deref(), Some("Title.\nx\n \u{3000}z"));
    }

    #[test]
    fn no_docstring() {
        let source = indoc! {r#"
            import os

            """Not a docstring."""
            __version__ = os.environ["VERSION"]
        "#};
        assert_eq!(parse_source_info(source), SourceInfo::default());
    }
}
