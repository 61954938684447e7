use std::collections::BTreeSet;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use indexmap::IndexMap;
use indexmap::map::Entry;
use itertools::Itertools;

use pep508_rs::pep440_rs::{VersionSpecifier, VersionSpecifiers};
use pep508_rs::{ExtraName, PackageName, Pep508Error, Requirement, VersionOrUrl};

/// A dependency declaration, e.g. `foo[bar]>=1,<2 ; sys_platform == 'linux'`.
///
/// Two specs with the same [`RequirementSpec::merge_key`] describe the same dependency edge and
/// can be combined with [`RequirementSpec::merge`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequirementSpec {
    pub name: PackageName,
    pub specifiers: VersionSpecifiers,
    pub extras: BTreeSet<ExtraName>,
    /// A direct reference, `name @ url`.
    pub url: Option<String>,
    /// The environment marker, `None` when the requirement applies everywhere.
    pub marker: Option<String>,
}

impl RequirementSpec {
    /// A requirement on any version of `name`.
    pub fn new(name: PackageName) -> Self {
        Self {
            name,
            specifiers: std::iter::empty::<VersionSpecifier>().collect(),
            extras: BTreeSet::new(),
            url: None,
            marker: None,
        }
    }

    /// Requirements with the same key are merged by [`reduce`].
    pub fn merge_key(&self) -> (PackageName, Option<String>, Option<String>) {
        (self.name.clone(), self.url.clone(), self.marker.clone())
    }

    /// AND the specifiers and union the extras of `other` into `self`.
    ///
    /// The combined specifiers are not simplified: `<1` merged with `>2` is kept as `<1,>2` and
    /// left for the installer to reject.
    pub fn merge(&mut self, other: Self) {
        debug_assert_eq!(self.merge_key(), other.merge_key());
        let mut specifiers: Vec<VersionSpecifier> = self.specifiers.iter().cloned().collect();
        for specifier in other.specifiers.iter() {
            if !specifiers.contains(specifier) {
                specifiers.push(specifier.clone());
            }
        }
        self.specifiers = specifiers.into_iter().collect();
        self.extras.extend(other.extras);
    }

    /// Render the requirement as it applies only when `extra` is requested, for a
    /// `Requires-Dist` entry of an optional dependency.
    pub fn to_extra_string(&self, extra: &ExtraName) -> String {
        let base = self.format_without_marker();
        match &self.marker {
            Some(marker) => format!("{base} ; ({marker}) and extra == \"{extra}\""),
            None => format!("{base} ; extra == \"{extra}\""),
        }
    }

    fn format_without_marker(&self) -> String {
        let mut output = self.name.to_string();
        if !self.extras.is_empty() {
            output.push('[');
            output.push_str(&self.extras.iter().join(","));
            output.push(']');
        }
        if let Some(url) = &self.url {
            output.push_str(" @ ");
            output.push_str(url);
        } else {
            output.push_str(&crate::format_specifiers(&self.specifiers));
        }
        output
    }
}

impl From<Requirement> for RequirementSpec {
    fn from(requirement: Requirement) -> Self {
        let mut spec = Self::new(requirement.name);
        spec.extras = requirement.extras.iter().cloned().collect();
        match requirement.version_or_url {
            None => {}
            Some(VersionOrUrl::VersionSpecifier(specifiers)) => spec.specifiers = specifiers,
            Some(VersionOrUrl::Url(url)) => spec.url = Some(url.to_string()),
        }
        spec.marker = requirement
            .marker
            .contents()
            .map(|contents| contents.to_string());
        spec
    }
}

impl FromStr for RequirementSpec {
    type Err = Box<Pep508Error>;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let requirement = Requirement::from_str(s).map_err(Box::new)?;
        Ok(Self::from(requirement))
    }
}

impl Display for RequirementSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format_without_marker())?;
        if let Some(marker) = &self.marker {
            write!(f, " ; {marker}")?;
        }
        Ok(())
    }
}

/// Merge requirements that share a name, url and marker.
///
/// Within a group the specifiers are ANDed and the extras are unioned. Groups are returned in
/// the order their first member was seen.
pub fn reduce(requirements: impl IntoIterator<Item = RequirementSpec>) -> Vec<RequirementSpec> {
    let mut groups: IndexMap<_, RequirementSpec> = IndexMap::new();
    for requirement in requirements {
        match groups.entry(requirement.merge_key()) {
            Entry::Occupied(mut entry) => entry.get_mut().merge(requirement),
            Entry::Vacant(entry) => {
                entry.insert(requirement);
            }
        }
    }
    groups.into_values().collect()
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::{RequirementSpec, reduce};
    use pep508_rs::ExtraName;
    use pep508_rs::pep440_rs::Version;

    fn spec(requirement: &str) -> RequirementSpec {
        RequirementSpec::from_str(requirement).unwrap()
    }

    #[test]
    fn parse_and_display() {
        let requirement = spec("Foo_Bar[b,a] >=1.0, <2 ; sys_platform == 'linux'");
        assert_eq!(requirement.name.as_ref(), "foo-bar");
        assert_eq!(
            requirement.to_string(),
            "foo-bar[a,b]>=1.0,<2 ; sys_platform == 'linux'"
        );

        let requirement = spec("foo @ https://example.org/foo-1.0.tar.gz");
        assert_eq!(
            requirement.url.as_deref(),
            Some("https://example.org/foo-1.0.tar.gz")
        );
        assert_eq!(
            requirement.to_string(),
            "foo @ https://example.org/foo-1.0.tar.gz"
        );
    }

    #[test]
    fn merge_specifiers() {
        let merged = reduce([spec("pkg>=1"), spec("pkg<2")]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].to_string(), "pkg>=1,<2");
        assert!(merged[0].specifiers.contains(&Version::from_str("1.5").unwrap()));
        assert!(!merged[0].specifiers.contains(&Version::from_str("2.0").unwrap()));
    }

    #[test]
    fn merge_extras() {
        let merged = reduce([spec("pkg[a]"), spec("pkg[b]"), spec("pkg[a]")]);
        assert_eq!(merged.len(), 1);
        let extras: Vec<_> = merged[0].extras.iter().map(ExtraName::as_ref).collect();
        assert_eq!(extras, ["a", "b"]);
    }

    #[test]
    fn merge_keeps_contradictions() {
        let merged = reduce([spec("pkg<1"), spec("pkg>2")]);
        assert_eq!(merged[0].to_string(), "pkg<1,>2");
    }

    #[test]
    fn merge_key_includes_marker_and_url() {
        let merged = reduce([
            spec("b>=1"),
            spec("a>=1 ; sys_platform == 'win32'"),
            spec("a>=2"),
            spec("a @ https://example.org/a.whl"),
            spec("a<3"),
        ]);
        let merged: Vec<String> = merged.iter().map(ToString::to_string).collect();
        assert_eq!(
            merged,
            [
                "b>=1",
                "a>=1 ; sys_platform == 'win32'",
                "a>=2,<3",
                "a @ https://example.org/a.whl",
            ]
        );
    }

    #[test]
    fn extra_marker() {
        let extra = ExtraName::from_str("test").unwrap();
        assert_eq!(
            spec("pytest>=8").to_extra_string(&extra),
            "pytest>=8 ; extra == \"test\""
        );
        assert_eq!(
            spec("pytest>=8 ; sys_platform == 'win32'").to_extra_string(&extra),
            "pytest>=8 ; (sys_platform == 'win32') and extra == \"test\""
        );
    }
}
