use std::path::Path;
use std::str::FromStr;

use indoc::{formatdoc, indoc};
use insta::assert_snapshot;
use tempfile::TempDir;

use pep508_rs::pep440_rs::Version;
use pymonorepo_metadata::{Contact, License, ToolConfig};

use crate::{
    Error, ModuleDiscovery, ProjectResolver, ResolverOptions, StaticSourceInfo, analyse_project,
};

fn write(root: &Path, path: &str, contents: &str) {
    let path = root.join(path);
    fs_err::create_dir_all(path.parent().unwrap()).unwrap();
    fs_err::write(path, contents).unwrap();
}

/// Render an error with the temporary directory replaced by `[TEMP]`.
fn format_err(err: &Error, root: &Path) -> String {
    err.to_string()
        .replace(&root.display().to_string(), "[TEMP]")
        .replace('\\', "/")
}

const WORKSPACE: &str = indoc! {r#"
    [project]
    name = "monorepo"
    version = "0.1.0"
    description = "All the packages"
    dynamic = ["license", "requires-python", "dependencies", "entry-points", "scripts", "gui-scripts"]

    [tool.monorepo.workspace]
    packages = ["packages/*"]
"#};

fn member(root: &Path, name: &str, version: &str, payload: &str) {
    write(
        root,
        &format!("packages/{name}/pyproject.toml"),
        &formatdoc! {r#"
            [project]
            name = "{name}"
            version = "{version}"
            {payload}
        "#},
    );
    write(root, &format!("packages/{name}/{name}/__init__.py"), "");
}

#[test]
fn single_package() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write(
        root,
        "pyproject.toml",
        indoc! {r#"
            [project]
            name = "Foo"
            version = "1.0.0"
            dependencies = ["bar>=1", "bar<2"]
        "#},
    );
    write(root, "src/foo/__init__.py", "");

    let analysis = analyse_project(root).unwrap();
    assert!(!analysis.is_workspace);
    assert_eq!(analysis.root, root);
    assert_eq!(analysis.name().as_ref(), "foo");
    assert_eq!(
        analysis.modules.into_iter().collect::<Vec<_>>(),
        [("foo".to_string(), root.join("src").join("foo"))]
    );
    // Dependencies of a single package are kept as declared.
    assert_eq!(analysis.metadata.dependencies.len(), 2);
    assert!(analysis.dependency_graph.is_empty());
    assert_eq!(analysis.tool.config, ToolConfig::default());
}

#[test]
fn dynamic_from_module() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write(
        root,
        "pyproject.toml",
        indoc! {r#"
            [project]
            name = "foo-bar"
            dynamic = ["version", "description", "authors"]
        "#},
    );
    write(
        root,
        "foo_bar/__init__.py",
        indoc! {r#"
            """The foo bar library."""
            __version__ = "2.1.0"
            __author__ = "Ferris"
            __email__ = "ferris@rustacean.net"
        "#},
    );

    let analysis = analyse_project(root).unwrap();
    let metadata = analysis.metadata;
    assert_eq!(metadata.version, Some(Version::from_str("2.1.0").unwrap()));
    assert_eq!(metadata.description.as_deref(), Some("The foo bar library."));
    assert_eq!(
        metadata.authors,
        [Contact {
            name: Some("Ferris".to_string()),
            email: Some("ferris@rustacean.net".to_string()),
        }]
    );
    assert!(metadata.dynamic.is_empty());
}

#[test]
fn dynamic_from_about() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write(
        root,
        "pyproject.toml",
        indoc! {r#"
            [project]
            name = "foo"
            dynamic = ["version"]

            [tool.monorepo.package]
            module = "lib/foo.py"
            about = "about.py"
        "#},
    );
    write(root, "lib/foo.py", "__version__ = '0.0.1'\n");
    write(root, "about.py", "__version__ = '3.0'\n");

    let analysis = analyse_project(root).unwrap();
    assert_eq!(
        analysis.metadata.version,
        Some(Version::from_str("3.0").unwrap())
    );
    assert_eq!(analysis.modules["foo"], root.join("lib").join("foo.py"));
}

#[test]
fn dynamic_missing() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write(
        root,
        "pyproject.toml",
        indoc! {r#"
            [project]
            name = "foo"
            dynamic = ["version", "keywords", "description"]
        "#},
    );
    write(root, "foo.py", "__version__ = '1.0'\n");

    let err = analyse_project(root).unwrap_err();
    assert_snapshot!(format_err(&err, root), @"Dynamic fields [description, keywords] not found in `[TEMP]/foo.py`");
}

#[test]
fn dynamic_invalid_version() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write(
        root,
        "pyproject.toml",
        "[project]\nname = \"foo\"\ndynamic = [\"version\"]\n",
    );
    write(root, "foo.py", "__version__ = 'one'\n");

    let err = analyse_project(root).unwrap_err();
    assert!(matches!(err, Error::DynamicVersion { .. }), "{err}");
}

#[test]
fn validation_errors() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write(
        root,
        "pyproject.toml",
        indoc! {r#"
            [project]
            name = "foo"
            version = "1.0.0"
            dependencies = ["foo>=>1"]
            keywords = "foo"

            [tool.monorepo.sdist]
            use-git = "yes"
        "#},
    );

    let err = analyse_project(root).unwrap_err();
    let Error::Validation(validation) = &err else {
        panic!("Expected validation errors, got: {err}");
    };
    let keys: Vec<_> = validation
        .errors
        .iter()
        .map(|error| error.key.as_str())
        .collect();
    assert_eq!(
        keys,
        [
            "project.keywords",
            "project.dependencies.0",
            "tool.monorepo.sdist.use-git"
        ]
    );
    assert!(
        format_err(&err, root).starts_with("Invalid `[TEMP]/pyproject.toml`:\n- project.keywords: must be an array [wrong-type]\n")
    );
}

#[test]
fn missing_pyproject_toml() {
    let temp_dir = TempDir::new().unwrap();
    let err = analyse_project(temp_dir.path()).unwrap_err();
    assert_snapshot!(format_err(&err, temp_dir.path()), @"No `pyproject.toml` found in: `[TEMP]`");
}

#[test]
fn module_discovery_policy() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write(
        root,
        "pyproject.toml",
        "[project]\nname = \"foo\"\nversion = \"1.0\"\n",
    );
    write(root, "foo/__init__.py", "");
    write(root, "src/foo.py", "");

    let analysis = analyse_project(root).unwrap();
    assert_eq!(analysis.modules["foo"], root.join("foo"));

    let options = ResolverOptions {
        module_discovery: ModuleDiscovery::Unique,
    };
    let err = ProjectResolver::new(options, &StaticSourceInfo)
        .analyse(root)
        .unwrap_err();
    assert!(matches!(err, Error::AmbiguousModule { .. }), "{err}");
}

#[test]
fn workspace() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write(root, "pyproject.toml", WORKSPACE);
    member(
        root,
        "a",
        "1.0.0",
        indoc! {r#"
            requires-python = ">=3.9"
            license = { file = "LICENSE" }
            dependencies = ["requests>=2", "b>=1"]

            [project.scripts]
            a-cli = "a.cli:main"

            [tool.monorepo.sdist]
            include = ["data/"]
            exclude = ["*.log"]
        "#},
    );
    write(root, "packages/a/LICENSE", "MIT\n");
    member(
        root,
        "b",
        "1.2.0",
        indoc! {r#"
            requires-python = ">=3.8,<4"
            license = { text = "Apache-2.0" }
            dependencies = ["requests<3", "click"]

            [project.gui-scripts]
            b-gui = "b.gui:main"

            [project.entry-points.pytest11]
            b = "b.plugin"
        "#},
    );

    let analysis = analyse_project(root).unwrap();
    assert!(analysis.is_workspace);
    let metadata = &analysis.metadata;
    assert_eq!(metadata.name.as_ref(), "monorepo");
    assert_eq!(metadata.description.as_deref(), Some("All the packages"));
    assert!(metadata.dynamic.is_empty());

    assert_eq!(
        metadata.licenses,
        [License::File(Path::new("packages").join("a").join("LICENSE"))]
    );

    let requires_python = metadata.requires_python.as_ref().unwrap();
    assert!(requires_python.contains(&Version::from_str("3.10").unwrap()));
    assert!(!requires_python.contains(&Version::from_str("3.8").unwrap()));
    assert!(!requires_python.contains(&Version::from_str("4.0").unwrap()));

    let dependencies: Vec<_> = metadata
        .dependencies
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(dependencies, ["requests>=2,<3", "click"]);

    let graph: Vec<_> = analysis
        .dependency_graph
        .iter()
        .map(|(name, edges)| {
            (
                name.to_string(),
                edges.iter().map(ToString::to_string).collect::<Vec<_>>(),
            )
        })
        .collect();
    assert_eq!(
        graph,
        [
            ("a".to_string(), vec!["b>=1".to_string()]),
            ("b".to_string(), vec![]),
        ]
    );

    assert_eq!(
        metadata.entry_points.keys().collect::<Vec<_>>(),
        ["console_scripts", "pytest11", "gui_scripts"]
    );
    assert_eq!(analysis.modules.keys().collect::<Vec<_>>(), ["a", "b"]);
    assert_eq!(
        analysis.modules["b"],
        root.join("packages").join("b").join("b")
    );

    assert_eq!(analysis.tool.sdist.include, ["packages/a/data/**/*"]);
    assert_eq!(analysis.tool.sdist.exclude, ["packages/a/*.log"]);
}

#[test]
fn workspace_dynamic_incomplete() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write(
        root,
        "pyproject.toml",
        &WORKSPACE.replace(r#", "gui-scripts""#, ""),
    );
    // Never read, the workspace itself is rejected first.
    write(root, "packages/a/pyproject.toml", "not toml");

    let err = analyse_project(root).unwrap_err();
    assert_snapshot!(format_err(&err, root), @"Workspace `project.dynamic` must be exactly [license, requires-python, dependencies, entry-points, scripts, gui-scripts], missing: [gui-scripts], unexpected: []: `[TEMP]`");
}

#[test]
fn workspace_duplicate_package() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write(root, "pyproject.toml", WORKSPACE);
    member(root, "a", "1.0.0", "");
    write(
        root,
        "packages/z/pyproject.toml",
        "[project]\nname = \"A\"\nversion = \"2.0.0\"\n",
    );
    write(root, "packages/z/a.py", "");

    let err = analyse_project(root).unwrap_err();
    assert_snapshot!(format_err(&err, root), @"Duplicate package name `a` in `[TEMP]/packages/a` and `[TEMP]/packages/z`");
}

#[test]
fn workspace_duplicate_module() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write(root, "pyproject.toml", WORKSPACE);
    member(root, "a", "1.0.0", "");
    write(
        root,
        "packages/b/pyproject.toml",
        indoc! {r#"
            [project]
            name = "b"
            version = "1.0.0"

            [tool.monorepo.package]
            module = "src/a"
        "#},
    );
    write(root, "packages/b/src/a/__init__.py", "");

    let err = analyse_project(root).unwrap_err();
    assert_snapshot!(format_err(&err, root), @"Module `a` defined in both `[TEMP]/packages/a/a` and `[TEMP]/packages/b/src/a`");
}

#[test]
fn workspace_duplicate_entry_point() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write(root, "pyproject.toml", WORKSPACE);
    member(root, "a", "1.0.0", "[project.scripts]\ncli = \"a:main\"");
    member(root, "b", "1.0.0", "[project.scripts]\ncli = \"b:main\"");

    let err = analyse_project(root).unwrap_err();
    assert_snapshot!(format_err(&err, root), @"Entry point `console_scripts.cli` defined in both `[TEMP]/packages/a` and `[TEMP]/packages/b`");
}

#[test]
fn workspace_version_mismatch() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write(root, "pyproject.toml", WORKSPACE);
    member(root, "a", "1.0.0", r#"dependencies = ["b>=2.0"]"#);
    member(root, "b", "1.0", "");

    let err = analyse_project(root).unwrap_err();
    assert_snapshot!(format_err(&err, root), @"`[TEMP]/packages/a` requires `b>=2.0`, but the workspace member in `[TEMP]/packages/b` has version `1.0`");
}

#[test]
fn workspace_extras_not_implemented() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write(root, "pyproject.toml", WORKSPACE);
    member(root, "a", "1.0.0", r#"dependencies = ["b[cli]>=1"]"#);
    member(root, "b", "1.0.0", "");

    let err = analyse_project(root).unwrap_err();
    assert!(err.is_not_implemented());
    assert_snapshot!(format_err(&err, root), @"Extras on dependencies between workspace members are not implemented: `[TEMP]/packages/a` requires `b[cli]`");
}

#[test]
fn nested_workspace() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write(root, "pyproject.toml", WORKSPACE);
    write(
        root,
        "packages/inner/pyproject.toml",
        &WORKSPACE.replace("monorepo\"", "inner\""),
    );
    member(&root.join("packages/inner"), "leaf", "1.0.0", "");

    let err = analyse_project(root).unwrap_err();
    assert_snapshot!(format_err(&err, root), @"Workspaces cannot contain other workspaces: `[TEMP]/packages/inner`");
}
