use super::*;

#[test]
fn test_normalize_path() {
    let path = Path::new("/a/b/../c/./d");
    assert_eq!(normalize_path(path), Path::new("/a/c/d"));

    let path = Path::new("a/./b/../c");
    assert_eq!(normalize_path(path), Path::new("a/c"));
}

#[test]
fn test_relative_to() {
    assert_eq!(
        relative_to("/home/ferris/project/packages/core", "/home/ferris/project").unwrap(),
        Path::new("packages/core")
    );
    assert_eq!(
        relative_to("/home/ferris/project/./packages/../LICENSE", "/home/ferris/project").unwrap(),
        Path::new("LICENSE")
    );
    assert!(relative_to("/home/ferris/other", "/home/ferris/project").is_err());
}

#[test]
fn test_is_contained_relative() {
    assert!(is_contained_relative("docs/README.md"));
    assert!(is_contained_relative("./LICENSE"));
    assert!(!is_contained_relative("../LICENSE"));
    assert!(!is_contained_relative("docs/../../LICENSE"));
    assert!(!is_contained_relative("/etc/passwd"));
}

#[test]
fn test_portable_display() {
    let path = Path::new("packages").join("core").join("LICENSE");
    assert_eq!(path.portable_display(), "packages/core/LICENSE");
}
