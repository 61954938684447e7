use std::borrow::Cow;
use std::io;
use std::path::{Component, Path, PathBuf};

pub trait Simplified {
    /// Simplify a [`Path`].
    ///
    /// On Windows, this will strip the `\\?\` prefix from paths. On other platforms, it's a no-op.
    fn simplified(&self) -> &Path;

    /// Render a [`Path`] for user-facing display.
    ///
    /// On Windows, this will strip the `\\?\` prefix from paths. On other platforms, it's
    /// equivalent to [`std::path::Display`].
    fn simplified_display(&self) -> std::path::Display<'_>;

    /// Render a [`Path`] with `/` as separator on all platforms.
    ///
    /// Archive paths and glob patterns are always `/`-delimited, independent of the platform
    /// the build runs on.
    fn portable_display(&self) -> Cow<'_, str>;
}

impl<T: AsRef<Path>> Simplified for T {
    fn simplified(&self) -> &Path {
        dunce::simplified(self.as_ref())
    }

    fn simplified_display(&self) -> std::path::Display<'_> {
        dunce::simplified(self.as_ref()).display()
    }

    fn portable_display(&self) -> Cow<'_, str> {
        use path_slash::PathExt;

        let path = dunce::simplified(self.as_ref());
        match path.to_slash() {
            Some(portable) => portable,
            None => Cow::Owned(path.to_string_lossy().replace('\\', "/")),
        }
    }
}

/// Normalize a path, removing things like `.` and `..`.
///
/// Source: <https://github.com/rust-lang/cargo/blob/b48c41aedbd69ee3990d62a0e2006edbb506a480/crates/cargo-util/src/paths.rs#L76C1-L109C2>
pub fn normalize_path(path: impl AsRef<Path>) -> PathBuf {
    let mut components = path.as_ref().components().peekable();
    let mut ret = if let Some(c @ Component::Prefix(..)) = components.peek().copied() {
        components.next();
        PathBuf::from(c.as_os_str())
    } else {
        PathBuf::new()
    };

    for component in components {
        match component {
            Component::Prefix(..) => unreachable!(),
            Component::RootDir => {
                ret.push(component.as_os_str());
            }
            Component::CurDir => {}
            Component::ParentDir => {
                ret.pop();
            }
            Component::Normal(c) => {
                ret.push(c);
            }
        }
    }
    ret
}

/// Compute the path of `path` relative to `base`, where `path` must be inside `base`.
///
/// Both paths are normalized first, so `a/./b/../c` and `a/c` are treated the same. Unlike a
/// general relative path computation, this never produces `..` segments: a path outside of
/// `base` is an error.
pub fn relative_to(path: impl AsRef<Path>, base: impl AsRef<Path>) -> io::Result<PathBuf> {
    let path = normalize_path(path.as_ref().simplified());
    let base = normalize_path(base.as_ref().simplified());
    path.strip_prefix(&base)
        .map(Path::to_path_buf)
        .map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "`{}` is not inside `{}`",
                    path.simplified_display(),
                    base.simplified_display()
                ),
            )
        })
}

/// Returns `true` if the relative path is safe to join onto a root: not absolute and without any
/// `..` segments.
pub fn is_contained_relative(path: impl AsRef<Path>) -> bool {
    path.as_ref()
        .components()
        .all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
}

#[cfg(test)]
mod tests;
