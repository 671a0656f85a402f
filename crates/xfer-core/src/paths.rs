//! Confinement of relative paths to the download root.

use std::path::{Component, Path, PathBuf};

use thiserror::Error;

/// Suffix of in-progress files.
pub const PARTIAL_SUFFIX: &str = ".part";

/// Hidden in-progress name for `final_path`, unique per registration.
///
/// `movie.mkv` written under lease 7 becomes `.movie.mkv.7.part` in the same
/// directory.
#[must_use]
pub fn partial_path(final_path: &Path, lease: u64) -> PathBuf {
    let name = final_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    final_path.with_file_name(format!(".{name}.{lease}{PARTIAL_SUFFIX}"))
}

/// Whether `name` looks like a file produced by [`partial_path`].
#[must_use]
pub fn is_partial_file_name(name: &str) -> bool {
    name.starts_with('.') && name.ends_with(PARTIAL_SUFFIX)
}

/// A relative path that may not be joined onto the download root.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PathError {
    /// Nothing left after normalisation.
    #[error("path is empty")]
    Empty,

    /// Absolute path or one carrying a drive/UNC prefix.
    #[error("path must be relative: {0}")]
    NotRelative(String),

    /// Contains a `..` component.
    #[error("path escapes the download root: {0}")]
    Escapes(String),
}

/// Join `relative` onto `root`, refusing anything that could land outside it.
///
/// `.` components are dropped; `..`, root and prefix components are errors.
/// Symlinks are not resolved.
pub fn confine(root: &Path, relative: &str) -> Result<PathBuf, PathError> {
    let mut joined = root.to_path_buf();
    let mut depth = 0usize;

    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => {
                joined.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir => return Err(PathError::Escapes(relative.to_string())),
            Component::RootDir | Component::Prefix(_) => {
                return Err(PathError::NotRelative(relative.to_string()));
            }
        }
    }

    if depth == 0 {
        return Err(PathError::Empty);
    }
    Ok(joined)
}
