//! Download directory listing.

use std::path::Path;

use walkdir::WalkDir;

use xfer_core::is_partial_file_name;

/// Extensions listed when none are configured.
pub const DEFAULT_EXTENSIONS: &[&str] = &["mkv", "mp4"];

/// Relative paths (with `/` separators) of files under `root` whose
/// extension is in `extensions`, sorted. Hidden partial files are skipped.
///
/// A missing root lists as empty.
pub fn list_files(root: &Path, extensions: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    for entry in WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
    {
        let name = entry.file_name().to_string_lossy();
        if is_partial_file_name(&name) {
            continue;
        }
        let matches = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| extensions.iter().any(|want| want.eq_ignore_ascii_case(ext)));
        if !matches {
            continue;
        }
        if let Ok(relative) = entry.path().strip_prefix(root) {
            let parts: Vec<_> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            out.push(parts.join("/"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> Vec<String> {
        DEFAULT_EXTENSIONS.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn lists_matching_files_recursively() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("show/s01")).unwrap();
        std::fs::write(dir.path().join("movie.MKV"), b"x").unwrap();
        std::fs::write(dir.path().join("show/s01/e01.mp4"), b"x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        std::fs::write(dir.path().join(".movie2.mkv.4.part"), b"x").unwrap();

        assert_eq!(
            list_files(dir.path(), &defaults()),
            vec!["movie.MKV".to_string(), "show/s01/e01.mp4".to_string()]
        );
    }

    #[test]
    fn missing_root_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(list_files(&dir.path().join("nope"), &defaults()).is_empty());
    }
}
