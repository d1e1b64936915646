//! Recursive directory enumeration.
//!
//! Produces one [`FileDescriptor`] per regular file under the root. Entries
//! are visited in file-name order within each directory, so repeated calls
//! over an unchanged tree yield the same sequence.

use std::path::Path;

use static_deploy_upload_models::FileDescriptor;
use walkdir::WalkDir;

use crate::UploadError;

/// Lists every regular file under `root`, recursively.
///
/// Symlinks are not followed, and directories themselves are not listed.
///
/// # Errors
///
/// Returns [`UploadError::Enumerate`] if `root` does not exist or any entry
/// under it cannot be read.
pub fn enumerate_files(root: &Path) -> Result<Vec<FileDescriptor>, UploadError> {
    if !root.is_dir() {
        return Err(UploadError::Enumerate {
            path: root.display().to_string(),
            source: Box::new(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "not a directory",
            )),
        });
    }

    let mut files = Vec::new();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| UploadError::Enumerate {
            path: e
                .path()
                .unwrap_or(root)
                .display()
                .to_string(),
            source: Box::new(e),
        })?;

        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| UploadError::Enumerate {
                path: entry.path().display().to_string(),
                source: Box::new(e),
            })?;

        let size = entry
            .metadata()
            .map_err(|e| UploadError::Enumerate {
                path: entry.path().display().to_string(),
                source: Box::new(e),
            })?
            .len();

        files.push(FileDescriptor {
            relative_path: to_slash_path(relative),
            absolute_path: entry.path().to_path_buf(),
            size,
        });
    }

    log::debug!("Found {} file(s) under {}", files.len(), root.display());

    Ok(files)
}

/// Joins the components of a relative path with `/` regardless of platform.
fn to_slash_path(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn lists_nested_files_with_relative_paths() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("css")).unwrap();
        fs::create_dir_all(tmp.path().join("empty")).unwrap();
        fs::write(tmp.path().join("index.html"), b"<html></html>").unwrap();
        fs::write(tmp.path().join("css/app.css"), b"body{}").unwrap();

        let files = enumerate_files(tmp.path()).unwrap();
        let relative: Vec<&str> = files.iter().map(|f| f.relative_path.as_str()).collect();

        assert_eq!(relative, vec!["css/app.css", "index.html"]);
        assert_eq!(files[0].size, 6);
        assert_eq!(files[0].absolute_path, tmp.path().join("css").join("app.css"));
    }

    #[test]
    fn order_is_stable_across_calls() {
        let tmp = tempfile::tempdir().unwrap();
        for name in ["b.js", "a.js", "c.js"] {
            fs::write(tmp.path().join(name), name).unwrap();
        }

        let first = enumerate_files(tmp.path()).unwrap();
        let second = enumerate_files(tmp.path()).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }

    #[test]
    fn missing_root_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = enumerate_files(&tmp.path().join("nope")).unwrap_err();
        assert!(matches!(err, UploadError::Enumerate { .. }));
    }
}
