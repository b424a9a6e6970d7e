//! Directory walking for the archiver.
//!
//! Produces sorted directory and file entries with relative paths
//! normalized to forward slashes.

use std::path::{Path, PathBuf};

use crate::error::ArchiveError;

/// A regular file to be archived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FileEntry {
    pub relative_path: String,
    pub path: PathBuf,
    pub size: u64,
}

/// Everything under a root directory.
#[derive(Debug, Default)]
pub(crate) struct Tree {
    /// Subdirectories, parents before children.
    pub dirs: Vec<String>,
    pub files: Vec<FileEntry>,
}

impl Tree {
    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }
}

/// Walks `root` recursively. A path equal to `skip` is left out.
///
/// Symbolic links are followed and archived as the files or directories
/// they point to. A dangling link, or a directory link that leads back
/// into one of its own ancestors, is an error.
pub(crate) fn scan_tree(root: &Path, skip: Option<&Path>) -> Result<Tree, ArchiveError> {
    let mut tree = Tree::default();
    let top = std::fs::canonicalize(root).map_err(|e| ArchiveError::io("read directory", root, e))?;
    let mut ancestors = vec![top];
    walk_dir(root, root, skip, &mut ancestors, &mut tree)?;
    Ok(tree)
}

fn walk_dir(
    root: &Path,
    current: &Path,
    skip: Option<&Path>,
    ancestors: &mut Vec<PathBuf>,
    tree: &mut Tree,
) -> Result<(), ArchiveError> {
    let mut entries = std::fs::read_dir(current)
        .map_err(|e| ArchiveError::io("read directory", current, e))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ArchiveError::io("read directory", current, e))?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        if skip == Some(path.as_path()) {
            tracing::debug!(path = %path.display(), "skipping archive destination");
            continue;
        }
        let is_link = entry
            .file_type()
            .map_err(|e| ArchiveError::io("stat", &path, e))?
            .is_symlink();
        // Follows links.
        let metadata = std::fs::metadata(&path).map_err(|e| {
            ArchiveError::io(if is_link { "follow link" } else { "stat" }, &path, e)
        })?;

        let rel_path = path
            .strip_prefix(root)
            .map_err(|e| ArchiveError::io("resolve", &path, std::io::Error::other(e)))?;
        // Normalize to forward slashes.
        let rel_str = rel_path.to_string_lossy().replace('\\', "/");

        if metadata.is_dir() {
            let real = std::fs::canonicalize(&path)
                .map_err(|e| ArchiveError::io("resolve", &path, e))?;
            if ancestors.contains(&real) {
                return Err(ArchiveError::io(
                    "follow link",
                    &path,
                    std::io::Error::other("link points back into its own parent directory"),
                ));
            }
            if is_link {
                tracing::debug!(link = %path.display(), target = %real.display(), "following directory link");
            }
            tree.dirs.push(rel_str);
            ancestors.push(real);
            walk_dir(root, &path, skip, ancestors, tree)?;
            ancestors.pop();
        } else if metadata.is_file() {
            tree.files.push(FileEntry {
                relative_path: rel_str,
                path,
                size: metadata.len(),
            });
        } else {
            tracing::warn!(path = %path.display(), "skipping special file");
        }
    }

    Ok(())
}
