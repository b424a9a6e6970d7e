//! Zip archive creation.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

use crate::error::ArchiveError;
use crate::scanner::{Tree, scan_tree};

/// Archive creation settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveOptions {
    /// Deflate entries. When false entries are stored uncompressed.
    pub compress: bool,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self { compress: true }
    }
}

/// A finished archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildArtifact {
    pub directory_path: PathBuf,
    pub archive_path: PathBuf,
    pub size_bytes: u64,
    pub file_count: usize,
    /// Hex-encoded SHA-256 of the archive file.
    pub sha256: String,
}

/// Zips `source_dir` into `dest_path` with default options.
pub fn build_archive(source_dir: &Path, dest_path: &Path) -> Result<BuildArtifact, ArchiveError> {
    build_archive_with(source_dir, dest_path, &ArchiveOptions::default(), |_| {})
}

/// Zips `source_dir` into `dest_path`.
///
/// An existing file at `dest_path` is replaced, never appended to. Entries
/// use paths relative to `source_dir` with `/` separators, and empty
/// directories are kept. If `dest_path` lies inside `source_dir` it is not
/// archived into itself. `progress` receives the fraction of file bytes
/// written so far, ending at `1.0`.
///
/// On failure no partial archive is left behind.
pub fn build_archive_with(
    source_dir: &Path,
    dest_path: &Path,
    options: &ArchiveOptions,
    mut progress: impl FnMut(f64),
) -> Result<BuildArtifact, ArchiveError> {
    let metadata =
        std::fs::metadata(source_dir).map_err(|e| ArchiveError::io("read", source_dir, e))?;
    if !metadata.is_dir() {
        return Err(ArchiveError::io(
            "read",
            source_dir,
            io::Error::other("not a directory"),
        ));
    }
    let root = std::fs::canonicalize(source_dir)
        .map_err(|e| ArchiveError::io("resolve", source_dir, e))?;

    if let Some(parent) = dest_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| ArchiveError::io("create directory", parent, e))?;
    }
    let dest_abs = absolute_dest(dest_path)?;
    let tree = scan_tree(&root, Some(&dest_abs))?;
    if tree.files.is_empty() {
        return Err(ArchiveError::EmptySource(source_dir.to_path_buf()));
    }

    if dest_path.exists() {
        debug!(path = %dest_path.display(), "removing previous archive");
        std::fs::remove_file(dest_path)
            .map_err(|e| ArchiveError::io("remove existing archive", dest_path, e))?;
    }

    if let Err(e) = write_zip(&tree, dest_path, options, &mut progress) {
        if let Err(rm) = std::fs::remove_file(dest_path) {
            if rm.kind() != io::ErrorKind::NotFound {
                warn!(path = %dest_path.display(), error = %rm, "failed to remove partial archive");
            }
        }
        return Err(e);
    }

    let size_bytes = std::fs::metadata(dest_path)
        .map_err(|e| ArchiveError::io("stat", dest_path, e))?
        .len();
    let sha256 = hash_file(dest_path)?;

    info!(
        source = %source_dir.display(),
        archive = %dest_path.display(),
        files = tree.files.len(),
        bytes = size_bytes,
        "archive created"
    );

    Ok(BuildArtifact {
        directory_path: source_dir.to_path_buf(),
        archive_path: dest_path.to_path_buf(),
        size_bytes,
        file_count: tree.files.len(),
        sha256,
    })
}

/// Runs [`build_archive_with`] on the blocking pool.
pub async fn spawn_build(
    source_dir: PathBuf,
    dest_path: PathBuf,
    options: ArchiveOptions,
    progress: impl FnMut(f64) + Send + 'static,
) -> Result<BuildArtifact, ArchiveError> {
    let dest = dest_path.clone();
    tokio::task::spawn_blocking(move || {
        build_archive_with(&source_dir, &dest_path, &options, progress)
    })
    .await
    .map_err(|e| ArchiveError::io("run archive task for", &dest, io::Error::other(e)))?
}

fn write_zip(
    tree: &Tree,
    dest_path: &Path,
    options: &ArchiveOptions,
    progress: &mut impl FnMut(f64),
) -> Result<(), ArchiveError> {
    let file = File::create(dest_path).map_err(|e| ArchiveError::io("create", dest_path, e))?;
    let mut zip = zip::ZipWriter::new(file);

    let method = if options.compress {
        CompressionMethod::Deflated
    } else {
        CompressionMethod::Stored
    };
    let entry_options = SimpleFileOptions::default().compression_method(method);

    for dir in &tree.dirs {
        zip.add_directory(format!("{dir}/"), entry_options)?;
    }

    let total = tree.total_size();
    let mut written: u64 = 0;
    for entry in &tree.files {
        let opts = entry_options.large_file(entry.size >= u64::from(u32::MAX));
        zip.start_file(entry.relative_path.as_str(), opts)?;

        let mut src =
            File::open(&entry.path).map_err(|e| ArchiveError::io("open", &entry.path, e))?;
        io::copy(&mut src, &mut zip).map_err(|e| ArchiveError::io("write", dest_path, e))?;

        written += entry.size;
        if total > 0 {
            progress(written as f64 / total as f64);
        }
    }

    zip.finish()?;
    progress(1.0);
    Ok(())
}

/// Absolute form of `dest`, which may not exist yet.
fn absolute_dest(dest: &Path) -> Result<PathBuf, ArchiveError> {
    let parent = match dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(p) => p.to_path_buf(),
        None => PathBuf::from("."),
    };
    let parent =
        std::fs::canonicalize(&parent).map_err(|e| ArchiveError::io("resolve", &parent, e))?;
    Ok(match dest.file_name() {
        Some(name) => parent.join(name),
        None => parent,
    })
}

fn hash_file(path: &Path) -> Result<String, ArchiveError> {
    let mut file = File::open(path).map_err(|e| ArchiveError::io("open", path, e))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher).map_err(|e| ArchiveError::io("hash", path, e))?;
    Ok(hex::encode(hasher.finalize()))
}
