use std::path::{Path, PathBuf};

use anyhow::Result;
use platup_archive::{ArchiveMode, ArchiveOptions, BuildArtifact, archive_file_name, spawn_build};

use super::Context;
use crate::progress::percent_bar;

pub async fn handle(
    ctx: &Context,
    source: PathBuf,
    out: Option<PathBuf>,
    name: Option<&str>,
) -> Result<BuildArtifact> {
    let name = app_name(ctx, name, &source);
    let dest = out.unwrap_or_else(|| default_archive_path(ctx, &source, &name, ArchiveMode::Create));
    let artifact = build(ctx, source, dest).await?;
    println!(
        "{} ({} files, {} bytes, sha256 {})",
        artifact.archive_path.display(),
        artifact.file_count,
        artifact.size_bytes,
        artifact.sha256
    );
    Ok(artifact)
}

/// Zips `source` into `dest` with a progress bar.
pub async fn build(ctx: &Context, source: PathBuf, dest: PathBuf) -> Result<BuildArtifact> {
    let options = ArchiveOptions {
        compress: ctx.config.compress_builds,
    };
    let pb = percent_bar("archiving");
    let bar = pb.clone();
    let result = spawn_build(source, dest, options, move |fraction| {
        bar.set_position((fraction * 100.0) as u64);
    })
    .await;
    match &result {
        Ok(_) => pb.finish_and_clear(),
        Err(_) => pb.abandon(),
    }
    Ok(result?)
}

/// Name from the flag, then the config default, then the source directory.
pub fn app_name(ctx: &Context, name: Option<&str>, source: &Path) -> String {
    name.map(str::to_string)
        .filter(|n| !n.trim().is_empty())
        .or_else(|| Some(ctx.config.default_app_name.clone()).filter(|n| !n.trim().is_empty()))
        .or_else(|| {
            source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
        })
        .unwrap_or_default()
}

/// `<parent of source>/<archive file name>`.
pub fn default_archive_path(ctx: &Context, source: &Path, name: &str, mode: ArchiveMode) -> PathBuf {
    let file_name = archive_file_name(name, &ctx.config.build_target, mode);
    match source.parent() {
        Some(parent) => parent.join(file_name),
        None => PathBuf::from(file_name),
    }
}
