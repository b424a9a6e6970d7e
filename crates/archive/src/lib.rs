//! Build directory archiving.
//!
//! Packs a build output directory into a zip file with forward-slash
//! relative paths, ready for a multipart upload.

mod builder;
mod error;
mod naming;
mod scanner;

pub use builder::{ArchiveOptions, BuildArtifact, build_archive, build_archive_with, spawn_build};
pub use error::ArchiveError;
pub use naming::{ArchiveMode, archive_file_name};
