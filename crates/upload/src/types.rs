//! Data types for the upload flow.

use std::fmt;
use std::path::PathBuf;

/// Archives above this size are refused before any request.
pub const MAX_UPLOAD_BYTES: u64 = 100 * 1024 * 1024;

/// Archives above this size upload with a warning.
pub const WARN_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

/// Create a new application or add a version to an existing one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadMode {
    Create,
    Update {
        application_id: String,
        changelog: String,
    },
}

/// Everything needed to upload one build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub name: String,
    pub description: String,
    pub organization_id: String,
    pub is_public: bool,
    pub archive_path: PathBuf,
    /// Build output the archive was made from. Deleted with the archive
    /// after a successful upload when cleanup is on.
    pub build_dir: Option<PathBuf>,
    pub mode: UploadMode,
}

/// Steps of one upload attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadPhase {
    Preparing,
    SizeChecked,
    Sending,
    Completed,
    Failed,
}

impl fmt::Display for UploadPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Preparing => "preparing",
            Self::SizeChecked => "size checked",
            Self::Sending => "sending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Archive is large enough that the upload may be slow or rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeWarning {
    pub size_bytes: u64,
    pub threshold_bytes: u64,
}

impl fmt::Display for SizeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "archive is {:.1} MiB, above the recommended {} MiB; the upload may take a while",
            self.size_bytes as f64 / (1024.0 * 1024.0),
            self.threshold_bytes / (1024 * 1024)
        )
    }
}

/// Progress event emitted during an upload.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadEvent {
    /// Entered a new phase.
    Phase(UploadPhase),
    /// Bytes sent so far, as a percentage of the archive.
    Progress { percent: f64, status: String },
    Warning(SizeWarning),
    Completed { application_id: Option<String> },
    Failed { error: String },
}

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    /// Id of the created or updated application, when known.
    pub application_id: Option<String>,
    pub status: u16,
    /// Raw response body.
    pub body: String,
    pub warnings: Vec<SizeWarning>,
    /// Whether the archive and build directory were deleted.
    pub cleaned_up: bool,
}
