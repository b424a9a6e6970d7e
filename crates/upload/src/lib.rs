//! Build uploads to the platform.
//!
//! [`UploadOrchestrator`] validates an [`UploadRequest`] against the
//! catalog, checks the archive size and streams it as a multipart form,
//! reporting [`UploadEvent`]s along the way. [`Platform`] ties the
//! transport, session, catalog and orchestrator together for frontends.

mod error;
mod orchestrator;
mod platform;
mod types;

pub use error::{PlatformError, UploadError};
pub use orchestrator::{PreparedUpload, UploadOrchestrator, extract_application_id};
pub use platform::Platform;
pub use types::{
    MAX_UPLOAD_BYTES, SizeWarning, UploadEvent, UploadMode, UploadOutcome, UploadPhase,
    UploadRequest, WARN_UPLOAD_BYTES,
};
