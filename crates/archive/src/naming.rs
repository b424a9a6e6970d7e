/// What the archive will be uploaded as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveMode {
    Create,
    Update,
}

/// File name for an application's upload archive.
///
/// Spaces in `app_name` become underscores. New applications get
/// `<name>_<target>.zip`, version updates `<name>_update.zip`.
pub fn archive_file_name(app_name: &str, target: &str, mode: ArchiveMode) -> String {
    let trimmed = app_name.trim();
    let base = if trimmed.is_empty() {
        "build".to_string()
    } else {
        trimmed.replace(' ', "_")
    };
    match mode {
        ArchiveMode::Create => format!("{base}_{target}.zip"),
        ArchiveMode::Update => format!("{base}_update.zip"),
    }
}
