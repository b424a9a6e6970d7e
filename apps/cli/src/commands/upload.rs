use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use platup_archive::ArchiveMode;
use platup_upload::{UploadMode, UploadRequest};
use tracing::{info, warn};

use super::Context;
use super::archive::{app_name, build, default_archive_path};
use crate::errors::{CliError, CliErrorKind};
use crate::progress::{follow_upload, percent_bar};

#[derive(Args, Debug)]
pub struct UploadArgs {
    /// Build output directory
    #[arg(long)]
    pub source: PathBuf,
    /// Application name (default: config default_app_name, then the directory name)
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    /// Organization id (default: first organization)
    #[arg(long)]
    pub org: Option<String>,
    /// Make the application public
    #[arg(long, default_value_t = false, conflicts_with = "private")]
    pub public: bool,
    /// Keep the application private even when default_public is set
    #[arg(long, default_value_t = false)]
    pub private: bool,
    /// Existing application id; uploads a new version instead of creating one
    #[arg(long, requires = "changelog")]
    pub app: Option<String>,
    /// What changed in this version
    #[arg(long, requires = "app")]
    pub changelog: Option<String>,
    /// Archive path (default: next to the source directory)
    #[arg(long)]
    pub out: Option<PathBuf>,
    /// Upload even when the archive is large
    #[arg(long, default_value_t = false)]
    pub force: bool,
    /// Keep the archive and build directory after a successful upload
    #[arg(long, default_value_t = false)]
    pub keep: bool,
}

impl UploadArgs {
    /// Whether to publish, from the flags or else the configured default.
    pub fn visibility(&self, default_public: bool) -> bool {
        match (self.public, self.private) {
            (true, _) => true,
            (_, true) => false,
            _ => default_public,
        }
    }
}

pub async fn handle(ctx: &Context, args: UploadArgs) -> Result<()> {
    let is_public = args.visibility(ctx.config.default_public);
    let mut platform = ctx.logged_in_platform().await?;

    if let Some(org) = &args.org {
        platform.select_organization(org)?;
    }
    let organization_id = platform
        .catalog()
        .selected_organization()
        .map(|o| o.id.clone())
        .ok_or_else(|| {
            CliError::new(CliErrorKind::Usage(
                "no organization available for this account".into(),
            ))
        })?;

    let mode = match (args.app, args.changelog) {
        (Some(application_id), Some(changelog)) => {
            platform.refresh_applications(Some(&organization_id)).await?;
            UploadMode::Update {
                application_id,
                changelog,
            }
        }
        _ => UploadMode::Create,
    };
    let archive_mode = match mode {
        UploadMode::Create => ArchiveMode::Create,
        UploadMode::Update { .. } => ArchiveMode::Update,
    };

    let name = app_name(ctx, args.name.as_deref(), &args.source);
    let archive_path = args
        .out
        .unwrap_or_else(|| default_archive_path(ctx, &args.source, &name, archive_mode));
    let artifact = build(ctx, args.source.clone(), archive_path).await?;
    info!(archive = %artifact.archive_path.display(), bytes = artifact.size_bytes, "archive ready");

    let request = UploadRequest {
        name,
        description: args
            .description
            .unwrap_or_else(|| ctx.config.default_description.clone()),
        organization_id,
        is_public,
        archive_path: artifact.archive_path.clone(),
        build_dir: Some(args.source),
        mode,
    };

    let force = args.force;
    let uploader = platform.uploader();
    if args.keep {
        uploader.set_cleanup_on_success(false);
    }
    let pb = percent_bar("uploading");
    let pump = uploader
        .take_events()
        .map(|events| follow_upload(events, pb.clone()));

    let cancel = uploader.cancel_token();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; cancelling upload");
            cancel.cancel();
        }
    });

    let result = async {
        let prepared = platform.prepare_upload(&request).await?;
        if !prepared.warnings.is_empty() && !force {
            for w in &prepared.warnings {
                eprintln!("warning: {w}");
            }
            return Err(CliError::new(CliErrorKind::Usage(
                "archive is large; pass --force to upload anyway".into(),
            ))
            .into());
        }
        Ok::<_, anyhow::Error>(platform.send_upload(prepared).await?)
    }
    .await;

    ctrl_c.abort();
    match pump {
        Some(handle) if result.is_ok() => {
            let _ = handle.await;
        }
        Some(handle) => handle.abort(),
        None => {}
    }
    if result.is_err() {
        pb.abandon();
    }

    let outcome = result?;
    match &outcome.application_id {
        Some(id) => println!("Uploaded {} (application {id})", request.name),
        None => println!("Uploaded {}", request.name),
    }
    if outcome.cleaned_up {
        println!("Removed {}", request.archive_path.display());
        if let Some(dir) = &request.build_dir {
            println!("Removed {}", dir.display());
        }
    }
    Ok(())
}
