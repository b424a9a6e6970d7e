use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use platup_session::{FileCredentialStore, default_credentials_path};
use platup_upload::Platform;

use crate::config::CliConfig;
use crate::errors::{CliError, CliErrorKind};

pub mod archive;
pub mod catalog;
pub mod doctor;
pub mod session;
pub mod upload;

#[derive(Parser, Debug)]
#[command(name = "platup", version, about = "Upload builds to the hosting platform")]
pub struct Cli {
    /// Log level: trace|debug|info|warn|error (RUST_LOG overrides)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,
    /// Config file (default: <config dir>/platup/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Platform base URL, overriding the config file
    #[arg(long, global = true, env = "PLATUP_API_URL")]
    pub api_url: Option<String>,
    /// Accept invalid TLS certificates (local servers only)
    #[arg(long, global = true, default_value_t = false)]
    pub insecure: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log in and store the session token
    Login {
        #[arg(long, short, env = "PLATUP_USERNAME")]
        username: String,
        /// Read from stdin when omitted
        #[arg(long, env = "PLATUP_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Forget the stored token
    Logout,
    /// Show the logged-in user after validating the token
    Whoami,
    /// List organizations
    Orgs,
    /// List applications of an organization
    Apps {
        /// Organization id (default: first organization)
        #[arg(long)]
        org: Option<String>,
    },
    /// Zip a build directory without uploading it
    Archive {
        /// Build output directory
        #[arg(long)]
        source: PathBuf,
        /// Archive path (default: <name>_<target>.zip next to the source)
        #[arg(long)]
        out: Option<PathBuf>,
        /// Application name used for the default archive name
        #[arg(long)]
        name: Option<String>,
    },
    /// Zip a build directory and upload it
    Upload(upload::UploadArgs),
    /// Check connectivity to the platform and the stored session
    Doctor,
}

/// Shared state for command handlers.
pub struct Context {
    pub config: CliConfig,
    /// Base URL from `--api-url`/`PLATUP_API_URL` or the config file.
    pub api_url: String,
    pub credentials_path: PathBuf,
}

impl Context {
    pub fn new(config: CliConfig, api_url: Option<String>, insecure: bool) -> Result<Self> {
        let mut config = config;
        if insecure {
            config.accept_invalid_certs = true;
        }
        let api_url = api_url
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| config.api_url.clone());
        let credentials_path = default_credentials_path().ok_or_else(|| {
            CliError::new(CliErrorKind::Config(
                "cannot determine where to store credentials".into(),
            ))
        })?;
        Ok(Self {
            config,
            api_url,
            credentials_path,
        })
    }

    /// Builds a logged-out client backed by the credentials file.
    pub fn platform(&self) -> Result<Platform> {
        let store = FileCredentialStore::new(self.credentials_path.clone()).map_err(|e| {
            CliError::with_source(
                CliErrorKind::Config(format!(
                    "failed to read credentials from {}",
                    self.credentials_path.display()
                )),
                e,
            )
        })?;
        let mut platform =
            Platform::new(self.config.transport_config(), Box::new(store), &self.api_url)?;
        platform
            .uploader()
            .set_cleanup_on_success(self.config.auto_cleanup);
        Ok(platform)
    }

    /// Restores the stored session and fails unless it is still valid.
    pub async fn logged_in_platform(&self) -> Result<Platform> {
        let mut platform = self.platform()?;
        platform.start().await?;
        if !platform.session().is_authenticated() {
            return Err(CliError::new(CliErrorKind::Auth(
                "not logged in; run `platup login`".into(),
            ))
            .into());
        }
        Ok(platform)
    }
}

pub async fn dispatch(cli: Cli, ctx: Context) -> Result<()> {
    match cli.command {
        Commands::Login { username, password } => {
            session::login(&ctx, &username, password).await
        }
        Commands::Logout => session::logout(&ctx),
        Commands::Whoami => session::whoami(&ctx).await,
        Commands::Orgs => catalog::orgs(&ctx).await,
        Commands::Apps { org } => catalog::apps(&ctx, org.as_deref()).await,
        Commands::Archive { source, out, name } => {
            archive::handle(&ctx, source, out, name.as_deref()).await.map(|_| ())
        }
        Commands::Upload(args) => upload::handle(&ctx, args).await,
        Commands::Doctor => doctor::handle(&ctx).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_upload_update() {
        let cli = Cli::try_parse_from([
            "platup",
            "upload",
            "--source",
            "Builds/WebGL",
            "--name",
            "My Game",
            "--app",
            "a1",
            "--changelog",
            "Fixes",
            "--force",
        ])
        .unwrap();
        match cli.command {
            Commands::Upload(args) => {
                assert_eq!(args.app.as_deref(), Some("a1"));
                assert_eq!(args.changelog.as_deref(), Some("Fixes"));
                assert!(args.force);
                assert!(!args.keep);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn changelog_requires_app() {
        let res = Cli::try_parse_from([
            "platup", "upload", "--source", "x", "--changelog", "Fixes",
        ]);
        assert!(res.is_err());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["platup", "orgs", "--insecure", "--log-level", "debug"])
            .unwrap();
        assert!(cli.insecure);
        assert_eq!(cli.log_level, "debug");
    }
}
