use anyhow::Result;
use tracing::debug;

use super::Context;
use crate::errors::{CliError, CliErrorKind};

/// Probes the platform, then checks the stored session if there is one.
pub async fn handle(ctx: &Context) -> Result<()> {
    let mut platform = ctx.platform()?;
    let session = platform.load().clone();
    println!("config:      {}", ctx.config.api_url);
    println!("platform:    {}", session.base_url);
    println!("credentials: {}", ctx.credentials_path.display());

    match platform.transport().probe(&session.base_url).await {
        Ok(status) => println!("reachable:   yes (HTTP {status})"),
        Err(e) => {
            println!("reachable:   no ({e})");
            return Err(CliError::with_source(
                CliErrorKind::Network(format!("cannot reach {}", session.base_url)),
                e,
            )
            .into());
        }
    }

    if !session.is_authenticated() {
        println!("session:     not logged in");
        return Ok(());
    }
    match platform.validate().await {
        Ok(s) => println!("session:     valid ({})", s.username),
        Err(e) if e.is_auth() => println!("session:     expired; run `platup login`"),
        Err(e) => {
            debug!(error = %e, "session check failed");
            println!("session:     unknown ({e})");
        }
    }
    Ok(())
}
