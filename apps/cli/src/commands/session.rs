use std::io::{BufRead, Write};

use anyhow::Result;
use tracing::info;

use super::Context;
use crate::errors::{CliError, CliErrorKind};

pub async fn login(ctx: &Context, username: &str, password: Option<String>) -> Result<()> {
    let password = match password {
        Some(p) => p,
        None => read_password()?,
    };

    let mut platform = ctx.platform()?;
    let session = platform.login(&ctx.api_url, username, &password).await?;
    info!(username = %session.username, base_url = %session.base_url, "logged in");
    println!("Logged in as {} on {}", session.username, session.base_url);

    let orgs = platform.catalog().organizations();
    match orgs.len() {
        0 => println!("No organizations found for this account."),
        n => println!("{n} organization(s) available; `platup orgs` to list them."),
    }
    Ok(())
}

pub fn logout(ctx: &Context) -> Result<()> {
    let mut platform = ctx.platform()?;
    platform.load();
    let session = platform.logout();
    if session.username.is_empty() {
        println!("Logged out.");
    } else {
        println!("Logged out {}.", session.username);
    }
    Ok(())
}

pub async fn whoami(ctx: &Context) -> Result<()> {
    let platform = ctx.logged_in_platform().await?;
    let session = platform.session();
    println!("{} on {}", session.username, session.base_url);
    Ok(())
}

fn read_password() -> Result<String> {
    eprint!("Password: ");
    std::io::stderr().flush()?;
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| CliError::with_source(CliErrorKind::Io("failed to read password".into()), e))?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        return Err(CliError::new(CliErrorKind::Usage("password must not be empty".into())).into());
    }
    Ok(password)
}
