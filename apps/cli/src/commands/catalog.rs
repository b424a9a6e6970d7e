use anyhow::Result;

use super::Context;

pub async fn orgs(ctx: &Context) -> Result<()> {
    let platform = ctx.logged_in_platform().await?;
    let catalog = platform.catalog();
    if catalog.organizations().is_empty() {
        println!("No organizations.");
        return Ok(());
    }
    let selected = catalog.selected_organization().map(|o| o.id.as_str());
    for org in catalog.organizations() {
        let mark = if Some(org.id.as_str()) == selected { "*" } else { " " };
        match &org.description {
            Some(desc) if !desc.is_empty() => println!("{mark} {}  {}  ({desc})", org.id, org.name),
            _ => println!("{mark} {}  {}", org.id, org.name),
        }
    }
    Ok(())
}

pub async fn apps(ctx: &Context, org: Option<&str>) -> Result<()> {
    let mut platform = ctx.logged_in_platform().await?;
    if let Some(id) = org {
        platform.select_organization(id)?;
    }
    let apps = platform.refresh_applications(None).await?;
    if apps.is_empty() {
        println!("No applications.");
        return Ok(());
    }
    for app in apps {
        println!("{}  {}  v{}", app.id, app.name, app.version);
    }
    Ok(())
}
