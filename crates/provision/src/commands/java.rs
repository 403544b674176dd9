use super::Target;
use anyhow::{Context, Result};
use provision_core::java::java_install;

pub async fn run(target: Target<'_>, name: &str, version: &str, url: &str) -> Result<()> {
    let ctx = target.connect().await?;
    let installed = java_install(&ctx, name, version, url, None)
        .await
        .with_context(|| format!("Failed to install {} {}", name, version))?;

    if installed {
        println!("✓ Installed {} {}", name, version);
    } else {
        println!("{} {} already installed", name, version);
    }
    Ok(())
}
