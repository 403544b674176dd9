use super::Target;
use anyhow::{Context, Result};
use provision_core::python::create_python_virtualenv;

pub async fn run(
    target: Target<'_>,
    name: &str,
    requirements: Option<&str>,
    requirements_url: Option<&str>,
) -> Result<()> {
    let ctx = target.connect().await?;
    let created = create_python_virtualenv(&ctx, name, requirements, requirements_url)
        .await
        .with_context(|| format!("Failed to create virtualenv {}", name))?;

    if created {
        println!("✓ Created virtualenv {}", name);
    } else {
        println!("Virtualenv {} already exists", name);
    }
    Ok(())
}
