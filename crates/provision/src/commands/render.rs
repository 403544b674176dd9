use super::{parse_pairs, Target};
use anyhow::{Context, Result};
use provision_core::template::{render_config_file_template, setup_conf_file};
use std::collections::HashMap;

pub async fn run(
    target: Target<'_>,
    name: &str,
    dest: Option<&str>,
    source: Option<&str>,
    overrides: &[String],
) -> Result<()> {
    let ctx = target.connect().await?;
    let overrides: HashMap<String, String> = parse_pairs(overrides)?.into_iter().collect();
    let defaults = HashMap::new();

    match dest {
        Some(dest) => {
            setup_conf_file(&ctx, dest, name, &defaults, &overrides, source)
                .await
                .with_context(|| format!("Failed to write {} to {}", name, dest))?;
            println!("✓ Wrote {} to {}", name, dest);
        }
        None => {
            let rendered = render_config_file_template(&ctx, name, &defaults, &overrides, source)
                .with_context(|| format!("Failed to render {}", name))?;
            print!("{}", rendered);
        }
    }
    Ok(())
}
