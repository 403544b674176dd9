use anyhow::{Context, Result};
use provision_config::parser;
use std::path::Path;

pub fn run(config_path: &Path) -> Result<()> {
    println!("Validating {}...", config_path.display());

    let config = parser::parse_file(config_path).context("Failed to parse configuration")?;

    println!("✓ Configuration valid");
    println!("  Version: {}", config.version);
    println!("  Target: {}", config.target.host);
    println!("  Distribution: {}", config.distribution);
    if let Some(dist_name) = &config.dist_name {
        println!("  Release: {}", dist_name);
    }
    println!("  Privileged route: {}", if config.use_sudo { "sudo" } else { "direct" });
    println!("  System install: {}", config.system_install);
    println!("  Local install: {}", config.local_install);
    println!("  Settings: {}", config.settings.len());

    if config.installed_files_dir.is_none() {
        println!(
            "  ⚠ No installed_files_dir, templates will be fetched from {}",
            config.resource_url
        );
    }

    Ok(())
}
