use super::Target;
use anyhow::{Context, Result};
use provision_core::install::{
    get_install, get_install_local, BuildStep, ConfigureMake, InstallSource, ShellSteps,
};
use tracing::info;

/// What to install and how to build it
pub struct InstallRequest<'a> {
    pub url: &'a str,
    pub local: bool,
    pub steps: Vec<String>,
    pub privileged: bool,
    pub dir_name: Option<&'a str>,
    pub revision: Option<&'a str>,
}

impl InstallRequest<'_> {
    fn build_step(&self) -> Box<dyn BuildStep> {
        if self.steps.is_empty() {
            return Box::new(ConfigureMake);
        }
        let steps = ShellSteps::new(self.steps.iter().cloned());
        if self.privileged {
            Box::new(steps.privileged())
        } else {
            Box::new(steps)
        }
    }
}

pub async fn run(target: Target<'_>, request: InstallRequest<'_>) -> Result<()> {
    let ctx = target.connect().await?;
    let step = request.build_step();

    if request.local {
        if request.revision.is_some() {
            anyhow::bail!("--revision is not supported with --local");
        }
        let installed = get_install_local(&ctx, request.url, step.as_ref(), None, request.dir_name)
            .await
            .with_context(|| format!("Failed to install {}", request.url))?;
        if installed {
            println!("✓ Installed {} into {}", request.url, ctx.local_install());
        } else {
            println!("{} already present in {}", request.url, ctx.local_install());
        }
        return Ok(());
    }

    let source = InstallSource {
        revision: request.revision,
        dir_name: request.dir_name,
    };
    get_install(&ctx, request.url, step.as_ref(), None, source)
        .await
        .with_context(|| format!("Failed to install {}", request.url))?;
    info!("Finished {}", request.url);
    println!("✓ Installed {} into {}", request.url, ctx.system_install());
    Ok(())
}

