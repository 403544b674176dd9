use super::Target;
use anyhow::Result;

pub async fn run(target: Target<'_>) -> Result<()> {
    let ctx = target.connect().await?;

    println!("Environment");
    println!(
        "  Connection: {}",
        if ctx.router().is_remote() { "ssh" } else { "local" }
    );
    println!("  Distribution: {}", ctx.distribution());
    if let Some(dist_name) = ctx.dist_name() {
        println!("  Release: {}", dist_name);
    }
    println!("  64-bit: {}", ctx.is_64bit());
    println!("  Sudo: {}", ctx.use_sudo());
    println!("  System install: {}", ctx.system_install());
    println!("  Local install: {}", ctx.local_install());
    if let Some(data_files) = ctx.data_files() {
        println!("  Data files: {}", data_files);
    }
    println!("  Java home: {}", ctx.java_home());

    let sources = &ctx.profile().sources;
    if !sources.is_empty() {
        println!("  Package sources:");
        for source in sources {
            println!("    {}", source);
        }
    }

    Ok(())
}
