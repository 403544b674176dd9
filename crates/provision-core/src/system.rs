//! Shell profile, init script and file helpers

use command_executor::{shell_escape, RunOptions};
use tracing::debug;

use crate::context::ExecutionContext;
use crate::error::Result;

/// Profiles touched when the caller names none
pub const DEFAULT_PROFILES: &[&str] = &["/etc/bash.bashrc", "/etc/profile"];

/// Append `line` to each profile that does not already contain it
///
/// An empty `profiles` slice means [`DEFAULT_PROFILES`]. With `privileged`
/// the append goes through the privileged route.
pub async fn add_to_profiles(
    ctx: &ExecutionContext,
    line: &str,
    profiles: &[&str],
    privileged: bool,
) -> Result<()> {
    let profiles = if profiles.is_empty() {
        DEFAULT_PROFILES
    } else {
        profiles
    };
    let quoted = shell_escape(line);
    let router = ctx.router();

    for profile in profiles {
        let check = format!("grep -qF -- {} {}", quoted, profile);
        if router.run_with(&check, RunOptions::probe()).await?.succeeded() {
            debug!("{} already in {}", line, profile);
            continue;
        }
        let append = format!("echo {} >> {}", quoted, profile);
        if privileged {
            router.sudo(&append).await?;
        } else {
            router.run(&append).await?;
        }
    }
    Ok(())
}

/// Link `/etc/init.d/<name>` into every runlevel: stopped in 0, 1 and 6, started otherwise
pub async fn setup_simple_service(ctx: &ExecutionContext, name: &str) -> Result<()> {
    let service = shell_escape(name);
    for runlevel in 0..=6 {
        let prefix = if matches!(runlevel, 0 | 1 | 6) { "K01" } else { "S99" };
        ctx.router()
            .sudo(&format!(
                "ln -f -s /etc/init.d/{service} /etc/rc{runlevel}.d/{prefix}{service}"
            ))
            .await?;
    }
    Ok(())
}

/// Write `contents` to `path` on the target with POSIX `mode`
pub async fn write_to_file(ctx: &ExecutionContext, contents: &str, path: &str, mode: u32) -> Result<()> {
    ctx.router().put_file(contents.as_bytes(), path, mode).await?;
    Ok(())
}
