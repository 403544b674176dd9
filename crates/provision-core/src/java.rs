//! Versioned installs with a moving "current" link
//!
//! Java tools live in `<system_install>/share/java/<name>-<version>` with
//! `<system_install>/share/java/<name>` pointing at the latest install.
//! [`set_default_version`] maintains a similar `default` link beside a set of
//! version directories.

use async_trait::async_trait;
use command_executor::shell_escape;
use tracing::info;

use crate::context::ExecutionContext;
use crate::error::{ProvisionError, Result};
use crate::fetch::{fetch_and_unpack, FetchOptions};
use crate::workdir::with_work_dir;

/// Moves an unpacked Java distribution into its version directory
#[async_trait]
pub trait JavaInstallStep: Send + Sync {
    /// Install from the context's current directory into `install_dir`
    async fn install(&self, ctx: &ExecutionContext, install_dir: &str) -> Result<()>;
}

/// Moves every top-level `*.jar` into the version directory
#[derive(Debug, Clone, Copy, Default)]
pub struct MoveJars;

#[async_trait]
impl JavaInstallStep for MoveJars {
    async fn install(&self, ctx: &ExecutionContext, install_dir: &str) -> Result<()> {
        ctx.router()
            .sudo(&format!("mv *.jar {}", shell_escape(install_dir)))
            .await?;
        Ok(())
    }
}

/// Create the version directory for `name` and point the unversioned link at it
///
/// Returns `None` when that version is already installed.
pub async fn symlinked_java_version_dir(
    ctx: &ExecutionContext,
    name: &str,
    version: &str,
) -> Result<Option<String>> {
    let base_dir = format!(
        "{}/share/java/{}",
        ctx.system_install().trim_end_matches('/'),
        name
    );
    let install_dir = format!("{}-{}", base_dir, version);
    let router = ctx.router();
    if router.exists(&install_dir).await? {
        return Ok(None);
    }

    router
        .sudo(&format!("mkdir -p {}", shell_escape(&install_dir)))
        .await?;
    if router.exists(&base_dir).await? {
        router.sudo(&format!("rm -f {}", shell_escape(&base_dir))).await?;
    }
    router
        .sudo(&format!(
            "ln -s {} {}",
            shell_escape(&install_dir),
            shell_escape(&base_dir)
        ))
        .await?;
    Ok(Some(install_dir))
}

/// Install version `version` of the Java tool `name` from `url`
///
/// Does nothing when the version directory already exists. Without a
/// custom `step`, the unpacked jars are moved in. Returns whether anything
/// was installed.
pub async fn java_install(
    ctx: &ExecutionContext,
    name: &str,
    version: &str,
    url: &str,
    step: Option<&dyn JavaInstallStep>,
) -> Result<bool> {
    let Some(install_dir) = symlinked_java_version_dir(ctx, name, version).await? else {
        info!("{} {} already installed", name, version);
        return Ok(false);
    };

    with_work_dir(ctx, |work_dir| async move {
        let work = ctx.within(&work_dir);
        let dir_name = fetch_and_unpack(&work, url, FetchOptions::default())
            .await?
            .ok_or_else(|| ProvisionError::DirectoryNotFound {
                dir_name: url.to_string(),
            })?;
        let unpacked = work.within(&dir_name);
        match step {
            Some(step) => step.install(&unpacked, &install_dir).await?,
            None => MoveJars.install(&unpacked, &install_dir).await?,
        }
        Ok(true)
    })
    .await
}

/// Point `<install_dir>/../<link_name>` at `install_dir` if it is newer
///
/// The link is created when missing and replaced when `version` sorts after
/// the version it currently points to. Versions compare as plain strings,
/// so `"1.9"` sorts after `"1.10"`. Returns whether the link changed.
pub async fn set_default_version(
    ctx: &ExecutionContext,
    install_dir: &str,
    version: &str,
    link_name: &str,
) -> Result<bool> {
    let router = ctx.router();
    if !router.exists(install_dir).await? {
        return Ok(false);
    }

    let link = format!("{}/../{}", install_dir.trim_end_matches('/'), link_name);
    let replace = if router.exists(&link).await? {
        let current = router
            .sudo(&format!("basename `readlink -f {}`", shell_escape(&link)))
            .await?;
        let current = current.trimmed();
        if version > current {
            info!(
                "default version {} is older than version {} just installed, replacing...",
                current, version
            );
            true
        } else {
            false
        }
    } else {
        true
    };

    if replace {
        router
            .sudo(&format!(
                "rm -rf {link}; ln -f -s {target} {link}",
                link = shell_escape(&link),
                target = shell_escape(install_dir)
            ))
            .await?;
    }
    Ok(replace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::test_support::{local_context, scripted_context};
    use command_executor::mock::ScriptedLauncher;
    use std::fs;
    use std::path::Path;

    fn link_target(link: &Path) -> String {
        fs::read_link(link)
            .unwrap()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .into_owned()
    }

    async fn install_version(ctx: &ExecutionContext, root: &Path, version: &str) -> bool {
        let dir = root.join(version);
        fs::create_dir_all(&dir).unwrap();
        set_default_version(ctx, dir.to_str().unwrap(), version, "default")
            .await
            .unwrap()
    }

    #[smol_potat::test]
    async fn test_newer_version_takes_over_default() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = local_context();

        assert!(install_version(&ctx, tmp.path(), "1.5").await);
        assert_eq!(link_target(&tmp.path().join("default")), "1.5");

        assert!(install_version(&ctx, tmp.path(), "2.0").await);
        assert_eq!(link_target(&tmp.path().join("default")), "2.0");

        assert!(!install_version(&ctx, tmp.path(), "1.7").await);
        assert_eq!(link_target(&tmp.path().join("default")), "2.0");
    }

    #[smol_potat::test]
    async fn test_versions_compare_as_strings() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = local_context();

        assert!(install_version(&ctx, tmp.path(), "1.10").await);
        assert_eq!(link_target(&tmp.path().join("default")), "1.10");

        // "1.9" > "1.10" as strings, so the older release becomes the default
        assert!(install_version(&ctx, tmp.path(), "1.9").await);
        assert_eq!(link_target(&tmp.path().join("default")), "1.9");
    }

    #[smol_potat::test]
    async fn test_missing_install_dir_is_ignored() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = local_context();
        let missing = tmp.path().join("3.0");
        let changed = set_default_version(&ctx, missing.to_str().unwrap(), "3.0", "default")
            .await
            .unwrap();
        assert!(!changed);
        assert!(!tmp.path().join("default").exists());
    }

    #[smol_potat::test]
    async fn test_version_dir_and_link() {
        let launcher = ScriptedLauncher::new()
            .respond("test -e \"$(echo /opt/sys/share/java/picard-1.96)\"", 1, "")
            .respond("test -e \"$(echo /opt/sys/share/java/picard)\"", 0, "");
        let ctx = scripted_context(&launcher);

        let dir = symlinked_java_version_dir(&ctx, "picard", "1.96").await.unwrap();
        assert_eq!(dir.as_deref(), Some("/opt/sys/share/java/picard-1.96"));
        assert_eq!(
            &launcher.commands()[1..],
            &[
                "sudo sh -c mkdir -p /opt/sys/share/java/picard-1.96",
                "test -e \"$(echo /opt/sys/share/java/picard)\"",
                "sudo sh -c rm -f /opt/sys/share/java/picard",
                "sudo sh -c ln -s /opt/sys/share/java/picard-1.96 /opt/sys/share/java/picard",
            ]
        );
    }

    #[smol_potat::test]
    async fn test_java_install_skips_existing_version() {
        let launcher = ScriptedLauncher::new().respond("test -e", 0, "");
        let ctx = scripted_context(&launcher);

        let installed = java_install(&ctx, "gatk", "2.3", "http://x.org/gatk-2.3.tar.bz2", None)
            .await
            .unwrap();
        assert!(!installed);
        assert_eq!(launcher.commands().len(), 1);
    }

    #[smol_potat::test]
    async fn test_java_install_moves_jars() {
        let launcher = ScriptedLauncher::new()
            .respond("echo $TMPDIR", 0, "/tmp\n")
            .respond("test -e \"$(echo /opt/sys/share/java/", 1, "")
            .respond("test -e", 0, "");
        let ctx = scripted_context(&launcher);

        let installed = java_install(&ctx, "gatk", "2.3", "http://x.org/gatk-2.3.tar.bz2", None)
            .await
            .unwrap();
        assert!(installed);
        assert!(launcher.saw("-xjpf gatk-2.3.tar.bz2"));
        assert!(launcher.saw("/gatk-2.3 && mv *.jar /opt/sys/share/java/gatk-2.3"));
    }
}
