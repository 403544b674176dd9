//! Install pipelines
//!
//! [`get_install`] builds a source tree inside a throwaway work directory and
//! installs into the shared system prefix. [`get_install_local`] builds into
//! a per-component directory under the local install root and skips the
//! whole pipeline when that directory already exists.

use async_trait::async_trait;
use command_executor::{quote_path, shell_escape};
use tracing::info;

use crate::context::ExecutionContext;
use crate::error::{ProvisionError, Result};
use crate::fetch::{expected_file, fetch_and_unpack, FetchOptions};
use crate::workdir::with_work_dir;

/// One stage of building an unpacked source tree
///
/// Steps run with the context scoped to the source directory.
#[async_trait]
pub trait BuildStep: Send + Sync {
    /// Run the step
    async fn build(&self, ctx: &ExecutionContext) -> Result<()>;
}

/// `./configure && make && sudo make install` against the system prefix
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigureMake;

#[async_trait]
impl BuildStep for ConfigureMake {
    async fn build(&self, ctx: &ExecutionContext) -> Result<()> {
        let router = ctx.router();
        router
            .run(&format!(
                "./configure --disable-werror --prefix={} ",
                ctx.system_install()
            ))
            .await?;
        router.run("make").await?;
        router.sudo("make install").await?;
        Ok(())
    }
}

/// Optionally `make`, then move the files a find command lists into `<system_install>/bin`
#[derive(Default)]
pub struct MakeCopy {
    find_cmd: Option<String>,
    premake: Option<Box<dyn BuildStep>>,
    do_make: bool,
}

impl MakeCopy {
    /// Run `make` and copy nothing
    pub fn new() -> Self {
        Self {
            find_cmd: None,
            premake: None,
            do_make: true,
        }
    }

    /// Move every file `find_cmd` prints into the bin directory
    pub fn with_find(mut self, find_cmd: impl Into<String>) -> Self {
        self.find_cmd = Some(find_cmd.into());
        self
    }

    /// Run `step` before `make`
    pub fn with_premake(mut self, step: impl BuildStep + 'static) -> Self {
        self.premake = Some(Box::new(step));
        self
    }

    /// Skip `make`
    pub fn without_make(mut self) -> Self {
        self.do_make = false;
        self
    }
}

#[async_trait]
impl BuildStep for MakeCopy {
    async fn build(&self, ctx: &ExecutionContext) -> Result<()> {
        if let Some(premake) = &self.premake {
            premake.build(ctx).await?;
        }
        if self.do_make {
            ctx.router().run("make").await?;
        }
        if let Some(find_cmd) = &self.find_cmd {
            let bin_dir = bin_dir(ctx).await?;
            let found = ctx.router().run(find_cmd).await?;
            for file in found.lines() {
                ctx.router()
                    .sudo(&format!("mv -f {} {}", file, shell_escape(&bin_dir)))
                    .await?;
            }
        }
        Ok(())
    }
}

/// A fixed list of shell commands
#[derive(Debug, Clone, Default)]
pub struct ShellSteps {
    commands: Vec<String>,
    privileged: bool,
}

impl ShellSteps {
    /// Run `commands` in order as the connecting user
    pub fn new<I, S>(commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            commands: commands.into_iter().map(Into::into).collect(),
            privileged: false,
        }
    }

    /// Run them through the privileged route instead
    pub fn privileged(mut self) -> Self {
        self.privileged = true;
        self
    }
}

#[async_trait]
impl BuildStep for ShellSteps {
    async fn build(&self, ctx: &ExecutionContext) -> Result<()> {
        for command in &self.commands {
            if self.privileged {
                ctx.router().sudo(command).await?;
            } else {
                ctx.router().run(command).await?;
            }
        }
        Ok(())
    }
}

/// Where the pipelines get their source from
#[derive(Debug, Clone, Copy, Default)]
pub struct InstallSource<'a> {
    /// Revision to check out after cloning (git only)
    pub revision: Option<&'a str>,
    /// Directory the archive creates, when it differs from the file name
    pub dir_name: Option<&'a str>,
}

/// Fetch `url`, build it with `step` and install into the system prefix
///
/// `post_unpack` runs in the source directory before `step`. The work
/// directory is removed however the pipeline ends.
pub async fn get_install(
    ctx: &ExecutionContext,
    url: &str,
    step: &dyn BuildStep,
    post_unpack: Option<&dyn BuildStep>,
    source: InstallSource<'_>,
) -> Result<()> {
    info!("Installing {}", url);
    with_work_dir(ctx, |work_dir| async move {
        let work = ctx.within(&work_dir);
        let options = FetchOptions {
            revision: source.revision,
            dir_name: source.dir_name,
            optional_dir: false,
        };
        let dir_name = fetch_and_unpack(&work, url, options)
            .await?
            .ok_or_else(|| ProvisionError::DirectoryNotFound {
                dir_name: url.to_string(),
            })?;

        let build = work.within(&dir_name);
        if let Some(post_unpack) = post_unpack {
            post_unpack.build(&build).await?;
        }
        step.build(&build).await
    })
    .await
}

/// The two directory names a local install of `url` may already occupy
pub fn local_install_candidates(
    local_install: &str,
    url: &str,
    dir_name: Option<&str>,
) -> Result<(String, String)> {
    let root = local_install.trim_end_matches('/');
    let test_name = expected_file(url, None)?.dir_name;
    let unversioned = match dir_name {
        Some(dir_name) => dir_name.to_string(),
        None => match test_name.rsplit_once('-') {
            Some((stem, _version)) => stem.to_string(),
            None => test_name.split('_').next().unwrap_or(&test_name).to_string(),
        },
    };
    Ok((
        format!("{}/{}", root, test_name),
        format!("{}/{}", root, unversioned),
    ))
}

/// Build `url` and move the finished tree into the local install root
///
/// Returns `false` without fetching when either candidate directory exists.
/// The destination is checked again after fetching, since another install
/// may have finished meanwhile; the window between that check and the move
/// is not closed.
pub async fn get_install_local(
    ctx: &ExecutionContext,
    url: &str,
    step: &dyn BuildStep,
    post_unpack: Option<&dyn BuildStep>,
    dir_name: Option<&str>,
) -> Result<bool> {
    let (versioned, unversioned) = local_install_candidates(ctx.local_install(), url, dir_name)?;
    let router = ctx.router();
    if router.exists(&versioned).await? || router.exists(&unversioned).await? {
        info!("{} already installed locally, skipping", url);
        return Ok(false);
    }

    info!("Installing {} into {}", url, ctx.local_install());
    with_work_dir(ctx, |work_dir| async move {
        let work = ctx.within(&work_dir);
        let options = FetchOptions {
            dir_name,
            ..Default::default()
        };
        let source_dir = fetch_and_unpack(&work, url, options)
            .await?
            .ok_or_else(|| ProvisionError::DirectoryNotFound {
                dir_name: url.to_string(),
            })?;

        let destination = format!("{}/{}", ctx.local_install().trim_end_matches('/'), source_dir);
        if work.router().exists(&destination).await? {
            info!("{} appeared while fetching, leaving it in place", destination);
            return Ok(false);
        }

        let build = work.within(&source_dir);
        if let Some(post_unpack) = post_unpack {
            post_unpack.build(&build).await?;
        }
        step.build(&build).await?;
        work.router()
            .run(&format!(
                "mv {} {}",
                shell_escape(&source_dir),
                quote_path(ctx.local_install())
            ))
            .await?;
        Ok(true)
    })
    .await
}

/// `<system_install>/bin`, created if missing
pub async fn bin_dir(ctx: &ExecutionContext) -> Result<String> {
    install_subdir(ctx, "bin").await
}

/// `<system_install>/include`, created if missing
pub async fn include_dir(ctx: &ExecutionContext) -> Result<String> {
    install_subdir(ctx, "include").await
}

/// `<system_install>/lib`, created if missing
pub async fn lib_dir(ctx: &ExecutionContext) -> Result<String> {
    install_subdir(ctx, "lib").await
}

async fn install_subdir(ctx: &ExecutionContext, subdir: &str) -> Result<String> {
    let path = format!("{}/{}", ctx.system_install().trim_end_matches('/'), subdir);
    if !ctx.router().exists(&path).await? {
        ctx.router()
            .sudo(&format!("mkdir -p {}", shell_escape(&path)))
            .await?;
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::test_support::{local_context_with_tmpdir, scripted_context};
    use command_executor::mock::ScriptedLauncher;
    use std::fs;

    #[test]
    fn test_local_install_candidates() {
        let (a, b) =
            local_install_candidates("/home/me/install/", "http://x.org/tool-1.0.tar.gz", None)
                .unwrap();
        assert_eq!(a, "/home/me/install/tool-1.0");
        assert_eq!(b, "/home/me/install/tool");

        let (_, b) =
            local_install_candidates("/opt/my-tools", "http://x.org/tool_core.tgz", None).unwrap();
        assert_eq!(b, "/opt/my-tools/tool");

        let (_, b) =
            local_install_candidates("/opt", "http://x.org/tool-1.0.zip", Some("Tool")).unwrap();
        assert_eq!(b, "/opt/Tool");
    }

    #[smol_potat::test]
    async fn test_configure_make_routing() {
        let launcher = ScriptedLauncher::new();
        let ctx = scripted_context(&launcher).within("/tmp/w/pkg");

        ConfigureMake.build(&ctx).await.unwrap();
        assert_eq!(
            launcher.commands(),
            vec![
                "cd /tmp/w/pkg && ./configure --disable-werror --prefix=/opt/sys ",
                "cd /tmp/w/pkg && make",
                "sudo sh -c cd /tmp/w/pkg && make install",
            ]
        );
    }

    #[smol_potat::test]
    async fn test_make_copy_moves_found_files() {
        let launcher = ScriptedLauncher::new()
            .respond("test -e \"$(echo /opt/sys/bin)\"", 1, "")
            .respond("find . -perm -100", 0, "./bin/tool\r\n./bin/helper\n");
        let ctx = scripted_context(&launcher);

        let step = MakeCopy::new()
            .with_premake(ShellSteps::new(["sed -i s/gcc/cc/ Makefile"]))
            .with_find("find . -perm -100 -type f");
        step.build(&ctx).await.unwrap();

        let commands = launcher.commands();
        assert_eq!(commands[0], "sed -i s/gcc/cc/ Makefile");
        assert_eq!(commands[1], "make");
        assert!(launcher.saw("sudo sh -c mkdir -p /opt/sys/bin"));
        assert!(launcher.saw("sudo sh -c mv -f ./bin/tool /opt/sys/bin"));
        assert!(launcher.saw("sudo sh -c mv -f ./bin/helper /opt/sys/bin"));
    }

    #[smol_potat::test]
    async fn test_install_subdirs_only_created_when_missing() {
        let launcher = ScriptedLauncher::new().respond("test -e", 0, "");
        let ctx = scripted_context(&launcher);
        assert_eq!(lib_dir(&ctx).await.unwrap(), "/opt/sys/lib");
        assert_eq!(include_dir(&ctx).await.unwrap(), "/opt/sys/include");
        assert!(!launcher.saw("mkdir"));
    }

    #[smol_potat::test]
    async fn test_get_install_cleans_up_after_failed_fetch() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = local_context_with_tmpdir(tmp.path());

        // Nothing listens on the discard port, so the download fails
        let err = get_install(
            &ctx,
            "http://127.0.0.1:9/tool-1.0.tar.gz",
            &ConfigureMake,
            None,
            InstallSource::default(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ProvisionError::Command(_)));
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[smol_potat::test]
    async fn test_get_install_runs_hooks_in_source_dir() {
        let launcher = ScriptedLauncher::new()
            .respond("echo $TMPDIR", 0, "/tmp\n")
            .respond("test -e \"$(echo tool-1.0.tar.gz)\"", 1, "")
            .respond("test -e \"$(echo tool-1.0)\"", 0, "");
        let ctx = scripted_context(&launcher);

        get_install(
            &ctx,
            "http://x.org/tool-1.0.tar.gz",
            &ShellSteps::new(["make"]),
            Some(&ShellSteps::new(["patch -p1 < fix.diff"])),
            InstallSource::default(),
        )
        .await
        .unwrap();

        let commands = launcher.commands();
        let work_dir = commands[1].trim_start_matches("mkdir -p ").to_string();
        assert!(work_dir.starts_with("/tmp/provision-"));
        assert!(launcher.saw(&format!("cd {} && wget", work_dir)));
        assert!(launcher.saw(&format!("cd {}/tool-1.0 && patch -p1 < fix.diff", work_dir)));
        assert!(launcher.saw(&format!("cd {}/tool-1.0 && make", work_dir)));
        assert_eq!(commands.last().unwrap(), &format!("rm -rf {}", work_dir));
    }

    #[smol_potat::test]
    async fn test_get_install_local_skips_existing_install() {
        let launcher = ScriptedLauncher::new()
            .respond("test -e \"$(echo /home/me/install/tool)\"", 0, "")
            .respond("test -e", 1, "");
        let ctx = scripted_context(&launcher);

        let installed =
            get_install_local(&ctx, "http://x.org/tool-1.0.tar.gz", &ConfigureMake, None, None)
                .await
                .unwrap();
        assert!(!installed);
        assert_eq!(launcher.commands().len(), 2);
        assert!(!launcher.saw("mkdir"));
    }

    #[smol_potat::test]
    async fn test_get_install_local_builds_and_moves() {
        let launcher = ScriptedLauncher::new()
            .respond("echo $TMPDIR", 0, "/tmp\n")
            .respond("test -e \"$(echo /home/me/install/", 1, "")
            .respond("test -e \"$(echo tool-1.0.tar.gz)\"", 0, "")
            .respond("test -e \"$(echo tool-1.0)\"", 0, "");
        let ctx = scripted_context(&launcher);

        let installed = get_install_local(
            &ctx,
            "http://x.org/tool-1.0.tar.gz",
            &ShellSteps::new(["make"]),
            None,
            None,
        )
        .await
        .unwrap();

        assert!(installed);
        assert!(!launcher.saw("wget"));
        assert!(launcher.saw("/tool-1.0 && make"));
        assert!(launcher.saw("&& mv tool-1.0 /home/me/install"));
        assert!(launcher.commands().last().unwrap().starts_with("rm -rf /tmp/provision-"));
    }

    #[smol_potat::test]
    async fn test_get_install_local_leaves_concurrent_install_alone() {
        let launcher = ScriptedLauncher::new()
            .respond("echo $TMPDIR", 0, "/tmp\n")
            .respond_once("test -e \"$(echo /home/me/install/tool-1.0)\"", 1, "")
            .respond("test -e \"$(echo /home/me/install/tool)\"", 1, "")
            .respond("test -e", 0, "");
        let ctx = scripted_context(&launcher);

        let installed = get_install_local(
            &ctx,
            "http://x.org/tool-1.0.tar.gz",
            &ShellSteps::new(["make"]),
            None,
            None,
        )
        .await
        .unwrap();

        assert!(!installed);
        assert!(!launcher.saw("make"));
        assert!(!launcher.saw("&& mv "));
        assert!(launcher.commands().last().unwrap().starts_with("rm -rf /tmp/provision-"));
    }

    #[smol_potat::test]
    async fn test_get_install_local_quotes_install_root() {
        let launcher = ScriptedLauncher::new()
            .respond("echo $TMPDIR", 0, "/tmp\n")
            .respond("my tools/", 1, "")
            .respond("test -e", 0, "");
        let ctx = scripted_context(&launcher).with_local_install("/home/me/my tools");

        let installed = get_install_local(
            &ctx,
            "http://x.org/tool-1.0.tar.gz",
            &ShellSteps::new(["make"]),
            None,
            None,
        )
        .await
        .unwrap();

        assert!(installed);
        assert!(launcher.saw("test -e \"$(echo '/home/me/my tools/tool-1.0')\""));
        assert!(launcher.saw("&& mv tool-1.0 '/home/me/my tools'"));
    }
}
