//! Command routing: which launcher backs `run`, `sudo` and `exists`
//!
//! A [`CommandRouter`] is built once from the connection and privilege modes
//! and then shared by everything that touches the target:
//!
//! | connection | privilege | run    | sudo               | exists          |
//! |------------|-----------|--------|--------------------|-----------------|
//! | remote     | sudo      | ssh    | sudo over ssh      | `test -e` (ssh) |
//! | remote     | direct    | ssh    | ssh                | `test -e` (ssh) |
//! | local      | sudo      | local  | sudo (local)       | `test -e` (local)|
//! | local      | direct    | local  | local              | `test -e` (local)|
//!
//! Routers are cheap to clone. [`CommandRouter::within`] and
//! [`CommandRouter::with_prefix`] return scoped copies whose commands run in a
//! directory or behind a setup command.

use std::io::Write;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::backends::local::LocalLauncher;
use crate::backends::sudo::SudoLauncher;
use crate::command::{shell_escape, Command};
use crate::error::{Error, Result};
use crate::launcher::Launcher;
use crate::process::ExitResult;

/// Where commands run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionMode {
    /// On this machine
    Local,
    /// On a remote host over ssh
    #[cfg(feature = "ssh")]
    Remote(crate::backends::ssh::SshConfig),
}

/// How privileged commands run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivilegeMode {
    /// Privileged commands go through sudo
    Sudo,
    /// Privileged commands run as the connecting user
    Direct,
}

/// How a single command's failure and output are treated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// A non-zero exit is returned to the caller instead of raised
    pub warn_only: bool,
    /// Routine output: logged at trace level only
    pub quiet: bool,
}

impl RunOptions {
    /// Failures raise [`Error::CommandFailed`]
    pub fn fatal() -> Self {
        Self::default()
    }

    /// Failures are returned to the caller
    pub fn warn_only() -> Self {
        Self {
            warn_only: true,
            quiet: false,
        }
    }

    /// Silent and non-fatal, for probes whose exit status is the answer
    pub fn probe() -> Self {
        Self {
            warn_only: true,
            quiet: true,
        }
    }
}

/// Resolves abstract operations to the launcher selected for this target
#[derive(Clone)]
pub struct CommandRouter {
    run: Arc<dyn Launcher>,
    sudo: Arc<dyn Launcher>,
    remote: bool,
    privilege: PrivilegeMode,
    cwd: Option<String>,
    prefixes: Vec<String>,
}

impl std::fmt::Debug for CommandRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRouter")
            .field("run", &self.run.description())
            .field("sudo", &self.sudo.description())
            .field("cwd", &self.cwd)
            .field("prefixes", &self.prefixes)
            .finish()
    }
}

impl CommandRouter {
    /// Build a router from explicit launchers
    pub fn new(run: Arc<dyn Launcher>, sudo: Arc<dyn Launcher>, privilege: PrivilegeMode) -> Self {
        Self {
            run,
            sudo,
            remote: false,
            privilege,
            cwd: None,
            prefixes: Vec::new(),
        }
    }

    /// Build the router for a connection and privilege mode on top of `base`
    pub fn for_target(
        connection: &ConnectionMode,
        privilege: PrivilegeMode,
        base: LocalLauncher,
    ) -> Self {
        match connection {
            ConnectionMode::Local => {
                let run: Arc<dyn Launcher> = Arc::new(base.clone());
                let sudo: Arc<dyn Launcher> = match privilege {
                    PrivilegeMode::Sudo => Arc::new(SudoLauncher::new(base)),
                    PrivilegeMode::Direct => run.clone(),
                };
                Self::new(run, sudo, privilege)
            }
            #[cfg(feature = "ssh")]
            ConnectionMode::Remote(config) => {
                use crate::backends::ssh::SshLauncher;
                let ssh = SshLauncher::new(base, config.clone());
                let run: Arc<dyn Launcher> = Arc::new(ssh.clone());
                let sudo: Arc<dyn Launcher> = match privilege {
                    PrivilegeMode::Sudo => Arc::new(SudoLauncher::new(ssh)),
                    PrivilegeMode::Direct => run.clone(),
                };
                let mut router = Self::new(run, sudo, privilege);
                router.remote = true;
                router
            }
        }
    }

    /// Whether commands run on a remote host
    pub fn is_remote(&self) -> bool {
        self.remote
    }

    /// Whether privileged commands go through sudo
    pub fn uses_sudo(&self) -> bool {
        self.privilege == PrivilegeMode::Sudo
    }

    /// Description of the launcher backing `run`
    pub fn run_description(&self) -> String {
        self.run.description()
    }

    /// Description of the launcher backing `sudo`
    pub fn sudo_description(&self) -> String {
        self.sudo.description()
    }

    /// The directory commands currently run in, if scoped
    pub fn cwd(&self) -> Option<&str> {
        self.cwd.as_deref()
    }

    /// A copy whose commands run inside `dir`
    ///
    /// Relative directories nest under the current one.
    pub fn within(&self, dir: impl AsRef<str>) -> Self {
        let dir = dir.as_ref().trim_end_matches('/');
        let cwd = match &self.cwd {
            Some(current) if !dir.starts_with('/') && !dir.starts_with('~') && !dir.starts_with('$') => {
                format!("{}/{}", current, dir)
            }
            _ => dir.to_string(),
        };
        let mut scoped = self.clone();
        scoped.cwd = Some(cwd);
        scoped
    }

    /// A copy whose commands run after `prefix` succeeds
    pub fn with_prefix(&self, prefix: impl Into<String>) -> Self {
        let mut scoped = self.clone();
        scoped.prefixes.push(prefix.into());
        scoped
    }

    /// The full shell script sent for `cmd` in this scope
    pub fn script_for(&self, cmd: &str) -> String {
        let mut parts = Vec::with_capacity(self.prefixes.len() + 2);
        if let Some(cwd) = &self.cwd {
            parts.push(format!("cd {}", quote_path(cwd)));
        }
        parts.extend(self.prefixes.iter().cloned());
        parts.push(cmd.to_string());
        parts.join(" && ")
    }

    /// Run `cmd`; a non-zero exit is an error
    pub async fn run(&self, cmd: &str) -> Result<ExitResult> {
        self.run_with(cmd, RunOptions::fatal()).await
    }

    /// Run `cmd` with explicit failure/output handling
    pub async fn run_with(&self, cmd: &str, options: RunOptions) -> Result<ExitResult> {
        self.dispatch(self.run.as_ref(), "run", cmd, options).await
    }

    /// Run `cmd` with privileges when the context uses sudo
    pub async fn sudo(&self, cmd: &str) -> Result<ExitResult> {
        self.sudo_with(cmd, RunOptions::fatal()).await
    }

    /// Privileged run with explicit failure/output handling
    pub async fn sudo_with(&self, cmd: &str, options: RunOptions) -> Result<ExitResult> {
        self.dispatch(self.sudo.as_ref(), "sudo", cmd, options).await
    }

    /// Whether `path` exists on the target
    ///
    /// The path goes through `echo` first so a leading `$HOME` or `~`
    /// expands the way it would in a command; the rest is quoted. Only
    /// connectivity problems are errors.
    pub async fn exists(&self, path: &str) -> Result<bool> {
        let probe = format!("test -e \"$(echo {})\"", quote_path(path));
        let result = self.run_with(&probe, RunOptions::probe()).await?;
        Ok(result.succeeded())
    }

    /// Write `contents` to `dest` on the target with POSIX `mode`
    ///
    /// The file is staged through a local temporary file, copied to the
    /// target and installed through the privileged route.
    pub async fn put_file(&self, contents: &[u8], dest: &str, mode: u32) -> Result<()> {
        let mut staging = tempfile::NamedTempFile::new()?;
        staging.write_all(contents)?;
        staging.flush()?;

        let (staged, remove_after) = self.run.stage_file(staging.path()).await?;
        let install = format!(
            "cp {staged} {dest} && chmod {mode:o} {dest}",
            staged = shell_escape(&staged),
            dest = quote_path(dest),
            mode = mode
        );
        let installed = self.sudo(&install).await;

        if remove_after {
            let cleanup = format!("rm -f {}", shell_escape(&staged));
            self.dispatch(self.run.as_ref(), "run", &cleanup, RunOptions::probe())
                .await?;
        }
        installed.map(|_| ())
    }

    async fn dispatch(
        &self,
        launcher: &dyn Launcher,
        op: &str,
        cmd: &str,
        options: RunOptions,
    ) -> Result<ExitResult> {
        let script = self.script_for(cmd);
        if options.quiet {
            trace!("[{}] {}: {}", launcher.description(), op, script);
        } else {
            debug!("[{}] {}: {}", launcher.description(), op, script);
        }

        let result = launcher.execute(Command::shell(&script)).await?;

        if result.failed() && !options.warn_only {
            return Err(Error::CommandFailed {
                command: script,
                code: result.code(),
                stderr: result.stderr.trim().to_string(),
            });
        }
        Ok(result)
    }
}

/// Quote a path for the shell, leaving a leading `~` or `$VAR` expandable
pub fn quote_path(path: &str) -> String {
    if path.starts_with('~') || path.starts_with('$') {
        match path.split_once('/') {
            Some((head, rest)) => format!("{}/{}", head, shell_escape(rest)),
            None => path.to_string(),
        }
    } else {
        shell_escape(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_routing_table() {
        let router =
            CommandRouter::for_target(&ConnectionMode::Local, PrivilegeMode::Sudo, LocalLauncher::new());
        assert_eq!(router.run_description(), "local");
        assert_eq!(router.sudo_description(), "sudo(local)");
        assert!(!router.is_remote());
        assert!(router.uses_sudo());

        let router = CommandRouter::for_target(
            &ConnectionMode::Local,
            PrivilegeMode::Direct,
            LocalLauncher::new(),
        );
        assert_eq!(router.run_description(), "local");
        assert_eq!(router.sudo_description(), "local");
        assert!(!router.uses_sudo());
    }

    #[cfg(feature = "ssh")]
    #[test]
    fn test_remote_routing_table() {
        use crate::backends::ssh::SshConfig;

        let remote = ConnectionMode::Remote(SshConfig::parse("ubuntu@build-box"));
        let router = CommandRouter::for_target(&remote, PrivilegeMode::Sudo, LocalLauncher::new());
        assert_eq!(router.run_description(), "ssh(ubuntu@build-box)");
        assert_eq!(router.sudo_description(), "sudo(ssh(ubuntu@build-box))");
        assert!(router.is_remote());

        let router = CommandRouter::for_target(&remote, PrivilegeMode::Direct, LocalLauncher::new());
        assert_eq!(router.sudo_description(), "ssh(ubuntu@build-box)");
    }

    #[test]
    fn test_scoped_scripts() {
        let router = CommandRouter::for_target(
            &ConnectionMode::Local,
            PrivilegeMode::Direct,
            LocalLauncher::new(),
        );
        assert_eq!(router.script_for("make"), "make");

        let scoped = router.within("/tmp/work").within("pkg-1.0/");
        assert_eq!(scoped.cwd(), Some("/tmp/work/pkg-1.0"));
        assert_eq!(scoped.script_for("make"), "cd /tmp/work/pkg-1.0 && make");

        let prefixed = scoped.with_prefix(". $HOME/.venvburrito/startup.sh");
        assert_eq!(
            prefixed.script_for("mkvirtualenv env"),
            "cd /tmp/work/pkg-1.0 && . $HOME/.venvburrito/startup.sh && mkvirtualenv env"
        );

        let absolute = scoped.within("/opt");
        assert_eq!(absolute.cwd(), Some("/opt"));
    }

    #[test]
    fn test_quote_path_keeps_home_expandable() {
        assert_eq!(quote_path("~/install"), "~/install");
        assert_eq!(quote_path("$HOME/my dir"), "$HOME/'my dir'");
        assert_eq!(quote_path("/usr/local"), "/usr/local");
    }

    #[smol_potat::test]
    async fn test_fatal_run_raises_command_failed() {
        let router = CommandRouter::for_target(
            &ConnectionMode::Local,
            PrivilegeMode::Direct,
            LocalLauncher::new(),
        );
        let err = router.run("exit 2").await.unwrap_err();
        assert!(matches!(err, Error::CommandFailed { code: Some(2), .. }));

        let result = router.run_with("exit 2", RunOptions::warn_only()).await.unwrap();
        assert_eq!(result.code(), Some(2));
    }

    #[smol_potat::test]
    async fn test_exists_and_put_file_locally() {
        let dir = tempfile::tempdir().unwrap();
        let router = CommandRouter::for_target(
            &ConnectionMode::Local,
            PrivilegeMode::Direct,
            LocalLauncher::new(),
        );
        let dest = dir.path().join("app.conf");
        let dest = dest.to_str().unwrap();

        assert!(!router.exists(dest).await.unwrap());
        router.put_file(b"listen 80;\n", dest, 0o644).await.unwrap();
        assert!(router.exists(dest).await.unwrap());
        assert_eq!(std::fs::read_to_string(dest).unwrap(), "listen 80;\n");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(dest).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o644);
        }
    }
}
