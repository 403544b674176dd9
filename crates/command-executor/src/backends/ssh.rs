//! SSH remote execution backend using CLI

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::command::{shell_escape, Command};
use crate::error::{Error, Result};
use crate::launcher::Launcher;

/// Exit status the ssh client uses for its own errors (connection, auth)
const SSH_CLIENT_ERROR: i32 = 255;

/// SSH connection configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshConfig {
    /// Target host (hostname or IP)
    host: String,
    /// SSH user (optional, uses system default if not specified)
    user: Option<String>,
    /// SSH port (optional, defaults to 22)
    port: Option<u16>,
    /// Path to identity file (private key)
    identity_file: Option<PathBuf>,
    /// Additional SSH arguments
    extra_args: Vec<String>,
}

impl SshConfig {
    /// Create a new SSH configuration for the given host
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            user: None,
            port: None,
            identity_file: None,
            extra_args: Vec::new(),
        }
    }

    /// Parse `[user@]host[:port]`
    pub fn parse(target: &str) -> Self {
        let (user, rest) = match target.split_once('@') {
            Some((user, rest)) => (Some(user.to_string()), rest),
            None => (None, target),
        };
        let (host, port) = match rest.rsplit_once(':') {
            Some((host, port)) => match port.parse::<u16>() {
                Ok(port) => (host, Some(port)),
                Err(_) => (rest, None),
            },
            None => (rest, None),
        };
        Self {
            host: host.to_string(),
            user,
            port,
            identity_file: None,
            extra_args: Vec::new(),
        }
    }

    /// Set the SSH user
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Set the SSH port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the identity file (private key)
    pub fn with_identity_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.identity_file = Some(path.into());
        self
    }

    /// Add extra SSH arguments
    pub fn with_extra_arg(mut self, arg: impl Into<String>) -> Self {
        self.extra_args.push(arg.into());
        self
    }

    /// The bare host name
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The login user, if one was given
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// The port, if one was given
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Get the host string (user@host if user is specified)
    pub fn host_string(&self) -> String {
        if let Some(user) = &self.user {
            format!("{}@{}", user, self.host)
        } else {
            self.host.clone()
        }
    }

    /// Identity and extra options shared by ssh and scp
    fn common_args(&self, cmd: &mut Command) {
        if let Some(identity) = &self.identity_file {
            cmd.arg("-i").arg(identity);
        }
        for arg in &self.extra_args {
            cmd.arg(arg);
        }
    }
}

/// SSH launcher that wraps another launcher for remote execution
#[derive(Debug, Clone)]
pub struct SshLauncher<L> {
    inner: L,
    config: SshConfig,
}

impl<L> SshLauncher<L> {
    /// Create a new SSH launcher wrapping the given inner launcher
    pub fn new(inner: L, config: SshConfig) -> Self {
        Self { inner, config }
    }

    /// The connection settings
    pub fn config(&self) -> &SshConfig {
        &self.config
    }
}

impl SshLauncher<crate::backends::local::LocalLauncher> {
    /// Convenience constructor for SSH wrapping LocalLauncher
    pub fn to_host(host: impl Into<String>) -> Self {
        Self {
            inner: crate::backends::local::LocalLauncher::new(),
            config: SshConfig::new(host),
        }
    }
}

#[async_trait]
impl<L> Launcher for SshLauncher<L>
where
    L: Launcher,
{
    async fn execute(&self, command: Command) -> Result<crate::process::ExitResult> {
        let mut ssh_cmd = Command::new("ssh");
        if let Some(port) = self.config.port {
            ssh_cmd.arg("-p").arg(port.to_string());
        }
        self.config.common_args(&mut ssh_cmd);
        ssh_cmd.arg(self.config.host_string());
        ssh_cmd.arg(format_remote_command(&command));

        let result = self
            .inner
            .execute(ssh_cmd)
            .await
            .map_err(|e| e.with_layer_context("Ssh"))?;

        if result.code() == Some(SSH_CLIENT_ERROR) {
            return Err(Error::SshConnectionFailed {
                host: self.config.host_string(),
                reason: result.stderr.trim().to_string(),
            });
        }
        Ok(result)
    }

    async fn stage_file(&self, local: &Path) -> Result<(String, bool)> {
        let remote_path = format!("/tmp/provision-upload-{}", uuid::Uuid::new_v4().simple());

        let mut scp_cmd = Command::new("scp");
        scp_cmd.arg("-q");
        if let Some(port) = self.config.port {
            scp_cmd.arg("-P").arg(port.to_string());
        }
        self.config.common_args(&mut scp_cmd);
        scp_cmd.arg(local);
        scp_cmd.arg(format!("{}:{}", self.config.host_string(), remote_path));

        debug!("uploading {} to {}:{}", local.display(), self.config.host_string(), remote_path);
        let result = self.inner.execute(scp_cmd).await?;
        if result.failed() {
            return Err(Error::UploadFailed {
                source_path: local.display().to_string(),
                destination: remote_path,
                reason: result.stderr.trim().to_string(),
            });
        }
        Ok((remote_path, true))
    }

    fn description(&self) -> String {
        format!("ssh({})", self.config.host_string())
    }
}

/// Format a command for remote execution via SSH
///
/// The remote side receives a single string that its login shell parses, so
/// every argument is escaped; working directory and environment become a
/// `cd` and variable assignments in front of the program.
fn format_remote_command(cmd: &Command) -> String {
    let mut parts = Vec::new();

    if let Some(dir) = cmd.get_current_dir() {
        parts.push(format!("cd {} &&", shell_escape(&dir.to_string_lossy())));
    }

    let mut envs: Vec<_> = cmd.get_envs().iter().collect();
    envs.sort();
    for (key, value) in envs {
        parts.push(format!(
            "{}={}",
            key.to_string_lossy(),
            shell_escape(&value.to_string_lossy())
        ));
    }

    parts.push(cmd.get_program().to_string_lossy().into_owned());
    parts.extend(
        cmd.get_args()
            .iter()
            .map(|arg| shell_escape(&arg.to_string_lossy())),
    );
    parts.join(" ")
}
