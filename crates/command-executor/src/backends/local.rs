//! Local process execution backend

use async_io::Timer;
use async_process::Stdio;
use async_trait::async_trait;
use futures_lite::future;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::trace;

use crate::command::Command;
use crate::error::{Error, Result};
use crate::launcher::Launcher;
use crate::process::{ExitResult, ExitStatus};

/// Launcher for executing processes locally
///
/// Every command gets a null stdin and captured stdout/stderr. An optional
/// timeout kills the child when it expires; without one a hung command blocks
/// its caller indefinitely.
#[derive(Debug, Clone, Default)]
pub struct LocalLauncher {
    /// Environment applied to every command unless the command sets the key itself
    env: HashMap<String, String>,
    /// Per-command timeout
    timeout: Option<Duration>,
}

impl LocalLauncher {
    /// Create a launcher with no extra environment and no timeout
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an environment variable for every command this launcher spawns
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Kill commands that run longer than `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The configured per-command timeout
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

#[async_trait]
impl Launcher for LocalLauncher {
    async fn execute(&self, command: Command) -> Result<ExitResult> {
        let mut async_cmd = command.prepare();
        for (key, value) in &self.env {
            if !command.get_envs().contains_key(std::ffi::OsStr::new(key)) {
                async_cmd.env(key, value);
            }
        }
        async_cmd
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        trace!("spawning locally: {}", command.display());

        let child = async_cmd
            .spawn()
            .map_err(|e| Error::spawn_failed(format!("{}: {}", command.display(), e)))?;

        let output = match self.timeout {
            Some(timeout) => {
                let run = async move { child.output().await.map(Some) };
                let expire = async move {
                    Timer::after(timeout).await;
                    Ok::<Option<std::process::Output>, std::io::Error>(None)
                };
                match future::or(run, expire).await? {
                    Some(output) => output,
                    None => {
                        return Err(Error::Timeout {
                            command: command.display(),
                            timeout,
                        });
                    }
                }
            }
            None => child.output().await?,
        };

        Ok(ExitResult {
            status: ExitStatus::from(output.status),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    async fn stage_file(&self, local: &Path) -> Result<(String, bool)> {
        Ok((local.to_string_lossy().into_owned(), false))
    }

    fn description(&self) -> String {
        "local".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[smol_potat::test]
    async fn test_captures_stdout_and_code() {
        let launcher = LocalLauncher::new();
        let result = launcher
            .execute(Command::shell("echo hello; exit 3"))
            .await
            .unwrap();
        assert_eq!(result.trimmed(), "hello");
        assert_eq!(result.code(), Some(3));
    }

    #[smol_potat::test]
    async fn test_missing_command_reports_127() {
        let launcher = LocalLauncher::new();
        let result = launcher
            .execute(Command::shell("this_command_does_not_exist_12345"))
            .await
            .unwrap();
        assert_eq!(result.code(), Some(crate::process::COMMAND_NOT_FOUND));
    }

    #[smol_potat::test]
    async fn test_launcher_env_does_not_override_command_env() {
        let launcher = LocalLauncher::new()
            .with_env("GREETING", "launcher")
            .with_env("OTHER", "set");
        let cmd = Command::builder("sh")
            .arg("-c")
            .arg("echo $GREETING-$OTHER")
            .env("GREETING", "command")
            .build();
        let result = launcher.execute(cmd).await.unwrap();
        assert_eq!(result.trimmed(), "command-set");
    }

    #[smol_potat::test]
    async fn test_timeout_kills_command() {
        let launcher = LocalLauncher::new().with_timeout(Duration::from_millis(200));
        let err = launcher
            .execute(Command::shell("sleep 5"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));
    }

    #[smol_potat::test]
    async fn test_spawn_failure_for_missing_program() {
        let launcher = LocalLauncher::new();
        let err = launcher
            .execute(Command::new("this_program_does_not_exist_99999"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SpawnFailed { .. }));
    }
}
