//! Sudo launcher for privilege escalation
//!
//! # Limitations
//!
//! This launcher does NOT handle sudo password prompts. Commands run with a
//! null stdin, so sudo must be configured with NOPASSWD or have cached
//! credentials (or be able to prompt on the controlling terminal when running
//! locally). Output of privileged commands is captured like any other.
//!
//! # Example
//!
//! ```no_run
//! use command_executor::{Command, Launcher};
//! use command_executor::backends::{local::LocalLauncher, sudo::SudoLauncher};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let launcher = SudoLauncher::new(LocalLauncher::new());
//!
//! // This will run: sudo sh -c 'make install'
//! let result = launcher.execute(Command::shell("make install")).await?;
//! assert!(result.succeeded());
//! # Ok(())
//! # }
//! ```

use crate::{error::Result, launcher::Launcher, process::ExitResult, Command};
use async_trait::async_trait;
use std::path::Path;

/// Launcher that wraps another launcher to execute commands with sudo
#[derive(Debug, Clone)]
pub struct SudoLauncher<L> {
    inner: L,
}

impl<L> SudoLauncher<L> {
    /// Create a new sudo launcher wrapping the given launcher
    pub fn new(inner: L) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<L> Launcher for SudoLauncher<L>
where
    L: Launcher,
{
    async fn execute(&self, command: Command) -> Result<ExitResult> {
        let mut builder = Command::builder("sudo")
            .arg(command.get_program())
            .args(command.get_args());

        for (key, val) in command.get_envs() {
            builder = builder.env(key, val);
        }
        if let Some(dir) = command.get_current_dir() {
            builder = builder.current_dir(dir);
        }

        self.inner
            .execute(builder.build())
            .await
            .map_err(|e| e.with_layer_context("Sudo"))
    }

    async fn stage_file(&self, local: &Path) -> Result<(String, bool)> {
        self.inner.stage_file(local).await
    }

    fn description(&self) -> String {
        format!("sudo({})", self.inner.description())
    }
}
