//! Launcher trait for executing commands in different contexts

use crate::command::Command;
use crate::error::Result;
use crate::process::ExitResult;
use async_trait::async_trait;
use std::path::Path;

/// A launcher that can execute commands in a specific context
///
/// Launchers compose: [`SshLauncher`](crate::backends::ssh::SshLauncher) and
/// [`SudoLauncher`](crate::backends::sudo::SudoLauncher) rewrite the incoming
/// command and hand it to an inner launcher, ending at
/// [`LocalLauncher`](crate::backends::local::LocalLauncher) which spawns it.
#[async_trait]
pub trait Launcher: Send + Sync + 'static {
    /// Run a command to completion, capturing stdout and stderr
    async fn execute(&self, command: Command) -> Result<ExitResult>;

    /// Make a local file available on the target and return its path there
    ///
    /// The returned flag is true when the staged copy is a new file the caller
    /// should remove once it has been consumed.
    async fn stage_file(&self, local: &Path) -> Result<(String, bool)>;

    /// Short description used in log lines
    fn description(&self) -> String;
}
