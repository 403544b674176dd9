//! Idempotency guards
//!
//! A guard is a read-only probe deciding whether an install action still
//! needs to run. Probes run quietly and non-fatally: only their exit status
//! matters, and only a failure to reach the target is an error.

use command_executor::{shell_escape, RunOptions, COMMAND_NOT_FOUND};
use std::collections::HashSet;
use std::future::Future;
use tracing::{debug, info};

use crate::context::ExecutionContext;
use crate::error::{ProvisionError, Result};
use crate::python::python_cmd;

/// How to decide whether a tool is already installed
#[derive(Debug, Clone, Copy)]
pub enum InstallCheck<'a> {
    /// Probe for an executable on `PATH` plus `<system_install>/bin`
    OnPath(&'a str),
    /// The tool manages its own prefix; installed iff `<install_path>/env.sh` exists
    ManagedTool {
        /// Prefix the tool installs into
        install_path: &'a str,
    },
    /// The host keeps its own record of installed tools
    HostManaged {
        /// Tool name
        name: &'a str,
        /// Names the host reports as installed
        markers: &'a HashSet<String>,
    },
}

/// Whether `name` cannot be run on the target
///
/// Exit status 127 means the shell could not find it. Any other status,
/// including a failure of the tool itself, means it is installed. The probe
/// folds every other status into 0 so a tool exiting 255 is not mistaken
/// for an ssh failure.
pub async fn executable_not_on_path(ctx: &ExecutionContext, name: &str) -> Result<bool> {
    let probe = format!(
        "export PATH=$PATH:{}/bin && {}; [ $? -ne {code} ] || exit {code}",
        ctx.system_install(),
        name,
        code = COMMAND_NOT_FOUND
    );
    let result = ctx.router().run_with(&probe, RunOptions::probe()).await?;
    Ok(result.code() == Some(COMMAND_NOT_FOUND))
}

/// Whether the check finds the tool missing
pub async fn needs_install(ctx: &ExecutionContext, check: InstallCheck<'_>) -> Result<bool> {
    match check {
        InstallCheck::OnPath(name) => executable_not_on_path(ctx, name).await,
        InstallCheck::ManagedTool { install_path } => {
            let marker = format!("{}/env.sh", install_path.trim_end_matches('/'));
            Ok(!ctx.router().exists(&marker).await?)
        }
        InstallCheck::HostManaged { name, markers } => Ok(!markers.contains(name)),
    }
}

/// Whether `library` fails to import with the configured interpreter
///
/// With no interpreter at all the library counts as missing.
pub async fn python_lib_missing(ctx: &ExecutionContext, library: &str) -> Result<bool> {
    let python = match python_cmd(ctx).await {
        Ok(python) => python,
        Err(ProvisionError::NoPythonInterpreter { tried }) => {
            debug!("no python among {}, {} counts as missing", tried.join(", "), library);
            return Ok(true);
        }
        Err(e) => return Err(e),
    };
    let probe = format!("{} -c {}", python, shell_escape(&format!("import {}", library)));
    let result = ctx.router().run_with(&probe, RunOptions::probe()).await?;
    Ok(result.failed())
}

/// Run `action` only if `check` finds the tool missing
///
/// Returns `None` when the action was skipped.
pub async fn if_not_installed<F, Fut, T>(
    ctx: &ExecutionContext,
    check: InstallCheck<'_>,
    action: F,
) -> Result<Option<T>>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    if needs_install(ctx, check).await? {
        action().await.map(Some)
    } else {
        info!("{} already installed, skipping", describe(check));
        Ok(None)
    }
}

/// Run `action` only if `library` cannot be imported
pub async fn if_not_python_lib<F, Fut, T>(
    ctx: &ExecutionContext,
    library: &str,
    action: F,
) -> Result<Option<T>>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    if python_lib_missing(ctx, library).await? {
        action().await.map(Some)
    } else {
        debug!("python library {} already importable", library);
        Ok(None)
    }
}

fn describe(check: InstallCheck<'_>) -> String {
    match check {
        InstallCheck::OnPath(name) => name.to_string(),
        InstallCheck::ManagedTool { install_path } => install_path.to_string(),
        InstallCheck::HostManaged { name, .. } => name.to_string(),
    }
}
