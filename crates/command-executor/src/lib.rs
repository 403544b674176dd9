//! Runtime-agnostic command execution library
//!
//! This crate provides a unified interface for running shell commands on a
//! provisioning target: the local machine or a remote host over ssh, with or
//! without sudo. [`CommandRouter`] picks the launcher behind each operation
//! once, when the execution context is set up.

#![warn(missing_docs)]

pub mod backends;
pub mod command;
pub mod error;
pub mod launcher;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
pub mod process;
pub mod router;

pub use command::{shell_escape, Command};
pub use error::{Error, Result};
pub use launcher::Launcher;
pub use process::{ExitResult, ExitStatus, COMMAND_NOT_FOUND};
pub use router::{quote_path, CommandRouter, ConnectionMode, PrivilegeMode, RunOptions};
