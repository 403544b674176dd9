//! Backend implementations for different execution contexts
//!
//! [`LocalLauncher`] spawns processes on this machine. [`SudoLauncher`] and
//! (with the `ssh` feature) [`SshLauncher`] wrap another launcher and rewrite
//! each command before delegating, so remote privileged execution is
//! `SudoLauncher<SshLauncher<LocalLauncher>>`.

pub mod local;
pub use local::LocalLauncher;

pub mod sudo;
pub use sudo::SudoLauncher;

#[cfg(feature = "ssh")]
pub mod ssh;
#[cfg(feature = "ssh")]
pub use ssh::{SshConfig, SshLauncher};
