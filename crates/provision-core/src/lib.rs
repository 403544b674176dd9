//! Provision Core Library
//!
//! Install orchestration on top of a [`command_executor::CommandRouter`]. An
//! [`ExecutionContext`] carries the router together with the target's install
//! roots, distribution profile and settings; every operation here takes one.
//!
//! The building blocks:
//! - [`environment`]: turn an [`provision_config::EnvironmentConfig`] into a context
//! - [`guards`]: skip work that is already done
//! - [`fetch`]: download or check out sources and unpack them
//! - [`install`]: build pipelines in a throwaway work directory
//! - [`template`]: render config files from layered parameters
//! - [`java`] and [`python`]: language-specific installers

#![warn(missing_docs)]

pub mod context;
pub mod distribution;
pub mod environment;
pub mod error;
pub mod fetch;
pub mod guards;
pub mod install;
pub mod java;
pub mod python;
pub mod resources;
pub mod system;
pub mod template;
pub mod workdir;

pub use context::ExecutionContext;
pub use distribution::{Distribution, DistributionProfile};
pub use environment::{configure_context, setup_environment};
pub use error::{ProvisionError, Result};
pub use resources::ResourceStore;

/// Convenience prelude for installer code
pub mod prelude {
    pub use crate::context::ExecutionContext;
    pub use crate::error::{ProvisionError, Result};
    pub use crate::fetch::{fetch_and_unpack, FetchOptions};
    pub use crate::guards::{if_not_installed, if_not_python_lib, InstallCheck};
    pub use crate::install::{get_install, get_install_local, BuildStep, ConfigureMake, InstallSource};
    pub use crate::template::{render_config_file_template, setup_conf_file};
    pub use crate::workdir::with_work_dir;

    pub use async_trait::async_trait;
    pub use command_executor::{shell_escape, CommandRouter, RunOptions};
}
