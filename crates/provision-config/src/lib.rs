//! # Provision Configuration
//!
//! YAML configuration for a provisioning run.
//!
//! A `provision.yaml` file names the target machine, the privilege mode, the
//! distribution it runs and the install roots. Free-form `settings` become the
//! ambient layer that config-file templates are rendered against.

#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

pub mod parser;
pub mod resolver;

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse YAML
    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    /// A template placeholder has no value in any parameter layer
    #[error("No value for template placeholder: {0}")]
    MissingParameter(String),

    /// A `$` that does not start a valid placeholder
    #[error("Invalid placeholder at offset {offset}: {text}")]
    InvalidPlaceholder {
        /// Byte offset of the `$`
        offset: usize,
        /// The offending text
        text: String,
    },
}

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Configuration version
    pub version: String,

    /// The machine being provisioned
    #[serde(default)]
    pub target: TargetConfig,

    /// Route privileged commands through sudo
    #[serde(default = "default_use_sudo")]
    pub use_sudo: bool,

    /// Declared distribution of the target (ubuntu, debian, centos, scientificlinux)
    pub distribution: String,

    /// Release codename, e.g. `precise`; required for debian/ubuntu validation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dist_name: Option<String>,

    /// Edition short name; `minimal` skips codename validation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edition: Option<String>,

    /// Shared install prefix (affects all users)
    #[serde(default = "default_system_install")]
    pub system_install: String,

    /// Root for per-component local installs; may start with `~`
    #[serde(default = "default_local_install")]
    pub local_install: String,

    /// Data directory; may start with `~`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_files: Option<String>,

    /// Overrides the distribution profile's Java home
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub java_home: Option<String>,

    /// Extra pip executable to try
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pip_cmd: Option<String>,

    /// Preferred Python version suffix, e.g. `2.7`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub python_version_ext: Option<String>,

    /// Enable Nix packages (debian/ubuntu only)
    #[serde(default)]
    pub nixpkgs: bool,

    /// Directory for a local Python virtual environment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venv_directory: Option<String>,

    /// Local directory holding bundled config templates and data files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installed_files_dir: Option<PathBuf>,

    /// Base URL for resources missing from the bundled directory
    #[serde(default = "default_resource_url")]
    pub resource_url: String,

    /// Verify TLS certificates when downloading archives
    #[serde(default)]
    pub verify_tls: bool,

    /// Per-command timeout in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_timeout: Option<u64>,

    /// Replaces the distribution profile's package source list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_sources: Option<Vec<String>>,

    /// Free-form ambient settings, e.g. `nginx_conf_path`
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
}

/// Connection settings for the target machine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TargetConfig {
    /// `localhost`, `vagrant`, or `[user@]host[:port]`
    #[serde(default = "default_host")]
    pub host: String,

    /// SSH private key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_file: Option<PathBuf>,

    /// Extra arguments passed to ssh and scp
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ssh_options: Vec<String>,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            identity_file: None,
            ssh_options: Vec::new(),
        }
    }
}

impl TargetConfig {
    /// Whether the target is this machine
    pub fn is_local(&self) -> bool {
        self.host == "localhost"
    }

    /// Whether connection details come from `vagrant ssh-config`
    pub fn is_vagrant(&self) -> bool {
        self.host == "vagrant"
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_use_sudo() -> bool {
    true
}

fn default_system_install() -> String {
    "/usr".to_string()
}

fn default_local_install() -> String {
    "~/install".to_string()
}

fn default_resource_url() -> String {
    "https://raw.github.com/chapmanb/cloudbiolinux/master/".to_string()
}
