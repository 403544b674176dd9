//! Error types for provisioning operations

use thiserror::Error;

/// Result type alias for provisioning operations
pub type Result<T> = std::result::Result<T, ProvisionError>;

/// Everything that can abort an install step
#[derive(Error, Debug)]
pub enum ProvisionError {
    /// A command failed, timed out or could not reach the target
    #[error(transparent)]
    Command(#[from] command_executor::Error),

    /// Configuration or template resolution error
    #[error(transparent)]
    Config(#[from] provision_config::ConfigError),

    /// The archive name has no known extraction command
    #[error("Did not find extract command for {url}")]
    NoExtractCommand {
        /// The locator that was being unpacked
        url: String,
    },

    /// No unique directory matched after unpacking
    #[error("Could not find directory {dir_name}")]
    DirectoryNotFound {
        /// The expected directory name
        dir_name: String,
    },

    /// A revision was requested for a VCS that only supports plain checkout
    #[error("Revision checkout is not implemented for {vcs}")]
    UnsupportedRevision {
        /// The VCS command name, e.g. `svn`
        vcs: String,
    },

    /// The target machine is not running the declared distribution
    #[error("Distribution does not match machine; expected {expected}, found: {found}")]
    DistributionMismatch {
        /// Declared distribution or codename
        expected: String,
        /// What the target reported
        found: String,
    },

    /// debian/ubuntu validation needs a codename
    #[error("Must specify a dist_name property when working with distribution {0}")]
    MissingDistName(String),

    /// Distribution name with no profile
    #[error("Unexpected distribution {0}")]
    UnknownDistribution(String),

    /// No interpreter candidate answered `--version`
    #[error("Could not find python interpreter from: {}", tried.join(", "))]
    NoPythonInterpreter {
        /// Candidates probed, in order
        tried: Vec<String>,
    },

    /// No pip candidate answered `--version`
    #[error("Could not find pip installer from: {}", tried.join(", "))]
    NoPackageManager {
        /// Candidates probed, in order
        tried: Vec<String>,
    },

    /// `vagrant ssh-config` output was incomplete
    #[error("Invalid vagrant ssh-config output: {0}")]
    VagrantConfig(String),

    /// A bundled resource could not be found or fetched
    #[error("Resource {name} unavailable: {reason}")]
    Resource {
        /// Resource path relative to the store
        name: String,
        /// Why it could not be loaded
        reason: String,
    },

    /// HTTP error while fetching a remote resource
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProvisionError {
    /// Create a resource error
    pub fn resource(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Resource {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error came from an unresolvable name, extension or candidate list
    pub fn is_resolution_failure(&self) -> bool {
        matches!(
            self,
            Self::NoExtractCommand { .. }
                | Self::DirectoryNotFound { .. }
                | Self::NoPythonInterpreter { .. }
                | Self::NoPackageManager { .. }
        )
    }
}
