//! Distribution profiles and target validation
//!
//! A profile bundles the per-distribution defaults everything downstream
//! depends on: package sources, interpreter suffixes, the pip executable and
//! where the JDK lives. Exactly one profile is active per execution context.

use command_executor::{CommandRouter, RunOptions};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

use crate::error::{ProvisionError, Result};

/// A supported Linux distribution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Distribution {
    /// Ubuntu
    Ubuntu,
    /// Debian
    Debian,
    /// CentOS
    CentOs,
    /// Scientific Linux
    ScientificLinux,
}

impl Distribution {
    /// Lowercase name as used in configuration
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ubuntu => "ubuntu",
            Self::Debian => "debian",
            Self::CentOs => "centos",
            Self::ScientificLinux => "scientificlinux",
        }
    }

    /// Whether this is debian or a derivative of it
    pub fn is_debian_family(&self) -> bool {
        matches!(self, Self::Ubuntu | Self::Debian)
    }
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Distribution {
    type Err = ProvisionError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ubuntu" => Ok(Self::Ubuntu),
            "debian" => Ok(Self::Debian),
            "centos" => Ok(Self::CentOs),
            "scientificlinux" => Ok(Self::ScientificLinux),
            other => Err(ProvisionError::UnknownDistribution(other.to_string())),
        }
    }
}

const DEFAULT_DEB_JAVA_HOME: &str = "/usr/lib/jvm/java-6-openjdk";
const DEFAULT_RPM_JAVA_HOME: &str = "/etc/alternatives/java_sdk";

const DEB_SHARED_SOURCES: &[&str] = &[
    "deb http://nebc.nerc.ac.uk/bio-linux/ unstable bio-linux",
    "deb http://download.virtualbox.org/virtualbox/debian %s contrib",
];

const UBUNTU_SOURCES: &[&str] = &[
    "deb http://us.archive.ubuntu.com/ubuntu/ %s universe",
    "deb http://us.archive.ubuntu.com/ubuntu/ %s multiverse",
    "deb http://us.archive.ubuntu.com/ubuntu/ %s-updates universe",
    "deb http://us.archive.ubuntu.com/ubuntu/ %s-updates multiverse",
    "deb http://archive.canonical.com/ubuntu %s partner",
    "deb http://downloads-distro.mongodb.org/repo/ubuntu-upstart dist 10gen",
    "deb http://watson.nci.nih.gov/cran_mirror/bin/linux/ubuntu %s/",
    "deb http://archive.cloudera.com/debian maverick-cdh3 contrib",
    "deb http://archive.canonical.com/ubuntu %s partner",
    "deb http://ppa.launchpad.net/freenx-team/ppa/ubuntu precise main",
    "deb http://ppa.launchpad.net/nebc/bio-linux/ubuntu precise main",
];

const DEBIAN_SOURCES: &[&str] = &[
    "deb http://downloads-distro.mongodb.org/repo/debian-sysvinit dist 10gen",
    "deb http://watson.nci.nih.gov/cran_mirror/bin/linux/debian %s-cran/",
    "deb http://archive.cloudera.com/debian lenny-cdh3 contrib",
];

/// Per-distribution defaults
#[derive(Debug, Clone, PartialEq)]
pub struct DistributionProfile {
    /// Which distribution this profile describes
    pub distribution: Distribution,
    /// Package source lines with the release codename filled in
    pub sources: Vec<String>,
    /// apt source list written by installers
    pub sources_file: Option<String>,
    /// System-wide apt source list
    pub global_sources_file: Option<String>,
    /// apt pinning preferences
    pub apt_preferences_file: Option<String>,
    /// Suffix of the preferred python executable, e.g. `2.6`
    pub python_version_ext: Option<String>,
    /// Suffix of the preferred ruby executable
    pub ruby_version_ext: Option<String>,
    /// Distribution-specific pip executable
    pub pip_cmd: Option<String>,
    /// JDK location
    pub java_home: String,
}

impl DistributionProfile {
    /// Build the profile for `distribution`
    ///
    /// `dist_name` fills the `%s` slots of versioned source lines; without it
    /// those lines are left out. `java_home` overrides the profile default.
    pub fn new(distribution: Distribution, dist_name: Option<&str>, java_home: Option<&str>) -> Self {
        info!("{} setup", distribution);
        let mut profile = match distribution {
            Distribution::Ubuntu => {
                let sources: Vec<&str> = UBUNTU_SOURCES.iter().chain(DEB_SHARED_SOURCES).copied().collect();
                Self::debian_family(distribution, sources_for(dist_name, &sources))
            }
            Distribution::Debian => {
                // Unstable has no versioned mirrors of its own
                let dist_name = dist_name.map(|name| if name == "sid" { "squeeze" } else { name });
                let sources: Vec<&str> = DEBIAN_SOURCES.iter().chain(DEB_SHARED_SOURCES).copied().collect();
                Self::debian_family(distribution, sources_for(dist_name, &sources))
            }
            Distribution::CentOs => Self {
                distribution,
                sources: Vec::new(),
                sources_file: None,
                global_sources_file: None,
                apt_preferences_file: None,
                python_version_ext: Some("2.6".to_string()),
                ruby_version_ext: None,
                pip_cmd: Some("pip-python".to_string()),
                java_home: DEFAULT_RPM_JAVA_HOME.to_string(),
            },
            Distribution::ScientificLinux => Self {
                distribution,
                sources: Vec::new(),
                sources_file: None,
                global_sources_file: None,
                apt_preferences_file: None,
                python_version_ext: None,
                ruby_version_ext: None,
                pip_cmd: Some("pip-python".to_string()),
                java_home: DEFAULT_RPM_JAVA_HOME.to_string(),
            },
        };
        if let Some(java_home) = java_home {
            profile.java_home = java_home.to_string();
        }
        profile
    }

    fn debian_family(distribution: Distribution, sources: Vec<String>) -> Self {
        debug!("Debian-shared setup");
        Self {
            distribution,
            sources,
            sources_file: Some("/etc/apt/sources.list.d/cloudbiolinux.list".to_string()),
            global_sources_file: Some("/etc/apt/sources.list".to_string()),
            apt_preferences_file: Some("/etc/apt/preferences".to_string()),
            python_version_ext: None,
            ruby_version_ext: Some("1.9.1".to_string()),
            pip_cmd: None,
            java_home: DEFAULT_DEB_JAVA_HOME.to_string(),
        }
    }
}

fn sources_for(dist_name: Option<&str>, sources: &[&str]) -> Vec<String> {
    match dist_name {
        Some(name) => add_source_versions(name, sources),
        None => {
            debug!("No dist_name, skipping versioned package sources");
            sources
                .iter()
                .filter(|s| !s.contains("%s"))
                .map(|s| s.to_string())
                .collect()
        }
    }
}

/// Fill the release codename into every source line that has a `%s` slot
pub fn add_source_versions(version: &str, sources: &[&str]) -> Vec<String> {
    debug!("Source={}", version);
    sources.iter().map(|s| s.replace("%s", version)).collect()
}

/// Check the target actually runs the declared distribution
///
/// debian/ubuntu targets are checked against `/proc/version` (then
/// `/etc/issue`) and, unless the edition is `minimal`, against the release
/// codename. Other distributions are not checked.
pub async fn validate_target_distribution(
    router: &CommandRouter,
    distribution: Distribution,
    dist_name: Option<&str>,
    edition: Option<&str>,
) -> Result<()> {
    debug!("Checking target distribution {}", distribution);
    if !distribution.is_debian_family() {
        debug!("Unknown target distro");
        return Ok(());
    }

    let dist = distribution.name();
    let version = router.run("cat /proc/version").await?;
    if !version.stdout.to_lowercase().contains(dist) {
        let issue = router.run("cat /etc/issue").await?;
        if !issue.stdout.to_lowercase().contains(dist) {
            return Err(ProvisionError::DistributionMismatch {
                expected: dist.to_string(),
                found: issue.trimmed().to_string(),
            });
        }
    }

    // Minimal editions only add their own source, so any release works
    if edition == Some("minimal") {
        return Ok(());
    }

    let dist_name = dist_name.ok_or_else(|| ProvisionError::MissingDistName(dist.to_string()))?;
    let actual = router
        .run_with(
            "cat /etc/*release | grep DISTRIB_CODENAME | cut -f 2 -d =",
            RunOptions::warn_only(),
        )
        .await?;
    if !actual.stdout.to_lowercase().contains(dist_name) {
        return Err(ProvisionError::DistributionMismatch {
            expected: format!("{} {}", dist, dist_name),
            found: actual.trimmed().to_string(),
        });
    }
    Ok(())
}
