//! The execution context shared by every provisioning operation
//!
//! Built once by [`crate::environment::setup_environment`] and passed by
//! reference afterwards. Operations that need to run inside a directory or
//! behind a setup command take a scoped copy via [`ExecutionContext::within`]
//! or [`ExecutionContext::with_prefix`].

use command_executor::CommandRouter;
use std::collections::{BTreeMap, HashMap};

use crate::distribution::{Distribution, DistributionProfile};
use crate::resources::ResourceStore;

/// Connection, privilege, install roots and distribution for one target
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    router: CommandRouter,
    profile: DistributionProfile,
    system_install: String,
    local_install: String,
    data_files: Option<String>,
    dist_name: Option<String>,
    edition: Option<String>,
    is_64bit: bool,
    nixpkgs: bool,
    verify_tls: bool,
    pip_cmd: Option<String>,
    python_version_ext: Option<String>,
    venv_directory: Option<String>,
    settings: BTreeMap<String, String>,
    resources: ResourceStore,
}

impl ExecutionContext {
    /// A context with default install roots (`/usr`, `~/install`)
    pub fn new(router: CommandRouter, profile: DistributionProfile) -> Self {
        Self {
            router,
            profile,
            system_install: "/usr".to_string(),
            local_install: "~/install".to_string(),
            data_files: None,
            dist_name: None,
            edition: None,
            is_64bit: false,
            nixpkgs: false,
            verify_tls: false,
            pip_cmd: None,
            python_version_ext: None,
            venv_directory: None,
            settings: BTreeMap::new(),
            resources: ResourceStore::default(),
        }
    }

    /// Set the shared install prefix
    pub fn with_system_install(mut self, path: impl Into<String>) -> Self {
        self.system_install = path.into();
        self
    }

    /// Set the root for local installs
    pub fn with_local_install(mut self, path: impl Into<String>) -> Self {
        self.local_install = path.into();
        self
    }

    /// Set the data directory
    pub fn with_data_files(mut self, path: Option<String>) -> Self {
        self.data_files = path;
        self
    }

    /// Set the release codename
    pub fn with_dist_name(mut self, name: Option<String>) -> Self {
        self.dist_name = name;
        self
    }

    /// Set the edition short name
    pub fn with_edition(mut self, edition: Option<String>) -> Self {
        self.edition = edition;
        self
    }

    /// Record whether the target is 64-bit
    pub fn with_is_64bit(mut self, is_64bit: bool) -> Self {
        self.is_64bit = is_64bit;
        self
    }

    /// Enable Nix packages
    pub fn with_nixpkgs(mut self, nixpkgs: bool) -> Self {
        self.nixpkgs = nixpkgs;
        self
    }

    /// Verify TLS certificates when downloading archives
    pub fn with_verify_tls(mut self, verify: bool) -> Self {
        self.verify_tls = verify;
        self
    }

    /// Extra pip executable to try before the profile's
    pub fn with_pip_cmd(mut self, cmd: Option<String>) -> Self {
        self.pip_cmd = cmd;
        self
    }

    /// Preferred python suffix, overriding the profile's
    pub fn with_python_version_ext(mut self, ext: Option<String>) -> Self {
        self.python_version_ext = ext;
        self
    }

    /// Directory for a local virtualenv
    pub fn with_venv_directory(mut self, dir: Option<String>) -> Self {
        self.venv_directory = dir;
        self
    }

    /// Add an ambient setting
    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    /// Replace all ambient settings
    pub fn with_settings(mut self, settings: BTreeMap<String, String>) -> Self {
        self.settings = settings;
        self
    }

    /// Set where templates and data files come from
    pub fn with_resources(mut self, resources: ResourceStore) -> Self {
        self.resources = resources;
        self
    }

    /// A copy whose commands run inside `dir`
    pub fn within(&self, dir: impl AsRef<str>) -> Self {
        let mut scoped = self.clone();
        scoped.router = self.router.within(dir);
        scoped
    }

    /// A copy whose commands run after `prefix`
    pub fn with_prefix(&self, prefix: impl Into<String>) -> Self {
        let mut scoped = self.clone();
        scoped.router = self.router.with_prefix(prefix);
        scoped
    }

    /// The command router for this target
    pub fn router(&self) -> &CommandRouter {
        &self.router
    }

    /// The active distribution profile
    pub fn profile(&self) -> &DistributionProfile {
        &self.profile
    }

    /// The target's distribution
    pub fn distribution(&self) -> Distribution {
        self.profile.distribution
    }

    /// Shared install prefix
    pub fn system_install(&self) -> &str {
        &self.system_install
    }

    /// Root for local installs
    pub fn local_install(&self) -> &str {
        &self.local_install
    }

    /// Data directory
    pub fn data_files(&self) -> Option<&str> {
        self.data_files.as_deref()
    }

    /// Release codename
    pub fn dist_name(&self) -> Option<&str> {
        self.dist_name.as_deref()
    }

    /// Edition short name
    pub fn edition(&self) -> Option<&str> {
        self.edition.as_deref()
    }

    /// Whether `uname -m` reported a 64-bit machine
    pub fn is_64bit(&self) -> bool {
        self.is_64bit
    }

    /// Whether Nix packages are enabled
    pub fn nixpkgs(&self) -> bool {
        self.nixpkgs
    }

    /// Whether downloads verify TLS certificates
    pub fn verify_tls(&self) -> bool {
        self.verify_tls
    }

    /// Whether privileged commands go through sudo
    pub fn use_sudo(&self) -> bool {
        self.router.uses_sudo()
    }

    /// JDK location
    pub fn java_home(&self) -> &str {
        &self.profile.java_home
    }

    /// Configured pip executable, falling back to the profile's
    pub fn pip_cmd(&self) -> Option<&str> {
        self.pip_cmd.as_deref().or(self.profile.pip_cmd.as_deref())
    }

    /// Configured python suffix, falling back to the profile's
    pub fn python_version_ext(&self) -> Option<&str> {
        self.python_version_ext
            .as_deref()
            .or(self.profile.python_version_ext.as_deref())
            .filter(|ext| !ext.is_empty())
    }

    /// Directory for a local virtualenv
    pub fn venv_directory(&self) -> Option<&str> {
        self.venv_directory.as_deref()
    }

    /// Resource store for templates and data files
    pub fn resources(&self) -> &ResourceStore {
        &self.resources
    }

    /// A non-empty ambient setting
    pub fn setting(&self, key: &str) -> Option<&str> {
        self.settings
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    /// Read a setting as a boolean; `TRUE` and `YES` in any case are true
    pub fn read_boolean(&self, key: &str, default: bool) -> bool {
        match self.settings.get(key) {
            Some(value) => matches!(value.to_uppercase().as_str(), "TRUE" | "YES"),
            None => default,
        }
    }

    /// The ambient parameter layer templates are rendered against
    ///
    /// Well-known context values come first; free-form settings replace them
    /// on collision. `install_dir` mirrors `system_install` for templates
    /// written against that name.
    pub fn params(&self) -> HashMap<String, String> {
        let mut params = HashMap::new();
        params.insert("system_install".to_string(), self.system_install.clone());
        params.insert("install_dir".to_string(), self.system_install.clone());
        params.insert("local_install".to_string(), self.local_install.clone());
        params.insert("distribution".to_string(), self.distribution().to_string());
        params.insert("java_home".to_string(), self.java_home().to_string());
        params.insert("use_sudo".to_string(), self.use_sudo().to_string());
        params.insert("is_64bit".to_string(), self.is_64bit.to_string());

        let optional = [
            ("dist_name", self.dist_name()),
            ("data_files", self.data_files()),
            ("python_version_ext", self.python_version_ext()),
            ("pip_cmd", self.pip_cmd()),
            ("venv_directory", self.venv_directory()),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                params.insert(key.to_string(), value.to_string());
            }
        }

        for (key, value) in &self.settings {
            params.insert(key.clone(), value.clone());
        }
        params
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use command_executor::backends::local::LocalLauncher;
    use command_executor::backends::sudo::SudoLauncher;
    use command_executor::mock::ScriptedLauncher;
    use command_executor::{ConnectionMode, PrivilegeMode};
    use std::sync::Arc;

    /// Ubuntu context whose commands all go to `launcher`; sudo is visible as a `sudo` prefix
    pub(crate) fn scripted_context(launcher: &ScriptedLauncher) -> ExecutionContext {
        let router = CommandRouter::new(
            Arc::new(launcher.clone()),
            Arc::new(SudoLauncher::new(launcher.clone())),
            PrivilegeMode::Sudo,
        );
        let profile = DistributionProfile::new(Distribution::Ubuntu, Some("precise"), None);
        ExecutionContext::new(router, profile)
            .with_system_install("/opt/sys")
            .with_local_install("/home/me/install")
    }

    /// Unprivileged context on this machine
    pub(crate) fn local_context() -> ExecutionContext {
        let router = CommandRouter::for_target(
            &ConnectionMode::Local,
            PrivilegeMode::Direct,
            LocalLauncher::new(),
        );
        let profile = DistributionProfile::new(Distribution::Ubuntu, Some("precise"), None);
        ExecutionContext::new(router, profile)
    }

    /// Like [`local_context`] with a chosen temporary directory
    pub(crate) fn local_context_with_tmpdir(tmpdir: &std::path::Path) -> ExecutionContext {
        let launcher = LocalLauncher::new().with_env("TMPDIR", tmpdir.to_string_lossy());
        let router =
            CommandRouter::for_target(&ConnectionMode::Local, PrivilegeMode::Direct, launcher);
        let profile = DistributionProfile::new(Distribution::Ubuntu, Some("precise"), None);
        ExecutionContext::new(router, profile)
    }
}
