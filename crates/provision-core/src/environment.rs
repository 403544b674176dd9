//! Environment setup: from a parsed configuration to a ready execution context
//!
//! The sequence is fixed: resolve how to reach the target, pick the
//! distribution profile, build the command router, check the target matches
//! the declared distribution, then query the target for `$HOME` and its
//! architecture.

use command_executor::backends::local::LocalLauncher;
use command_executor::backends::ssh::SshConfig;
use command_executor::{Command, CommandRouter, ConnectionMode, Launcher, PrivilegeMode};
use provision_config::{EnvironmentConfig, TargetConfig};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::context::ExecutionContext;
use crate::distribution::{validate_target_distribution, Distribution, DistributionProfile};
use crate::error::{ProvisionError, Result};
use crate::resources::ResourceStore;

/// Keys whose values may start with `~` and are expanded against the target's `$HOME`
const HOME_RELATIVE_SETTINGS: &[&str] = &["galaxy_home"];

/// Build the execution context for `config`
///
/// With `ignore_distcheck` the target is not asked which distribution it runs.
pub async fn setup_environment(
    config: &EnvironmentConfig,
    ignore_distcheck: bool,
) -> Result<ExecutionContext> {
    info!("Distribution {}", config.distribution);

    let mut config = config.clone();
    let connection = if config.target.is_local() {
        setup_local_environment(&mut config);
        ConnectionMode::Local
    } else if config.target.is_vagrant() {
        ConnectionMode::Remote(vagrant_ssh_config(&config.target).await?)
    } else {
        ConnectionMode::Remote(ssh_config_for(&config.target))
    };

    let mut base = LocalLauncher::new();
    if let Some(seconds) = config.command_timeout {
        base = base.with_timeout(Duration::from_secs(seconds));
    }
    let privilege = if config.use_sudo {
        PrivilegeMode::Sudo
    } else {
        PrivilegeMode::Direct
    };
    let router = CommandRouter::for_target(&connection, privilege, base);

    configure_context(&config, router, ignore_distcheck).await
}

/// Finish setup once a router exists
///
/// Split out from [`setup_environment`] so the probing steps run against
/// any router.
pub async fn configure_context(
    config: &EnvironmentConfig,
    router: CommandRouter,
    ignore_distcheck: bool,
) -> Result<ExecutionContext> {
    let distribution: Distribution = config.distribution.parse()?;
    let mut profile = DistributionProfile::new(
        distribution,
        config.dist_name.as_deref(),
        config.java_home.as_deref(),
    );
    if let Some(sources) = &config.package_sources {
        profile.sources = sources.clone();
    }

    if !ignore_distcheck {
        validate_target_distribution(
            &router,
            distribution,
            config.dist_name.as_deref(),
            config.edition.as_deref(),
        )
        .await?;
    }

    let nixpkgs = nixpkgs_enabled(distribution, config.nixpkgs);

    let home = router.run("echo $HOME").await?.trimmed().to_string();
    let expand = |path: &str| expand_home(path, &home);

    let mut settings = config.settings.clone();
    for key in HOME_RELATIVE_SETTINGS {
        if let Some(value) = settings.get_mut(*key) {
            *value = expand(value);
        }
    }

    let machine = router.run("uname -m").await?;
    let is_64bit = machine.trimmed().find("_64").is_some_and(|index| index > 0);

    let resources = match &config.installed_files_dir {
        Some(dir) => ResourceStore::new(dir, config.resource_url.clone()),
        None => ResourceStore::remote(config.resource_url.clone()),
    };

    Ok(ExecutionContext::new(router, profile)
        .with_system_install(config.system_install.clone())
        .with_local_install(expand(&config.local_install))
        .with_data_files(config.data_files.as_deref().map(expand))
        .with_dist_name(config.dist_name.clone())
        .with_edition(config.edition.clone())
        .with_is_64bit(is_64bit)
        .with_nixpkgs(nixpkgs)
        .with_verify_tls(config.verify_tls)
        .with_pip_cmd(config.pip_cmd.clone())
        .with_python_version_ext(config.python_version_ext.clone())
        .with_venv_directory(config.venv_directory.clone())
        .with_settings(settings)
        .with_resources(resources))
}

/// Defaults for a localhost target taken from this process's environment
fn setup_local_environment(config: &mut EnvironmentConfig) {
    info!("Get local environment");
    if !config.settings.contains_key("user") {
        if let Ok(user) = std::env::var("USER") {
            config.settings.insert("user".to_string(), user);
        }
    }
    if config.java_home.is_none() {
        config.java_home = std::env::var("JAVA_HOME").ok();
    }
}

/// Nix packages are only supported on debian and ubuntu
fn nixpkgs_enabled(distribution: Distribution, requested: bool) -> bool {
    let enabled = if requested && !distribution.is_debian_family() {
        warn!("NixPkgs are currently not supported for {}", distribution);
        false
    } else {
        requested
    };
    if enabled {
        info!("NixPkgs: supported");
    } else {
        debug!("NixPkgs: Ignored");
    }
    enabled
}

/// Replace a leading `~` with `home`
fn expand_home(path: &str, home: &str) -> String {
    match path.strip_prefix('~') {
        Some(rest) => format!("{}{}", home, rest),
        None => path.to_string(),
    }
}

/// SSH settings for an explicit `[user@]host[:port]` target
fn ssh_config_for(target: &TargetConfig) -> SshConfig {
    let mut config = SshConfig::parse(&target.host);
    if let Some(identity) = &target.identity_file {
        config = config.with_identity_file(identity.clone());
    }
    for option in &target.ssh_options {
        config = config.with_extra_arg(option.clone());
    }
    config
}

/// Ask vagrant how to reach the default machine
async fn vagrant_ssh_config(target: &TargetConfig) -> Result<SshConfig> {
    info!("Get vagrant environment");
    let mut command = Command::new("vagrant");
    command.arg("ssh-config");
    let output = LocalLauncher::new().execute(command).await?;
    if output.failed() {
        return Err(ProvisionError::VagrantConfig(output.stderr.trim().to_string()));
    }
    info!("{}", output.stdout);

    let mut config = parse_vagrant_ssh_config(&output.stdout)?;
    for option in &target.ssh_options {
        config = config.with_extra_arg(option.clone());
    }
    debug!("ssh {}", config.host_string());
    Ok(config)
}

/// Parse `vagrant ssh-config` output into SSH settings
///
/// Needs `User`, `HostName`, `Port` and `IdentityFile`.
pub fn parse_vagrant_ssh_config(raw: &str) -> Result<SshConfig> {
    let entries: HashMap<&str, &str> = raw
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            Some((parts.next()?, parts.next()?))
        })
        .collect();

    let field = |key: &str| {
        entries
            .get(key)
            .map(|value| value.trim_matches('"'))
            .ok_or_else(|| ProvisionError::VagrantConfig(format!("missing {}", key)))
    };

    let port = field("Port")?;
    let port: u16 = port
        .parse()
        .map_err(|_| ProvisionError::VagrantConfig(format!("bad port {}", port)))?;

    Ok(SshConfig::new(field("HostName")?)
        .with_user(field("User")?)
        .with_port(port)
        .with_identity_file(field("IdentityFile")?))
}
