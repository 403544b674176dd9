//! SSH routing tests
//!
//! These need an sshd on localhost accepting key-based logins for the current
//! user, so they only build with the `ssh-tests` feature.

#![cfg(feature = "ssh-tests")]

use command_executor::backends::local::LocalLauncher;
use command_executor::backends::ssh::SshConfig;
use command_executor::{CommandRouter, ConnectionMode, PrivilegeMode};

fn remote_router() -> CommandRouter {
    let config = SshConfig::new("localhost")
        .with_extra_arg("-o")
        .with_extra_arg("BatchMode=yes")
        .with_extra_arg("-o")
        .with_extra_arg("StrictHostKeyChecking=no");
    CommandRouter::for_target(
        &ConnectionMode::Remote(config),
        PrivilegeMode::Direct,
        LocalLauncher::new(),
    )
}

#[test]
fn test_remote_run_and_exists() {
    futures::executor::block_on(async {
        let router = remote_router();
        let result = router.run("echo $((40 + 2))").await.unwrap();
        assert_eq!(result.trimmed(), "42");
        assert!(router.exists("/").await.unwrap());
        assert!(!router.exists("/nonexistent-provision-path").await.unwrap());
    });
}

#[test]
fn test_remote_put_file() {
    futures::executor::block_on(async {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("uploaded.txt");
        let router = remote_router();

        router
            .put_file(b"uploaded over scp\n", dest.to_str().unwrap(), 0o600)
            .await
            .unwrap();

        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "uploaded over scp\n");
    });
}

#[test]
fn test_unreachable_host_is_connection_failure() {
    futures::executor::block_on(async {
        let config = SshConfig::new("127.0.0.1")
            .with_port(1)
            .with_extra_arg("-o")
            .with_extra_arg("BatchMode=yes");
        let router = CommandRouter::for_target(
            &ConnectionMode::Remote(config),
            PrivilegeMode::Direct,
            LocalLauncher::new(),
        );
        let err = router.exists("/").await.unwrap_err();
        assert!(matches!(err, command_executor::Error::SshConnectionFailed { .. }));
    });
}
