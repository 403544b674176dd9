//! Python interpreter, pip and virtualenv helpers

use async_trait::async_trait;
use command_executor::{shell_escape, RunOptions};
use tracing::{debug, info};

use crate::context::ExecutionContext;
use crate::error::{ProvisionError, Result};
use crate::install::BuildStep;
use crate::system::add_to_profiles;
use crate::workdir::with_work_dir;

const VENV_BURRITO_URL: &str =
    "https://raw.github.com/brainsik/virtualenv-burrito/master/virtualenv-burrito.sh";
const VENV_BURRITO_STARTUP: &str = "$HOME/.venvburrito/startup.sh";

/// `(major, minor)` from `python --version` output such as `Python 2.7.3`
fn parse_python_version(output: &str) -> Option<(String, u32)> {
    let version = output.split_whitespace().last()?;
    let mut parts = version.split('.');
    let major = parts.next()?.to_string();
    let minor = parts.next()?.parse().ok()?;
    Some((major, minor))
}

/// Interpreter names to try, most preferred first
///
/// With a version hint, `python<ext>` comes first when the stock `python`
/// is a different major version or an older minor version than the hint.
async fn python_candidates(ctx: &ExecutionContext) -> Result<Vec<String>> {
    let Some(ext) = ctx.python_version_ext() else {
        return Ok(vec!["python".to_string(), "python3".to_string()]);
    };
    let suffixed = format!("python{}", ext);

    let stock = ctx
        .router()
        .run_with("python --version", RunOptions::probe())
        .await?;
    // Python 2 prints its version on stderr
    let reported = if stock.stdout.trim().is_empty() {
        stock.stderr.as_str()
    } else {
        stock.stdout.as_str()
    };

    let mut wanted = ext.split('.');
    let check_major = wanted.next().unwrap_or_default();
    let check_minor: u32 = wanted.next().and_then(|m| m.parse().ok()).unwrap_or(0);
    let prefer_suffixed = match parse_python_version(reported) {
        Some((major, minor)) => major != check_major || check_minor > minor,
        None => true,
    };

    Ok(if prefer_suffixed {
        vec![suffixed, "python".to_string()]
    } else {
        vec!["python".to_string(), suffixed]
    })
}

/// The interpreter to run python code with
///
/// The first candidate answering `--version` wins.
pub async fn python_cmd(ctx: &ExecutionContext) -> Result<String> {
    let candidates = python_candidates(ctx).await?;
    first_responding(ctx, &candidates)
        .await?
        .ok_or(ProvisionError::NoPythonInterpreter { tried: candidates })
}

/// Pip executable names to try, in order
pub fn pip_candidates(ctx: &ExecutionContext) -> Vec<String> {
    let mut candidates = vec!["pip".to_string()];
    if let Some(pip) = ctx.pip_cmd() {
        candidates.push(pip.to_string());
    }
    if !ctx.use_sudo() {
        candidates.push(format!("{}/bin/pip", ctx.system_install().trim_end_matches('/')));
    }
    if let Some(ext) = ctx.python_version_ext() {
        candidates.push(format!("pip-{}", ext));
    }
    candidates
}

/// The pip executable to install packages with
pub async fn pip_cmd(ctx: &ExecutionContext) -> Result<String> {
    let candidates = pip_candidates(ctx);
    first_responding(ctx, &candidates)
        .await?
        .ok_or(ProvisionError::NoPackageManager { tried: candidates })
}

async fn first_responding(ctx: &ExecutionContext, candidates: &[String]) -> Result<Option<String>> {
    for candidate in candidates {
        let probe = ctx
            .router()
            .run_with(&format!("{} --version", candidate), RunOptions::probe())
            .await?;
        if probe.succeeded() {
            debug!("Using {}", candidate);
            return Ok(Some(candidate.clone()));
        }
    }
    Ok(None)
}

/// `pip install --upgrade .` followed by removal of build leftovers
#[derive(Debug, Clone, Copy, Default)]
pub struct PythonMake;

#[async_trait]
impl BuildStep for PythonMake {
    async fn build(&self, ctx: &ExecutionContext) -> Result<()> {
        let pip = pip_cmd(ctx).await?;
        let router = ctx.router();
        router.sudo(&format!("{} install --upgrade .", pip)).await?;
        for leftover in ["dist", "build", "lib/*.egg-info"] {
            router.sudo(&format!("rm -rf {}", leftover)).await?;
        }
        Ok(())
    }
}

/// Install virtualenv-burrito unless its startup script is already there
pub async fn install_venvburrito(ctx: &ExecutionContext) -> Result<()> {
    if ctx.router().exists(VENV_BURRITO_STARTUP).await? {
        return Ok(());
    }
    info!("Installing virtualenv-burrito");
    ctx.router()
        .run(&format!("curl -s {} | $SHELL", VENV_BURRITO_URL))
        .await?;
    let startup_line = format!(". {}", VENV_BURRITO_STARTUP);
    add_to_profiles(ctx, &startup_line, &["$HOME/.bashrc"], false).await
}

/// Create the virtualenv `venv_name` unless it already exists
///
/// With `venv_directory` configured the environment is created there with
/// `virtualenv`; otherwise `mkvirtualenv` registers it globally. Packages
/// come from `reqs_file`, downloaded first from `reqs_url` when given.
/// Returns whether an environment was created.
pub async fn create_python_virtualenv(
    ctx: &ExecutionContext,
    venv_name: &str,
    reqs_file: Option<&str>,
    reqs_url: Option<&str>,
) -> Result<bool> {
    install_venvburrito(ctx).await?;
    let activated = ctx.with_prefix(format!(". {}", VENV_BURRITO_STARTUP));
    match ctx.venv_directory() {
        Some(venv_dir) => create_local_virtualenv(&activated, venv_dir, reqs_file, reqs_url).await,
        None => create_global_virtualenv(&activated, venv_name, reqs_file, reqs_url).await,
    }
}

async fn create_local_virtualenv(
    ctx: &ExecutionContext,
    venv_dir: &str,
    reqs_file: Option<&str>,
    reqs_url: Option<&str>,
) -> Result<bool> {
    if ctx.router().exists(venv_dir).await? {
        debug!("Virtualenv {} already exists", venv_dir);
        return Ok(false);
    }
    let router = ctx.router();
    let reqs_file = reqs_file.or(reqs_url.map(|_| "requirements.txt"));
    if let (Some(url), Some(file)) = (reqs_url, reqs_file) {
        router
            .sudo(&format!("wget --output-document={} {}", shell_escape(file), shell_escape(url)))
            .await?;
    }
    router
        .sudo(&format!("virtualenv --no-site-packages {}", shell_escape(venv_dir)))
        .await?;
    if let Some(file) = reqs_file {
        router
            .sudo(&format!(
                ". {}/bin/activate; pip install -r {}",
                venv_dir,
                shell_escape(file)
            ))
            .await?;
    }
    info!("Finished installing virtualenv in {}", venv_dir);
    Ok(true)
}

async fn create_global_virtualenv(
    ctx: &ExecutionContext,
    venv_name: &str,
    reqs_file: Option<&str>,
    reqs_url: Option<&str>,
) -> Result<bool> {
    let listing = ctx
        .router()
        .run(&format!("lsvirtualenv | grep {} || true", shell_escape(venv_name)))
        .await?;
    if listing.stdout.contains(venv_name) {
        info!("Virtualenv {} already exists", venv_name);
        return Ok(false);
    }

    with_work_dir(ctx, |work_dir| async move {
        let work = ctx.within(&work_dir);
        let reqs_file = reqs_file.or(reqs_url.map(|_| "requirements.txt"));
        if let (Some(url), Some(file)) = (reqs_url, reqs_file) {
            work.router()
                .run(&format!("wget --output-document={} {}", shell_escape(file), shell_escape(url)))
                .await?;
        }
        let create = match reqs_file {
            Some(file) => format!("mkvirtualenv -r {} {}", shell_escape(file), shell_escape(venv_name)),
            None => format!("mkvirtualenv {}", shell_escape(venv_name)),
        };
        work.router().run(&create).await?;
        info!("Finished installing virtualenv {}", venv_name);
        Ok(true)
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::test_support::scripted_context;
    use command_executor::mock::ScriptedLauncher;

    #[test]
    fn test_parse_python_version() {
        assert_eq!(parse_python_version("Python 2.7.3\n"), Some(("2".to_string(), 7)));
        assert_eq!(parse_python_version("Python 3.10.12"), Some(("3".to_string(), 10)));
        assert_eq!(parse_python_version(""), None);
    }

    #[smol_potat::test]
    async fn test_stock_python_without_hint() {
        let launcher = ScriptedLauncher::new();
        let ctx = scripted_context(&launcher);
        assert_eq!(python_cmd(&ctx).await.unwrap(), "python");
    }

    #[smol_potat::test]
    async fn test_version_hint_prefers_newer_interpreter() {
        let launcher = ScriptedLauncher::new().respond("python --version", 0, "Python 2.6.6\n");
        let ctx = scripted_context(&launcher).with_python_version_ext(Some("2.7".to_string()));
        assert_eq!(python_cmd(&ctx).await.unwrap(), "python2.7");

        let launcher = ScriptedLauncher::new().respond("python --version", 0, "Python 2.7.3\n");
        let ctx = scripted_context(&launcher).with_python_version_ext(Some("2.6".to_string()));
        assert_eq!(python_cmd(&ctx).await.unwrap(), "python");
    }

    #[smol_potat::test]
    async fn test_no_interpreter_responds() {
        let launcher = ScriptedLauncher::new().respond("--version", 127, "");
        let ctx = scripted_context(&launcher);
        let err = python_cmd(&ctx).await.unwrap_err();
        assert!(matches!(
            err,
            ProvisionError::NoPythonInterpreter { ref tried } if tried == &["python", "python3"]
        ));
    }

    #[smol_potat::test]
    async fn test_pip_candidates_follow_configuration() {
        let launcher = ScriptedLauncher::new()
            .respond("pip --version", 127, "")
            .respond("pip-python --version", 0, "pip 1.3");
        let ctx = scripted_context(&launcher).with_pip_cmd(Some("pip-python".to_string()));
        assert_eq!(pip_cmd(&ctx).await.unwrap(), "pip-python");

        let launcher = ScriptedLauncher::new().respond("--version", 1, "");
        let ctx = scripted_context(&launcher).with_python_version_ext(Some("2.7".to_string()));
        let err = pip_cmd(&ctx).await.unwrap_err();
        match err {
            ProvisionError::NoPackageManager { tried } => assert_eq!(tried, vec!["pip", "pip-2.7"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[smol_potat::test]
    async fn test_python_make_installs_and_cleans() {
        let launcher = ScriptedLauncher::new();
        let ctx = scripted_context(&launcher).within("/tmp/w/pysam");
        PythonMake.build(&ctx).await.unwrap();

        assert!(launcher.saw("sudo sh -c cd /tmp/w/pysam && pip install --upgrade ."));
        assert!(launcher.saw("sudo sh -c cd /tmp/w/pysam && rm -rf lib/*.egg-info"));
    }

    #[smol_potat::test]
    async fn test_global_virtualenv_created_once() {
        let launcher = ScriptedLauncher::new()
            .respond("echo $TMPDIR", 0, "/tmp\n")
            .respond(VENV_BURRITO_STARTUP, 0, "");
        let ctx = scripted_context(&launcher);

        let created = create_python_virtualenv(&ctx, "galaxy", None, Some("http://x.org/reqs.txt"))
            .await
            .unwrap();
        assert!(created);
        assert!(!launcher.saw("curl -s"));
        assert!(launcher.saw(". $HOME/.venvburrito/startup.sh && lsvirtualenv | grep galaxy || true"));
        assert!(launcher.saw("&& wget --output-document=requirements.txt http://x.org/reqs.txt"));
        assert!(launcher.saw("&& mkvirtualenv -r requirements.txt galaxy"));

        let launcher = ScriptedLauncher::new()
            .respond("lsvirtualenv", 0, "galaxy\n")
            .respond(VENV_BURRITO_STARTUP, 0, "");
        let ctx = scripted_context(&launcher);
        let created = create_python_virtualenv(&ctx, "galaxy", None, None).await.unwrap();
        assert!(!created);
        assert!(!launcher.saw("mkvirtualenv"));
    }

    #[smol_potat::test]
    async fn test_local_virtualenv_in_configured_directory() {
        let launcher = ScriptedLauncher::new()
            .respond("test -e \"$(echo $HOME/.venvburrito/startup.sh)\"", 1, "")
            .respond("test -e \"$(echo /srv/venv)\"", 1, "")
            .respond("grep -qF", 1, "");
        let ctx = scripted_context(&launcher).with_venv_directory(Some("/srv/venv".to_string()));

        let created = create_python_virtualenv(&ctx, "unused", Some("reqs.txt"), None)
            .await
            .unwrap();
        assert!(created);
        assert!(launcher.saw("curl -s https://raw.github.com/brainsik/virtualenv-burrito/master/virtualenv-burrito.sh | $SHELL"));
        assert!(launcher.saw("$HOME/.bashrc"));
        assert!(launcher.saw("sudo sh -c . $HOME/.venvburrito/startup.sh && virtualenv --no-site-packages /srv/venv"));
        assert!(launcher.saw(". /srv/venv/bin/activate; pip install -r reqs.txt"));
        assert!(!launcher.saw("mkvirtualenv"));
    }
}
