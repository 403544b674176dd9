//! Config-file rendering
//!
//! For a config file `name` (say `nginx.conf`) the source is chosen in this
//! order, first match wins:
//!
//! 1. setting `nginx_conf_path`: that file, used verbatim
//! 2. setting `nginx_conf_template_path`: that file, interpolated
//! 3. the caller's `default_source` resource, interpolated iff it ends in `.template`
//! 4. the `nginx.conf.template` resource, interpolated
//!
//! Interpolation fills `$name` / `${name}` from defaults, then the context's
//! parameters, then overrides, later layers winning.

use provision_config::resolver::{substitute, ResolutionContext};
use std::collections::HashMap;
use tracing::debug;

use crate::context::ExecutionContext;
use crate::error::Result;
use crate::system::write_to_file;

const TEMPLATE_SUFFIX: &str = ".template";

/// Mode of rendered config files
pub const CONF_FILE_MODE: u32 = 0o755;

/// Where a config file's contents come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    /// A file on this machine named by a setting
    Path {
        /// Absolute path
        path: String,
        /// Whether placeholders are filled in
        interpolate: bool,
    },
    /// A file from the resource store
    Resource {
        /// Name relative to the store
        name: String,
        /// Whether placeholders are filled in
        interpolate: bool,
    },
}

/// Pick the source for config file `name`
pub fn resolve_source(
    ctx: &ExecutionContext,
    name: &str,
    default_source: Option<&str>,
) -> TemplateSource {
    let param_prefix = name.replace('.', "_");
    if let Some(path) = ctx.setting(&format!("{}_path", param_prefix)) {
        return TemplateSource::Path {
            path: path.to_string(),
            interpolate: false,
        };
    }
    if let Some(path) = ctx.setting(&format!("{}_template_path", param_prefix)) {
        return TemplateSource::Path {
            path: path.to_string(),
            interpolate: true,
        };
    }
    match default_source {
        Some(resource) => TemplateSource::Resource {
            name: resource.to_string(),
            interpolate: resource.ends_with(TEMPLATE_SUFFIX),
        },
        None => TemplateSource::Resource {
            name: format!("{}{}", name, TEMPLATE_SUFFIX),
            interpolate: true,
        },
    }
}

/// Render config file `name`
///
/// A placeholder with no value in any layer is an error.
pub fn render_config_file_template(
    ctx: &ExecutionContext,
    name: &str,
    defaults: &HashMap<String, String>,
    overrides: &HashMap<String, String>,
    default_source: Option<&str>,
) -> Result<String> {
    let source = resolve_source(ctx, name, default_source);
    debug!("Rendering {} from {:?}", name, source);
    let (raw, interpolate) = match source {
        TemplateSource::Path { path, interpolate } => (std::fs::read_to_string(path)?, interpolate),
        TemplateSource::Resource { name, interpolate } => (ctx.resources().read(&name)?, interpolate),
    };

    if !interpolate {
        return Ok(raw);
    }
    let params = ResolutionContext::layered(defaults, &ctx.params(), overrides);
    Ok(substitute(&raw, &params)?)
}

/// Render config file `name` and write it to `dest` on the target
pub async fn setup_conf_file(
    ctx: &ExecutionContext,
    dest: &str,
    name: &str,
    defaults: &HashMap<String, String>,
    overrides: &HashMap<String, String>,
    default_source: Option<&str>,
) -> Result<()> {
    let contents = render_config_file_template(ctx, name, defaults, overrides, default_source)?;
    write_to_file(ctx, &contents, dest, CONF_FILE_MODE).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::test_support::{local_context, scripted_context};
    use crate::error::ProvisionError;
    use crate::resources::ResourceStore;
    use command_executor::mock::ScriptedLauncher;
    use provision_config::ConfigError;
    use std::fs;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn store_with(files: &[(&str, &str)]) -> (tempfile::TempDir, ResourceStore) {
        let dir = tempfile::tempdir().unwrap();
        for (name, contents) in files {
            fs::write(dir.path().join(name), contents).unwrap();
        }
        let store = ResourceStore::new(dir.path(), "http://unused.invalid/");
        (dir, store)
    }

    #[test]
    fn test_override_beats_context_and_default() {
        let (_dir, store) = store_with(&[("foo.conf.template", "a=${a}\n")]);
        let ctx = scripted_context(&ScriptedLauncher::new())
            .with_resources(store)
            .with_setting("a", "from-context");

        let rendered = render_config_file_template(
            &ctx,
            "foo.conf",
            &map(&[("a", "1")]),
            &map(&[("a", "2")]),
            None,
        )
        .unwrap();
        assert_eq!(rendered, "a=2\n");

        let rendered =
            render_config_file_template(&ctx, "foo.conf", &map(&[("a", "1")]), &HashMap::new(), None)
                .unwrap();
        assert_eq!(rendered, "a=from-context\n");
    }

    #[test]
    fn test_source_precedence() {
        let tmp = tempfile::tempdir().unwrap();
        let verbatim = tmp.path().join("verbatim.conf");
        let template = tmp.path().join("custom.template");
        fs::write(&verbatim, "port $port\n").unwrap();
        fs::write(&template, "port $port\n").unwrap();
        let (_dir, store) = store_with(&[
            ("nginx.conf.template", "bundled $port\n"),
            ("nginx.conf", "plain $port\n"),
        ]);
        let defaults = map(&[("port", "80")]);
        let none = HashMap::new();

        let base = scripted_context(&ScriptedLauncher::new()).with_resources(store);
        let render = |ctx: &ExecutionContext, source: Option<&str>| {
            render_config_file_template(ctx, "nginx.conf", &defaults, &none, source).unwrap()
        };

        assert_eq!(render(&base, None), "bundled 80\n");
        assert_eq!(render(&base, Some("nginx.conf")), "plain $port\n");
        assert_eq!(render(&base, Some("nginx.conf.template")), "bundled 80\n");

        let with_template =
            base.clone().with_setting("nginx_conf_template_path", template.to_str().unwrap());
        assert_eq!(render(&with_template, None), "port 80\n");

        let with_path = with_template.with_setting("nginx_conf_path", verbatim.to_str().unwrap());
        assert_eq!(render(&with_path, Some("nginx.conf.template")), "port $port\n");
    }

    #[test]
    fn test_unresolved_placeholder_is_fatal() {
        let (_dir, store) = store_with(&[("app.ini.template", "user=$app_user\n")]);
        let ctx = scripted_context(&ScriptedLauncher::new()).with_resources(store);

        let err = render_config_file_template(&ctx, "app.ini", &HashMap::new(), &HashMap::new(), None)
            .unwrap_err();
        assert!(matches!(
            err,
            ProvisionError::Config(ConfigError::MissingParameter(ref name)) if name == "app_user"
        ));
    }

    #[test]
    fn test_context_params_available_to_templates() {
        let (_dir, store) = store_with(&[("env.sh.template", "export PATH=$install_dir/bin:$$PATH\n")]);
        let ctx = scripted_context(&ScriptedLauncher::new()).with_resources(store);

        let rendered =
            render_config_file_template(&ctx, "env.sh", &HashMap::new(), &HashMap::new(), None).unwrap();
        assert_eq!(rendered, "export PATH=/opt/sys/bin:$PATH\n");
    }

    #[smol_potat::test]
    async fn test_setup_conf_file_writes_executable() {
        let (_dir, store) = store_with(&[("run.sh.template", "#!/bin/sh\nexec $cmd\n")]);
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("run.sh");
        let ctx = local_context().with_resources(store);

        setup_conf_file(
            &ctx,
            dest.to_str().unwrap(),
            "run.sh",
            &map(&[("cmd", "true")]),
            &HashMap::new(),
            None,
        )
        .await
        .unwrap();

        assert_eq!(fs::read_to_string(&dest).unwrap(), "#!/bin/sh\nexec true\n");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&dest).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o755);
        }
    }
}
