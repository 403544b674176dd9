use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;

mod commands;

#[derive(Parser)]
#[command(name = "provision")]
#[command(about = "Provision - idempotent installs on a local, ssh or vagrant target")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, default_value = "provision.yaml")]
    config: PathBuf,

    /// Skip checking the target's distribution against the configuration
    #[arg(long, global = true)]
    ignore_distcheck: bool,

    /// More log output: -v info, -vv every command, -vvv probes too
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate configuration file
    Validate,

    /// Connect to the target and show the resolved environment
    Env,

    /// Render a config file template
    Render {
        /// Config file name, e.g. nginx.conf
        name: String,

        /// Write to this path on the target instead of printing
        #[arg(short, long)]
        dest: Option<String>,

        /// Resource to render instead of <name>.template
        #[arg(long)]
        source: Option<String>,

        /// Override a template parameter (repeatable)
        #[arg(long = "set", value_name = "KEY=VALUE")]
        overrides: Vec<String>,
    },

    /// Fetch, build and install a source archive or repository
    Install {
        /// Archive URL or version control locator
        url: String,

        /// Install into the local install root instead of the system prefix
        #[arg(long)]
        local: bool,

        /// Build commands to run in the source directory (default: configure && make)
        #[arg(long = "step", value_name = "COMMAND")]
        steps: Vec<String>,

        /// Run build commands through sudo
        #[arg(long)]
        privileged: bool,

        /// Directory the archive unpacks to, when it differs from the file name
        #[arg(long)]
        dir_name: Option<String>,

        /// Revision to check out (git only)
        #[arg(long)]
        revision: Option<String>,
    },

    /// Install a Java tool into a versioned directory
    Java {
        /// Tool name
        name: String,
        /// Version being installed
        version: String,
        /// Download URL
        url: String,
    },

    /// Create a Python virtual environment
    Venv {
        /// Environment name
        name: String,

        /// Requirements file
        #[arg(short, long)]
        requirements: Option<String>,

        /// Download the requirements file from here first
        #[arg(long)]
        requirements_url: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    smol::block_on(async move {
        let target = commands::Target {
            config: &cli.config,
            ignore_distcheck: cli.ignore_distcheck,
        };

        match cli.command {
            Commands::Validate => commands::validate::run(&cli.config),
            Commands::Env => commands::env::run(target).await,
            Commands::Render { name, dest, source, overrides } => {
                commands::render::run(target, &name, dest.as_deref(), source.as_deref(), &overrides).await
            }
            Commands::Install { url, local, steps, privileged, dir_name, revision } => {
                let request = commands::install::InstallRequest {
                    url: &url,
                    local,
                    steps,
                    privileged,
                    dir_name: dir_name.as_deref(),
                    revision: revision.as_deref(),
                };
                commands::install::run(target, request).await
            }
            Commands::Java { name, version, url } => commands::java::run(target, &name, &version, &url).await,
            Commands::Venv { name, requirements, requirements_url } => {
                commands::venv::run(target, &name, requirements.as_deref(), requirements_url.as_deref()).await
            }
        }
    })
}
