mod ci;
mod test;

use anyhow::Result;
use clap::{Parser, Subcommand};
use command_executor::{backends::LocalLauncher, Command, ExitResult, Launcher};

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Development task runner for provision")]
struct Args {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Run CI checks
    Ci(ci::CiArgs),
    /// Run tests
    Test(test::TestArgs),
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Run in smol runtime
    smol::block_on(async {
        match args.cmd {
            Cmd::Ci(args) => ci::run(args).await,
            Cmd::Test(args) => test::run(args).await,
        }
    })
}

/// Run cargo with `args`, echoing its output once it finishes
pub(crate) async fn cargo(args: &[&str]) -> Result<ExitResult> {
    let cmd = Command::builder("cargo").args(args).build();
    let result = LocalLauncher::new().execute(cmd).await?;
    print!("{}", result.stdout);
    eprint!("{}", result.stderr);
    Ok(result)
}
