use anyhow::{bail, Result};
use clap::Args;

use crate::cargo;

#[derive(Args)]
pub struct TestArgs {
    /// Package to test
    #[arg(short, long)]
    package: Option<String>,

    /// Features to enable
    #[arg(short, long)]
    features: Option<String>,

    /// Run all features
    #[arg(long)]
    all_features: bool,

    /// Test name filter
    filter: Option<String>,
}

pub async fn run(args: TestArgs) -> Result<()> {
    println!("Running tests\n");

    let mut cmd_args = vec!["test"];

    // Add package if specified
    if let Some(package) = &args.package {
        cmd_args.push("-p");
        cmd_args.push(package);
    } else {
        cmd_args.push("--workspace");
    }

    // Add features
    if args.all_features {
        cmd_args.push("--all-features");
    } else if let Some(features) = &args.features {
        cmd_args.push("--features");
        cmd_args.push(features);
    }

    // Add test name filter
    if let Some(filter) = &args.filter {
        cmd_args.push("--");
        cmd_args.push(filter);
    }

    println!("Command: cargo {}", cmd_args.join(" "));
    if args.all_features {
        println!("Features: all-features (includes ssh-tests, which need ssh to localhost)");
    } else if let Some(features) = &args.features {
        println!("Features: {}", features);
    }
    println!();

    let result = cargo(&cmd_args).await?;

    let mut test_summary = TestSummary::default();
    for line in result.stdout.lines() {
        test_summary.parse_line(line);
    }
    println!("\n{}", test_summary);

    if result.failed() || test_summary.failed > 0 {
        bail!("Tests failed");
    }

    Ok(())
}

#[derive(Default)]
struct TestSummary {
    total: usize,
    passed: usize,
    failed: usize,
    ignored: usize,
}

impl TestSummary {
    fn parse_line(&mut self, line: &str) {
        if line.contains(" test") && line.contains(" ... ") {
            self.total += 1;
            if line.contains(" ... ok") {
                self.passed += 1;
            } else if line.contains(" ... FAILED") {
                self.failed += 1;
            } else if line.contains(" ... ignored") {
                self.ignored += 1;
            }
        }
    }
}

impl std::fmt::Display for TestSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.total > 0 {
            write!(
                f,
                "Test Summary: {} total, {} passed, {} failed, {} ignored",
                self.total, self.passed, self.failed, self.ignored
            )
        } else {
            write!(f, "No test results captured")
        }
    }
}
