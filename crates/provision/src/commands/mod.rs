pub mod env;
pub mod install;
pub mod java;
pub mod render;
pub mod validate;
pub mod venv;

use anyhow::{Context, Result};
use provision_config::parser;
use provision_core::{setup_environment, ExecutionContext};
use std::path::Path;

/// How to reach the machine a command acts on
#[derive(Clone, Copy)]
pub struct Target<'a> {
    pub config: &'a Path,
    pub ignore_distcheck: bool,
}

impl Target<'_> {
    /// Parse the configuration and connect
    pub async fn connect(self) -> Result<ExecutionContext> {
        let config = parser::parse_file(self.config)
            .with_context(|| format!("Failed to parse {}", self.config.display()))?;
        setup_environment(&config, self.ignore_distcheck)
            .await
            .context("Failed to set up the target environment")
    }
}

/// Split `KEY=VALUE` pairs given on the command line
pub fn parse_pairs(pairs: &[String]) -> Result<Vec<(String, String)>> {
    pairs
        .iter()
        .map(|pair| {
            let (key, value) = pair
                .split_once('=')
                .with_context(|| format!("Expected KEY=VALUE, got '{}'", pair))?;
            Ok((key.trim().to_string(), value.to_string()))
        })
        .collect()
}
